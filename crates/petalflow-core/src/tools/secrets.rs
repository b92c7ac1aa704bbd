//! Secret masking for tool registrations
//!
//! Sensitive config values never leave the service: every read view carries
//! the fixed sentinel instead. The sentinel is also the round-trip marker on
//! writes: an update that sends the sentinel back means "keep the stored
//! value". The sentinel itself is never persisted.

use std::collections::BTreeMap;

use crate::tools::ToolRegistration;

/// Fixed placeholder returned in place of sensitive config values
pub const MASKED_SENTINEL: &str = "********";

/// A read view of a registration with sensitive values masked
pub fn masked_view(registration: &ToolRegistration) -> ToolRegistration {
    let mut view = registration.clone();
    for (name, value) in view.config.iter_mut() {
        if is_sensitive(registration, name) && !value.is_empty() {
            *value = MASKED_SENTINEL.to_string();
        }
    }
    view
}

/// Merge an incoming config edit over the stored config
///
/// Sentinel values on sensitive fields keep the stored secret; anything else
/// replaces it. Fields absent from the edit are removed, making the edit a
/// full replacement of the configured set.
pub fn merge_config_edit(
    stored: &ToolRegistration,
    edit: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    edit.into_iter()
        .map(|(name, value)| {
            if value == MASKED_SENTINEL && is_sensitive(stored, &name) {
                let kept = stored.config.get(&name).cloned().unwrap_or_default();
                (name, kept)
            } else {
                (name, value)
            }
        })
        .collect()
}

fn is_sensitive(registration: &ToolRegistration, field: &str) -> bool {
    registration
        .manifest
        .config
        .get(field)
        .is_some_and(|spec| spec.sensitive)
}
