//! Tool service
//!
//! The single owner of registration mutation. Every write validates, goes
//! through the store, and ends with an atomic reprojection of the tool-
//! derived node types, so compilers always see a catalog matching the
//! committed registrations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostic, registration as codes};
use crate::error::{Error, Result};
use crate::registry::NodeTypeRegistry;
use crate::tools::adapter::{AdapterFactory, InvokeError, InvokeRequest, InvokeResult};
use crate::tools::health::{self, HealthReport};
use crate::tools::manifest::{self, ToolManifest};
#[cfg(feature = "mcp")]
use crate::tools::overlay::{McpOverlay, apply_overlay};
use crate::tools::projection::project_registrations;
use crate::tools::secrets;
use crate::tools::store::ToolStore;
use crate::tools::{ToolOrigin, ToolRegistration, ToolStatus};
use crate::workflow::is_valid_identifier;

/// Default bound for I/O-bound operations (probes, discovery, invocations)
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Filter for [`ToolService::list`]
#[derive(Debug, Clone, Copy)]
pub struct ListFilter {
    /// Include in-process native registrations
    pub include_native: bool,
    /// Drop disabled registrations
    pub enabled_only: bool,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            include_native: true,
            enabled_only: false,
        }
    }
}

/// Input for [`ToolService::create`]
#[derive(Debug, Clone)]
pub struct CreateToolRequest {
    pub name: String,
    pub origin: ToolOrigin,
    pub manifest: ToolManifest,
    /// Non-secret config values; sensitive fields are rejected here
    pub config: BTreeMap<String, String>,
    /// Secret path for sensitive config values
    pub secrets: BTreeMap<String, String>,
}

/// Input for [`ToolService::update`]; config only, manifests change via
/// refresh
#[derive(Debug, Clone, Default)]
pub struct UpdateToolRequest {
    /// Full replacement of the configured set. Masked sentinel values on
    /// sensitive fields keep the stored secret.
    pub config: Option<BTreeMap<String, String>>,
    pub secrets: Option<BTreeMap<String, String>>,
}

/// Lifecycle service over a store, a registry, and an adapter factory
pub struct ToolService {
    store: Arc<dyn ToolStore>,
    registry: Arc<NodeTypeRegistry>,
    adapters: Arc<dyn AdapterFactory>,
    operation_timeout: Duration,
}

impl ToolService {
    pub fn new(
        store: Arc<dyn ToolStore>,
        registry: Arc<NodeTypeRegistry>,
        adapters: Arc<dyn AdapterFactory>,
    ) -> Self {
        Self {
            store,
            registry,
            adapters,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Registrations matching the filter, masked, ordered by name
    pub async fn list(&self, filter: ListFilter) -> Result<Vec<ToolRegistration>> {
        let registrations = self.store.list().await?;
        Ok(registrations
            .iter()
            .filter(|r| filter.include_native || r.origin != ToolOrigin::Native)
            .filter(|r| !filter.enabled_only || r.enabled)
            .map(secrets::masked_view)
            .collect())
    }

    /// One registration, masked
    pub async fn get(&self, name: &str) -> Result<ToolRegistration> {
        let registration = self.load(name).await?;
        Ok(secrets::masked_view(&registration))
    }

    /// Validate and persist a new registration
    pub async fn create(&self, request: CreateToolRequest) -> Result<ToolRegistration> {
        let mut diagnostics = Vec::new();

        if !is_valid_identifier(&request.name) {
            diagnostics.push(
                Diagnostic::error(
                    codes::SCHEMA_INVALID,
                    format!("tool name '{}' is not a valid identifier", request.name),
                )
                .with_field("name"),
            );
        }

        if self.store.get(&request.name).await?.is_some() {
            diagnostics.push(
                Diagnostic::error(
                    codes::NAME_NOT_UNIQUE,
                    format!("a tool named '{}' already exists", request.name),
                )
                .with_field("name"),
            );
        }

        diagnostics.extend(manifest::check_sensitive_fields(
            &request.manifest,
            &request.config,
        ));

        let mut config = request.config;
        config.extend(request.secrets);
        let registration =
            ToolRegistration::new(&request.name, request.origin, request.manifest)
                .with_config(config);

        diagnostics.extend(manifest::validate_registration(&registration));
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Err(Error::Registration(diagnostics));
        }

        debug!(tool = %registration.name, origin = ?registration.origin, "registering tool");
        self.store.upsert(registration.clone()).await?;
        self.reproject().await?;

        Ok(secrets::masked_view(&registration))
    }

    /// Apply a config mutation; manifest changes go through refresh
    pub async fn update(&self, name: &str, request: UpdateToolRequest) -> Result<ToolRegistration> {
        let mut registration = self.load(name).await?;

        if let Some(edit) = request.config {
            // Sentinel values mean "keep the stored secret" and are not new
            // writes, so they pass the sensitive-path check
            let new_values: BTreeMap<String, String> = edit
                .iter()
                .filter(|(_, v)| v.as_str() != secrets::MASKED_SENTINEL)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let diagnostics = manifest::check_sensitive_fields(&registration.manifest, &new_values);
            if !diagnostics.is_empty() {
                return Err(Error::Registration(diagnostics));
            }
            registration.config = secrets::merge_config_edit(&registration, edit);
        }

        if let Some(new_secrets) = request.secrets {
            for (field, value) in new_secrets {
                // A round-tripped sentinel keeps the stored value
                if value == secrets::MASKED_SENTINEL {
                    continue;
                }
                registration.config.insert(field, value);
            }
        }

        let diagnostics = manifest::validate_registration(&registration);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Err(Error::Registration(diagnostics));
        }

        registration.status = next_status(&registration, ToolStatus::Unverified);
        self.store.upsert(registration.clone()).await?;
        self.reproject().await?;

        Ok(secrets::masked_view(&registration))
    }

    /// Remove a registration; the next projection drops its node types
    pub async fn delete(&self, name: &str) -> Result<()> {
        if !self.store.delete(name).await? {
            return Err(Error::NotFound(format!("tool '{}'", name)));
        }
        debug!(tool = %name, "tool deleted");
        self.reproject().await
    }

    /// Toggle a registration and update its derived status
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<ToolRegistration> {
        let mut registration = self.load(name).await?;
        registration.enabled = enabled;
        registration.status = if enabled {
            ToolStatus::Unverified
        } else {
            ToolStatus::Disabled
        };

        self.store.upsert(registration.clone()).await?;
        self.reproject().await?;
        Ok(secrets::masked_view(&registration))
    }

    /// Re-discover an MCP tool and merge its overlay
    #[cfg(feature = "mcp")]
    pub async fn refresh(&self, name: &str) -> Result<ToolRegistration> {
        use crate::tools::discovery::discover_manifest;

        let mut registration = self.load(name).await?;
        if registration.origin != ToolOrigin::Mcp {
            return Err(Error::Unsupported(format!(
                "refresh applies only to mcp tools; '{}' is {:?}",
                name, registration.origin
            )));
        }

        let discovered = discover_manifest(&registration, self.operation_timeout).await?;
        let merged = match registration.overlay.clone() {
            Some(overlay) => {
                let manifest = apply_overlay(&discovered, &overlay);
                self.seed_env_config(&mut registration, &overlay);
                manifest
            }
            None => discovered,
        };

        let probe = ToolRegistration {
            manifest: merged.clone(),
            ..registration.clone()
        };
        let diagnostics = manifest::validate_registration(&probe);
        if diagnostics.iter().any(Diagnostic::is_error) {
            warn!(tool = %name, "discovered manifest failed validation");
            return Err(Error::Registration(diagnostics));
        }

        registration.manifest = merged;
        registration.status = next_status(&registration, ToolStatus::Unverified);
        self.store.upsert(registration.clone()).await?;
        self.reproject().await?;

        Ok(secrets::masked_view(&registration))
    }

    /// Set or clear an MCP overlay, then refresh against the server
    #[cfg(feature = "mcp")]
    pub async fn set_overlay(
        &self,
        name: &str,
        overlay: Option<McpOverlay>,
    ) -> Result<ToolRegistration> {
        let mut registration = self.load(name).await?;
        if registration.origin != ToolOrigin::Mcp {
            return Err(Error::Unsupported(format!(
                "overlays apply only to mcp tools; '{}' is {:?}",
                name, registration.origin
            )));
        }

        registration.overlay = overlay;
        registration.status = next_status(&registration, ToolStatus::Unverified);
        self.store.upsert(registration).await?;

        self.refresh(name).await
    }

    /// Probe reachability and record the outcome
    pub async fn health(&self, name: &str) -> Result<HealthReport> {
        let mut registration = self.load(name).await?;

        if !registration.enabled {
            return Ok(HealthReport {
                status: ToolStatus::Disabled,
                message: None,
                checked_at: chrono::Utc::now(),
            });
        }

        let report = health::probe(&registration, self.operation_timeout).await;
        if report.status == ToolStatus::Unhealthy {
            warn!(tool = %name, message = ?report.message, "health probe failed");
        }

        registration.status = report.status;
        registration.last_health_check = Some(report.checked_at);
        self.store.upsert(registration).await?;

        Ok(report)
    }

    /// Invoke one action with provided inputs plus the stored config
    ///
    /// The adapter is closed whether or not the invocation succeeds.
    pub async fn test_invoke(
        &self,
        name: &str,
        action: &str,
        inputs: serde_json::Value,
    ) -> std::result::Result<InvokeResult, InvokeError> {
        let registration = self
            .store
            .get(name)
            .await
            .map_err(|e| InvokeError::transport(e.to_string(), false))?
            .ok_or_else(|| InvokeError::not_found(format!("tool '{}' is not registered", name)))?;

        if !registration.enabled {
            return Err(InvokeError::validation(format!("tool '{}' is disabled", name)));
        }
        if !registration.manifest.actions.contains_key(action) {
            return Err(InvokeError::not_found(format!(
                "tool '{}' has no action '{}'",
                name, action
            )));
        }

        let adapter = self
            .adapters
            .adapter_for(&registration)
            .await
            .map_err(|e| InvokeError::transport(e.to_string(), false))?;

        let request = InvokeRequest {
            tool: name.to_string(),
            action: action.to_string(),
            inputs,
            config: registration.config.clone(),
        };

        debug!(tool = %name, action = %action, "test invocation");
        let outcome = tokio::time::timeout(self.operation_timeout, adapter.invoke(request)).await;
        adapter.close().await;

        match outcome {
            Ok(Ok(mut result)) => {
                result
                    .metadata
                    .insert("invocation_id".to_string(), uuid::Uuid::new_v4().to_string());
                Ok(result)
            }
            Ok(Err(error)) => Err(error),
            Err(_) => Err(InvokeError::timeout(format!(
                "invocation exceeded {}s",
                self.operation_timeout.as_secs()
            ))),
        }
    }

    async fn load(&self, name: &str) -> Result<ToolRegistration> {
        self.store
            .get(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("tool '{}'", name)))
    }

    /// Rebuild the tool-derived node types from the committed registrations
    async fn reproject(&self) -> Result<()> {
        let registrations = self.store.list().await?;
        let entries = project_registrations(&registrations);
        self.registry.replace_tool_entries(entries);
        Ok(())
    }

    /// Fill absent config values from overlay-declared environment variables
    #[cfg(feature = "mcp")]
    fn seed_env_config(&self, registration: &mut ToolRegistration, overlay: &McpOverlay) {
        for (field, var) in overlay.env_seeds() {
            if !registration.config.contains_key(&field) {
                if let Ok(value) = std::env::var(&var) {
                    registration.config.insert(field, value);
                }
            }
        }
    }
}

/// Disabled registrations keep their status no matter what changed
fn next_status(registration: &ToolRegistration, status: ToolStatus) -> ToolStatus {
    if registration.enabled {
        status
    } else {
        ToolStatus::Disabled
    }
}
