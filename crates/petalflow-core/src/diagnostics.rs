//! Diagnostics emitted by the workflow and graph validators
//!
//! Validators collect diagnostics instead of failing on the first problem,
//! so a single pass surfaces everything the caller needs to fix.

use serde::{Deserialize, Serialize};

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validator finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code, e.g. `AT-001` or `GR-004`
    pub code: String,
    pub severity: Severity,
    pub message: String,
    /// Document path of the offending element, e.g. `$.tasks.research.agent`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Field name, for registration validation findings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Diagnostic {
    pub fn new(code: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            path: None,
            line: None,
            field: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// True if any diagnostic in the list is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Workflow validator codes
pub mod workflow {
    pub const UNDEFINED_AGENT: &str = "AT-001";
    pub const INVALID_PROVIDER: &str = "AT-002";
    pub const UNKNOWN_TOOL: &str = "AT-004";
    pub const INVALID_STRATEGY: &str = "AT-005";
    pub const MISSING_TASK_ORDER: &str = "AT-006";
    pub const CYCLE_DETECTED: &str = "AT-007";
    pub const UNRESOLVED_REF: &str = "AT-008";
    pub const ORPHAN_TASK: &str = "AT-009";
    pub const MISSING_REQUIRED: &str = "AT-010";
    pub const INVALID_ID_FORMAT: &str = "AT-012";
}

/// Graph validator codes
pub mod graph {
    pub const UNKNOWN_ENDPOINT: &str = "GR-001";
    pub const ORPHAN_NODE: &str = "GR-002";
    pub const UNKNOWN_NODE_TYPE: &str = "GR-003";
    pub const CYCLE: &str = "GR-004";
    pub const DUPLICATE_NODE_ID: &str = "GR-005";
    pub const UNKNOWN_SOURCE_HANDLE: &str = "GR-006";
    pub const UNKNOWN_ENTRY: &str = "GR-007";
    pub const FUNCTION_CALL_AS_NODE: &str = "GR-008";
    pub const TRIGGER_WITH_INBOUND: &str = "GR-009";
}

/// Conditional-node codes
pub mod conditional {
    pub const BRANCH_NO_DOWNSTREAM: &str = "CN-001";
    pub const NO_DEFAULT: &str = "CN-003";
    pub const BAD_EXPRESSION: &str = "CN-004";
    pub const RESERVED_BRANCH_NAME: &str = "CN-005";
    pub const NO_CONDITIONS: &str = "CN-006";
}

/// Tool registration codes
pub mod registration {
    pub const NAME_NOT_UNIQUE: &str = "NAME_NOT_UNIQUE";
    pub const SCHEMA_INVALID: &str = "SCHEMA_INVALID";
    pub const TYPE_INVALID: &str = "TYPE_INVALID";
    pub const CONFIG_INCOMPLETE: &str = "CONFIG_INCOMPLETE";
    pub const SENSITIVE_IN_PLAIN_CONFIG: &str = "SENSITIVE_IN_PLAIN_CONFIG";
}
