//! PetalFlow Core - agent-workflow compiler, graph IR, and tool service
//!
//! This crate provides the core functionality of the PetalFlow engine:
//! - Agent-workflow schema, parsing, and validation
//! - The compiler that turns workflows into typed node graphs
//! - The graph IR with structural and registry-aware validation
//! - The node-type registry consumed by the compiler and validators
//! - The tool service: registration lifecycle, MCP discovery, health
//!   probing, secret masking, and node-type projection

pub mod compiler;
pub mod contracts;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod registry;
pub mod template;
pub mod tools;
pub mod workflow;

pub use compiler::{COMPILER_VERSION, compile};
pub use contracts::{HumanHandler, HumanRequest, HumanResponse, LlmClient};
pub use diagnostics::{Diagnostic, Severity, has_errors};
pub use error::{Error, Result};
pub use graph::config::{
    ConditionalConfig, HumanConfig, LlmPromptConfig, LlmRouterConfig, MergeConfig, NodeConfig,
    ToolNodeConfig,
};
pub use graph::validate::{validate_structure, validate_with_registry};
pub use graph::{EdgeDef, GraphDefinition, NodeDef};
pub use registry::{
    NodePorts, NodeTypeDef, NodeTypeRegistry, PortDef, PortType, ToolMode, resolve_tool_mode,
};
pub use workflow::{
    AgentConfig, AgentSpec, AgentWorkflow, CustomTaskSpec, ExecutionSpec, Strategy, TaskSpec,
    validate::validate as validate_workflow,
};

// Tool subsystem exports
pub use tools::adapter::{
    AdapterFactory, InvokeError, InvokeErrorCode, InvokeRequest, InvokeResult, ToolAdapter,
};
pub use tools::health::HealthReport;
pub use tools::manifest::{
    ActionSpec, FieldSpec, HealthSpec, HealthStrategy, MANIFEST_VERSION, ToolInfo, ToolManifest,
    TransportSpec, TransportType,
};
pub use tools::overlay::{McpOverlay, OVERLAY_VERSION, OverlayConfigField, apply_overlay};
pub use tools::projection::project_registrations;
pub use tools::secrets::MASKED_SENTINEL;
pub use tools::service::{CreateToolRequest, ListFilter, ToolService, UpdateToolRequest};
pub use tools::store::{MemoryToolStore, ToolStore};
pub use tools::{ToolOrigin, ToolRegistration, ToolStatus};
