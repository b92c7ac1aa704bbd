//! Tool service integration tests
//!
//! Exercises the lifecycle end to end against the in-memory store: create,
//! masking, update round-trips, enable/disable, projection into the
//! node-type registry, and test invocation through a stub adapter factory.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use petalflow_core::{
    ActionSpec, AdapterFactory, CreateToolRequest, Error, FieldSpec, InvokeError, InvokeErrorCode,
    InvokeRequest, InvokeResult, ListFilter, MANIFEST_VERSION, MASKED_SENTINEL, MemoryToolStore,
    NodeTypeRegistry, PortDef, PortType, ToolAdapter, ToolManifest, ToolMode, ToolOrigin,
    ToolRegistration, ToolService, ToolStatus, UpdateToolRequest,
};

/// Adapter that echoes its inputs back as outputs
struct EchoAdapter;

#[async_trait]
impl ToolAdapter for EchoAdapter {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResult, InvokeError> {
        Ok(InvokeResult {
            outputs: request.inputs,
            metadata: BTreeMap::new(),
            duration_ms: 3,
        })
    }

    async fn close(&self) {}
}

struct EchoFactory;

#[async_trait]
impl AdapterFactory for EchoFactory {
    async fn adapter_for(
        &self,
        _registration: &ToolRegistration,
    ) -> petalflow_core::Result<Box<dyn ToolAdapter>> {
        Ok(Box::new(EchoAdapter))
    }
}

fn manifest(name: &str) -> ToolManifest {
    let mut manifest = ToolManifest {
        manifest_version: MANIFEST_VERSION.to_string(),
        ..Default::default()
    };
    manifest.tool.name = name.to_string();
    manifest.tool.version = "1.0.0".to_string();
    manifest.actions.insert(
        "run".to_string(),
        ActionSpec {
            inputs: vec![PortDef::new("query", PortType::String)],
            outputs: vec![PortDef::new("output", PortType::Object)],
            description: "Run it".to_string(),
            ..Default::default()
        },
    );
    manifest
}

fn manifest_with_secret(name: &str) -> ToolManifest {
    let mut m = manifest(name);
    m.config.insert(
        "api_key".to_string(),
        FieldSpec {
            field_type: "secret".to_string(),
            required: true,
            sensitive: true,
            default: None,
        },
    );
    m
}

fn service() -> (ToolService, Arc<NodeTypeRegistry>, Arc<MemoryToolStore>) {
    let store = Arc::new(MemoryToolStore::new());
    let registry = Arc::new(NodeTypeRegistry::new());
    let service = ToolService::new(store.clone(), registry.clone(), Arc::new(EchoFactory));
    (service, registry, store)
}

fn create_request(name: &str) -> CreateToolRequest {
    CreateToolRequest {
        name: name.to_string(),
        origin: ToolOrigin::Native,
        manifest: manifest(name),
        config: BTreeMap::new(),
        secrets: BTreeMap::new(),
    }
}

#[tokio::test]
async fn create_projects_node_types() {
    let (service, registry, _) = service();
    service.create(create_request("search")).await.unwrap();

    assert!(registry.has_tool("search.run"));
    assert!(registry.has_tool("search"));
    assert_eq!(registry.tool_mode("search.run"), Some(ToolMode::FunctionCall));
}

#[tokio::test]
async fn duplicate_name_rejected() {
    let (service, _, _) = service();
    service.create(create_request("search")).await.unwrap();

    let error = service.create(create_request("search")).await.unwrap_err();
    match error {
        Error::Registration(diagnostics) => {
            assert!(diagnostics.iter().any(|d| d.code == "NAME_NOT_UNIQUE"));
        }
        other => panic!("expected registration error, got {:?}", other),
    }
}

#[tokio::test]
async fn sensitive_field_rejected_on_plain_path() {
    let (service, _, _) = service();

    let mut request = create_request("vault");
    request.manifest = manifest_with_secret("vault");
    request
        .config
        .insert("api_key".to_string(), "sk-live-123".to_string());

    let error = service.create(request).await.unwrap_err();
    match error {
        Error::Registration(diagnostics) => {
            assert!(
                diagnostics
                    .iter()
                    .any(|d| d.code == "SENSITIVE_IN_PLAIN_CONFIG")
            );
        }
        other => panic!("expected registration error, got {:?}", other),
    }
}

#[tokio::test]
async fn secrets_masked_on_every_read() {
    let (service, _, store) = service();

    let mut request = create_request("vault");
    request.manifest = manifest_with_secret("vault");
    request
        .secrets
        .insert("api_key".to_string(), "sk-live-123".to_string());

    let created = service.create(request).await.unwrap();
    assert_eq!(created.config["api_key"], MASKED_SENTINEL);

    let fetched = service.get("vault").await.unwrap();
    assert_eq!(fetched.config["api_key"], MASKED_SENTINEL);

    let listed = service.list(ListFilter::default()).await.unwrap();
    assert_eq!(listed[0].config["api_key"], MASKED_SENTINEL);

    // The store keeps the real value; the sentinel is never persisted
    let stored = store_get(&store, "vault").await;
    assert_eq!(stored.config["api_key"], "sk-live-123");
}

#[tokio::test]
async fn masked_update_keeps_stored_secret() {
    let (service, _, store) = service();

    let mut request = create_request("vault");
    request.manifest = manifest_with_secret("vault");
    request
        .secrets
        .insert("api_key".to_string(), "sk-live-123".to_string());
    service.create(request).await.unwrap();

    // Round-trip edit: the client sends back what it read
    let mut edit = BTreeMap::new();
    edit.insert("api_key".to_string(), MASKED_SENTINEL.to_string());
    service
        .update(
            "vault",
            UpdateToolRequest {
                config: None,
                secrets: Some(edit),
            },
        )
        .await
        .unwrap();

    let stored = store_get(&store, "vault").await;
    assert_eq!(stored.config["api_key"], "sk-live-123");
}

#[tokio::test]
async fn store_idempotence_under_masking() {
    use petalflow_core::ToolStore;

    let store = MemoryToolStore::new();
    let registration =
        ToolRegistration::new("echo", ToolOrigin::Native, manifest("echo")).with_config(
            [("region".to_string(), "eu".to_string())].into_iter().collect(),
        );

    store.upsert(registration.clone()).await.unwrap();
    let fetched = store.get("echo").await.unwrap().unwrap();

    assert_eq!(fetched.name, registration.name);
    assert_eq!(fetched.config, registration.config);
    assert_eq!(fetched.enabled, registration.enabled);
}

#[tokio::test]
async fn disable_drops_projection() {
    let (service, registry, _) = service();
    service.create(create_request("search")).await.unwrap();
    assert!(registry.has_tool("search.run"));

    let disabled = service.set_enabled("search", false).await.unwrap();
    assert_eq!(disabled.status, ToolStatus::Disabled);
    assert!(!registry.has_tool("search.run"));

    let enabled = service.set_enabled("search", true).await.unwrap();
    assert_eq!(enabled.status, ToolStatus::Unverified);
    assert!(registry.has_tool("search.run"));
}

#[tokio::test]
async fn delete_drops_projection() {
    let (service, registry, _) = service();
    service.create(create_request("search")).await.unwrap();

    service.delete("search").await.unwrap();
    assert!(!registry.has_tool("search.run"));

    let error = service.delete("search").await.unwrap_err();
    assert!(matches!(error, Error::NotFound(_)));
}

#[tokio::test]
async fn list_filters() {
    let (service, _, _) = service();
    service.create(create_request("native_tool")).await.unwrap();

    let mut http_request = create_request("http_tool");
    http_request.origin = ToolOrigin::Http;
    http_request.manifest.transport.transport_type = petalflow_core::TransportType::Http;
    http_request.manifest.transport.endpoint = Some("https://api.example.com".to_string());
    service.create(http_request).await.unwrap();

    service.set_enabled("http_tool", false).await.unwrap();

    let all = service.list(ListFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let without_native = service
        .list(ListFilter {
            include_native: false,
            enabled_only: false,
        })
        .await
        .unwrap();
    assert_eq!(without_native.len(), 1);
    assert_eq!(without_native[0].name, "http_tool");

    let enabled_only = service
        .list(ListFilter {
            include_native: true,
            enabled_only: true,
        })
        .await
        .unwrap();
    assert_eq!(enabled_only.len(), 1);
    assert_eq!(enabled_only[0].name, "native_tool");
}

#[tokio::test]
async fn refresh_rejected_for_non_mcp() {
    let (service, _, _) = service();
    service.create(create_request("search")).await.unwrap();

    let error = service.refresh("search").await.unwrap_err();
    assert!(matches!(error, Error::Unsupported(_)));
}

#[tokio::test]
async fn test_invoke_round_trip() {
    let (service, _, _) = service();
    service.create(create_request("echo")).await.unwrap();

    let result = service
        .test_invoke("echo", "run", serde_json::json!({"query": "hello"}))
        .await
        .unwrap();

    assert_eq!(result.outputs["query"], "hello");
    assert!(result.metadata.contains_key("invocation_id"));
}

#[tokio::test]
async fn test_invoke_error_mapping() {
    let (service, _, _) = service();
    service.create(create_request("echo")).await.unwrap();

    let missing_tool = service
        .test_invoke("ghost", "run", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(missing_tool.code, InvokeErrorCode::NotFound);
    assert_eq!(missing_tool.http_status(), 404);

    let missing_action = service
        .test_invoke("echo", "fly", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(missing_action.code, InvokeErrorCode::NotFound);

    service.set_enabled("echo", false).await.unwrap();
    let disabled = service
        .test_invoke("echo", "run", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(disabled.code, InvokeErrorCode::Validation);
    assert_eq!(disabled.http_status(), 400);
}

#[tokio::test]
async fn projection_visible_to_compile() {
    let (service, registry, _) = service();

    // Register a standalone tool (bytes output infers the mode)
    let mut request = create_request("loader");
    request
        .manifest
        .actions
        .get_mut("run")
        .unwrap()
        .outputs = vec![PortDef::new("output", PortType::Bytes)];
    service.create(request).await.unwrap();

    let workflow = petalflow_core::AgentWorkflow::from_value(serde_json::json!({
        "version": "1",
        "kind": "agent_workflow",
        "id": "wf",
        "name": "Uses tools",
        "agents": {
            "a1": {
                "role": "Agent",
                "goal": "Work",
                "provider": "anthropic",
                "model": "claude-sonnet-4",
                "tools": ["loader"]
            }
        },
        "tasks": {
            "t1": {"description": "Do", "agent": "a1", "expected_output": "Out"}
        },
        "execution": {"strategy": "sequential", "task_order": ["t1"]}
    }))
    .unwrap();

    let diagnostics = petalflow_core::validate_workflow(&workflow, &registry);
    assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);

    let graph = petalflow_core::compile(&workflow, &registry).unwrap();
    // Undotted reference expanded to the registered action, standalone mode
    assert!(graph.node("t1__loader_run").is_some());
    assert_eq!(graph.entry.as_deref(), Some("t1__loader_run"));
}

async fn store_get(store: &MemoryToolStore, name: &str) -> ToolRegistration {
    use petalflow_core::ToolStore;
    store.get(name).await.unwrap().unwrap()
}
