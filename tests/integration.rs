//! Integration tests for the MCP server.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};

use capsule_mcp::store::{CapsuleFilter, CapsulePatch, CapsuleQuery, NewCapsule};
use capsule_mcp::{
    rpc_codes, Capsule, CapsuleStore, McpError, McpServer, McpSession, MemoryStore, StoreConfig,
    ToolOutput, ToolRegistry,
};

const DAY_MS: i64 = 86_400_000;

/// Create a test session with an in-memory store.
fn test_session() -> McpSession {
    McpSession::with_store(Arc::new(MemoryStore::new()))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Insert directly through the store, bypassing the create tool's clock.
fn seed(session: &McpSession, content: &str, tags: &[&str], timestamp: i64) -> Capsule {
    session
        .store()
        .expect("store should open")
        .insert(NewCapsule {
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            timestamp,
        })
        .expect("insert should succeed")
}

/// Helper to dispatch a tool call.
fn call_tool(
    session: &McpSession,
    registry: &ToolRegistry,
    name: &str,
    args: JsonValue,
) -> ToolOutput {
    let args_map: Map<String, JsonValue> = match args {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    };
    registry
        .dispatch(session, name, &args_map)
        .unwrap_or_else(|e| panic!("Tool {} failed: {}", name, e))
}

/// Helper to dispatch a tool call and expect an error.
fn call_tool_err(
    session: &McpSession,
    registry: &ToolRegistry,
    name: &str,
    args: JsonValue,
) -> McpError {
    let args_map: Map<String, JsonValue> = match args {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    };
    registry
        .dispatch(session, name, &args_map)
        .expect_err(&format!("Expected tool {} to fail", name))
}

/// Send one raw JSON-RPC message and return the serialized response.
fn rpc(server: &McpServer, message: JsonValue) -> JsonValue {
    let response = server
        .handle_message(&message.to_string())
        .expect("request should get a response");
    serde_json::to_value(&response).expect("response should serialize")
}

fn ids(output: &ToolOutput) -> Vec<String> {
    output.data["capsules"]
        .as_array()
        .expect("capsules array")
        .iter()
        .map(|c| c["id"].as_str().expect("id").to_string())
        .collect()
}

/// Store that counts every call before delegating.
struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl CapsuleStore for CountingStore {
    fn insert(&self, capsule: NewCapsule) -> capsule_mcp::Result<Capsule> {
        self.tick();
        self.inner.insert(capsule)
    }

    fn select(&self, query: &CapsuleQuery) -> capsule_mcp::Result<Vec<Capsule>> {
        self.tick();
        self.inner.select(query)
    }

    fn count(&self, filter: &CapsuleFilter) -> capsule_mcp::Result<usize> {
        self.tick();
        self.inner.count(filter)
    }

    fn update_by_id(&self, id: &str, patch: CapsulePatch) -> capsule_mcp::Result<Option<Capsule>> {
        self.tick();
        self.inner.update_by_id(id, patch)
    }

    fn delete_by_id(&self, id: &str) -> capsule_mcp::Result<bool> {
        self.tick();
        self.inner.delete_by_id(id)
    }
}

/// Store whose every operation fails.
struct FailingStore;

fn disk_failure<T>() -> capsule_mcp::Result<T> {
    Err(McpError::Store {
        message: "disk I/O error".to_string(),
    })
}

impl CapsuleStore for FailingStore {
    fn insert(&self, _capsule: NewCapsule) -> capsule_mcp::Result<Capsule> {
        disk_failure()
    }

    fn select(&self, _query: &CapsuleQuery) -> capsule_mcp::Result<Vec<Capsule>> {
        disk_failure()
    }

    fn count(&self, _filter: &CapsuleFilter) -> capsule_mcp::Result<usize> {
        disk_failure()
    }

    fn update_by_id(&self, _id: &str, _patch: CapsulePatch) -> capsule_mcp::Result<Option<Capsule>> {
        disk_failure()
    }

    fn delete_by_id(&self, _id: &str) -> capsule_mcp::Result<bool> {
        disk_failure()
    }
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_registry_has_all_tools() {
    let registry = ToolRegistry::new();
    let names: Vec<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();

    assert_eq!(
        names,
        vec![
            "search_capsules",
            "search_capsules_by_tags",
            "search_capsules_by_content",
            "get_capsules_by_tag",
            "get_recent_capsules",
            "create_capsule",
            "update_capsule",
            "delete_capsule",
            "get_capsule_stats",
            "get_tag_cloud",
        ]
    );
}

#[test]
fn test_tool_names_are_unique() {
    let registry = ToolRegistry::new();
    let names: HashSet<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names.len(), registry.tools().len());
}

#[test]
fn test_required_fields_are_declared_properties() {
    let registry = ToolRegistry::new();
    for tool in registry.tools() {
        assert!(!tool.description.is_empty(), "{} has no description", tool.name);
        assert_eq!(tool.input_schema["type"], "object");
        let props = tool.input_schema["properties"].as_object().unwrap();
        for required in tool.input_schema["required"].as_array().unwrap() {
            let name = required.as_str().unwrap();
            assert!(props.contains_key(name), "{}: {} not in properties", tool.name, name);
        }
    }
}

#[test]
fn test_core_schemas() {
    let registry = ToolRegistry::new();

    let by_tags = registry.get("search_capsules_by_tags").unwrap();
    assert_eq!(by_tags.input_schema["required"], json!(["tags"]));
    assert_eq!(by_tags.input_schema["properties"]["page"]["default"], json!(1));
    assert_eq!(by_tags.input_schema["properties"]["pageSize"]["default"], json!(10));

    let by_content = registry.get("search_capsules_by_content").unwrap();
    assert_eq!(by_content.input_schema["required"], json!(["query"]));

    let recent = registry.get("get_recent_capsules").unwrap();
    assert_eq!(recent.input_schema["required"], json!([]));
    assert_eq!(recent.input_schema["properties"]["limit"]["default"], json!(5));

    let create = registry.get("create_capsule").unwrap();
    assert_eq!(create.input_schema["required"], json!(["content"]));
    assert_eq!(create.input_schema["properties"]["tags"]["default"], json!([]));

    let stats = registry.get("get_capsule_stats").unwrap();
    assert_eq!(stats.input_schema["required"], json!([]));
}

// =============================================================================
// Search Tools
// =============================================================================

#[test]
fn test_create_then_search_round_trip() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let created = call_tool(
        &session,
        &registry,
        "create_capsule",
        json!({"content": "  Rust ownership notes  ", "tags": ["rust", "learning"]}),
    );
    let id = created.data["id"].as_str().unwrap().to_string();
    assert_eq!(created.data["content"], "Rust ownership notes");
    assert!(created.text.contains(&id));

    let by_tags = call_tool(
        &session,
        &registry,
        "search_capsules_by_tags",
        json!({"tags": ["rust"]}),
    );
    assert_eq!(ids(&by_tags), vec![id.clone()]);
    assert_eq!(by_tags.data["totalCount"], 1);

    let by_content = call_tool(
        &session,
        &registry,
        "search_capsules_by_content",
        json!({"query": "OWNERSHIP"}),
    );
    assert_eq!(ids(&by_content), vec![id]);
    assert!(by_content.text.contains("containing \"OWNERSHIP\""));
}

#[test]
fn test_tag_search_matches_any_tag() {
    let session = test_session();
    let registry = ToolRegistry::new();
    let now = now_millis();

    seed(&session, "a", &["rust"], now - 3);
    seed(&session, "b", &["go"], now - 2);
    seed(&session, "c", &["python"], now - 1);

    let result = call_tool(
        &session,
        &registry,
        "search_capsules_by_tags",
        json!({"tags": ["rust", "go"]}),
    );
    assert_eq!(result.data["totalCount"], 2);
    let contents: Vec<&str> = result.data["capsules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["b", "a"]);
}

#[test]
fn test_tag_search_is_case_sensitive() {
    let session = test_session();
    let registry = ToolRegistry::new();
    seed(&session, "a", &["Rust"], 1);

    let result = call_tool(
        &session,
        &registry,
        "search_capsules_by_tags",
        json!({"tags": ["rust"]}),
    );
    assert_eq!(result.data["totalCount"], 0);
    assert!(result.text.contains("No capsules found matching these tags."));
}

#[test]
fn test_pages_partition_matches() {
    let session = test_session();
    let registry = ToolRegistry::new();

    for i in 0..23 {
        seed(&session, &format!("note {i}"), &["bulk"], 1_000 + i);
    }

    let mut seen = HashSet::new();
    let mut collected = Vec::new();
    for page in 1..=5 {
        let result = call_tool(
            &session,
            &registry,
            "search_capsules_by_tags",
            json!({"tags": ["bulk"], "page": page, "pageSize": 5}),
        );
        assert_eq!(result.data["totalCount"], 23);
        let page_ids = ids(&result);
        assert_eq!(page_ids.len(), if page == 5 { 3 } else { 5 });
        for id in page_ids {
            assert!(seen.insert(id.clone()), "duplicate id across pages");
            collected.push(id);
        }
    }
    assert_eq!(collected.len(), 23);

    let beyond = call_tool(
        &session,
        &registry,
        "search_capsules_by_tags",
        json!({"tags": ["bulk"], "page": 6, "pageSize": 5}),
    );
    assert!(ids(&beyond).is_empty());
    assert_eq!(beyond.data["totalCount"], 23);
}

#[test]
fn test_page_footer() {
    let session = test_session();
    let registry = ToolRegistry::new();
    for i in 0..12 {
        seed(&session, "footer", &[], i);
    }

    let result = call_tool(
        &session,
        &registry,
        "search_capsules_by_content",
        json!({"query": "footer", "page": 2}),
    );
    assert_eq!(ids(&result).len(), 2);
    assert!(result.text.contains("📄 Page 2 of 2 (10 per page)"));
}

#[test]
fn test_search_rejects_empty_input_without_store_access() {
    let store = Arc::new(CountingStore::new());
    let session = McpSession::with_store(store.clone());
    let registry = ToolRegistry::new();

    let err = call_tool_err(
        &session,
        &registry,
        "search_capsules_by_content",
        json!({"query": "   "}),
    );
    assert_eq!(err.rpc_code(), rpc_codes::INVALID_PARAMS);

    let err = call_tool_err(&session, &registry, "search_capsules_by_tags", json!({"tags": []}));
    assert_eq!(err.rpc_code(), rpc_codes::INVALID_PARAMS);

    let err = call_tool_err(&session, &registry, "search_capsules_by_tags", json!({}));
    assert!(matches!(err, McpError::MissingArg(_)));

    let err = call_tool_err(
        &session,
        &registry,
        "search_capsules_by_tags",
        json!({"tags": ["x"], "pageSize": 0}),
    );
    assert_eq!(err.rpc_code(), rpc_codes::INVALID_PARAMS);

    assert_eq!(store.calls(), 0);
}

#[test]
fn test_get_capsules_by_tag_any_and_all() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let x = call_tool(&session, &registry, "create_capsule", json!({"content": "x", "tags": ["x"]}));
    let y = call_tool(&session, &registry, "create_capsule", json!({"content": "y", "tags": ["y"]}));
    let xy = call_tool(
        &session,
        &registry,
        "create_capsule",
        json!({"content": "xy", "tags": ["x", "y"]}),
    );

    let any = call_tool(
        &session,
        &registry,
        "get_capsules_by_tag",
        json!({"tags": ["x", "y"]}),
    );
    let any_ids: HashSet<String> = ids(&any).into_iter().collect();
    let expected: HashSet<String> = [&x, &y, &xy]
        .iter()
        .map(|o| o.data["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(any_ids, expected);
    assert!(any.text.contains("ANY"));

    let all = call_tool(
        &session,
        &registry,
        "get_capsules_by_tag",
        json!({"tags": ["x", "y"], "match_all": true}),
    );
    assert_eq!(ids(&all), vec![xy.data["id"].as_str().unwrap().to_string()]);
    assert!(all.text.contains("ALL"));
}

#[test]
fn test_combined_search_applies_every_filter() {
    let session = test_session();
    let registry = ToolRegistry::new();
    let now = now_millis();

    seed(&session, "Rust borrow checker", &["rust", "lang"], now - DAY_MS);
    seed(&session, "Rust async book", &["rust"], now - 12 * DAY_MS);
    seed(&session, "Borrowed ideas", &["misc"], now - 2 * DAY_MS);
    seed(&session, "Go generics", &["go"], now - 3 * DAY_MS);

    let result = call_tool(
        &session,
        &registry,
        "search_capsules",
        json!({"query": "RUST", "tags": ["rust", "go"], "days": 7}),
    );
    assert_eq!(result.data["totalCount"], 1);
    assert_eq!(result.data["capsules"][0]["content"], "Rust borrow checker");
    assert!(result.text.contains("(1 capsules found)"));
    assert!(!result.text.contains("Results limited"));

    let by_tags = call_tool(
        &session,
        &registry,
        "search_capsules",
        json!({"tags": ["rust", "go"]}),
    );
    let contents: Vec<&str> = by_tags.data["capsules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["Rust borrow checker", "Go generics", "Rust async book"]);

    let capped = call_tool(&session, &registry, "search_capsules", json!({"limit": 2}));
    assert_eq!(ids(&capped).len(), 2);
    assert!(capped.text.contains("Results limited to 2"));

    let none = call_tool(
        &session,
        &registry,
        "search_capsules",
        json!({"query": "python"}),
    );
    assert_eq!(none.data["totalCount"], 0);
    assert!(none.text.contains("No capsules found matching your criteria."));

    let err = call_tool_err(&session, &registry, "search_capsules", json!({"days": -2}));
    assert_eq!(err.rpc_code(), rpc_codes::INVALID_PARAMS);
}

#[test]
fn test_get_capsules_by_tag_limit() {
    let session = test_session();
    let registry = ToolRegistry::new();
    for i in 0..25 {
        seed(&session, "t", &["many"], i);
    }

    let default = call_tool(&session, &registry, "get_capsules_by_tag", json!({"tags": ["many"]}));
    assert_eq!(ids(&default).len(), 20);

    let limited = call_tool(
        &session,
        &registry,
        "get_capsules_by_tag",
        json!({"tags": ["many"], "limit": 3}),
    );
    assert_eq!(ids(&limited).len(), 3);
}

// =============================================================================
// Capsule Tools
// =============================================================================

#[test]
fn test_recent_defaults_to_five_newest() {
    let session = test_session();
    let registry = ToolRegistry::new();
    let now = now_millis();
    for i in 0..8 {
        seed(&session, &format!("r{i}"), &[], now - 1_000 * (8 - i));
    }

    let result = call_tool(&session, &registry, "get_recent_capsules", json!({}));
    let contents: Vec<&str> = result.data["capsules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["r7", "r6", "r5", "r4", "r3"]);
    assert!(result.text.contains("overall"));
}

#[test]
fn test_recent_days_window() {
    let session = test_session();
    let registry = ToolRegistry::new();
    let now = now_millis();

    seed(&session, "fresh", &[], now - 2 * DAY_MS);
    seed(&session, "stale", &[], now - 10 * DAY_MS);

    let windowed = call_tool(
        &session,
        &registry,
        "get_recent_capsules",
        json!({"days": 7, "limit": 10}),
    );
    assert_eq!(windowed.data["totalCount"], 1);
    assert_eq!(windowed.data["capsules"][0]["content"], "fresh");
    assert!(windowed.text.contains("from the last 7 days"));

    let unbounded = call_tool(
        &session,
        &registry,
        "get_recent_capsules",
        json!({"days": 0, "limit": 10}),
    );
    assert_eq!(unbounded.data["totalCount"], 2);

    let err = call_tool_err(&session, &registry, "get_recent_capsules", json!({"days": -1}));
    assert_eq!(err.rpc_code(), rpc_codes::INVALID_PARAMS);
}

#[test]
fn test_create_rejects_blank_content() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(&session, &registry, "create_capsule", json!({"content": "  \n "}));
    assert_eq!(err.rpc_code(), rpc_codes::INVALID_PARAMS);

    let err = call_tool_err(&session, &registry, "create_capsule", json!({}));
    assert!(matches!(err, McpError::MissingArg(_)));

    let stats = call_tool(&session, &registry, "get_capsule_stats", json!({}));
    assert_eq!(stats.data["totalCapsules"], 0);
}

#[test]
fn test_create_coerces_tags() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let untagged = call_tool(
        &session,
        &registry,
        "create_capsule",
        json!({"content": "plain", "tags": "not-a-list"}),
    );
    assert_eq!(untagged.data["tags"], json!([]));
    assert!(untagged.text.contains("No tags"));

    let mixed = call_tool(
        &session,
        &registry,
        "create_capsule",
        json!({"content": "mixed", "tags": ["ok", 3, null]}),
    );
    assert_eq!(mixed.data["tags"], json!(["ok"]));
}

#[test]
fn test_update_and_delete() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let created = seed(&session, "draft", &["wip"], 42);

    let updated = call_tool(
        &session,
        &registry,
        "update_capsule",
        json!({"id": created.id, "content": "final", "tags": ["done"]}),
    );
    assert_eq!(updated.data["content"], "final");
    assert_eq!(updated.data["tags"], json!(["done"]));
    assert_eq!(updated.data["timestamp"], 42);

    let tags_only = call_tool(
        &session,
        &registry,
        "update_capsule",
        json!({"id": created.id, "tags": []}),
    );
    assert_eq!(tags_only.data["content"], "final");
    assert_eq!(tags_only.data["tags"], json!([]));

    call_tool(&session, &registry, "delete_capsule", json!({"id": created.id}));
    let stats = call_tool(&session, &registry, "get_capsule_stats", json!({}));
    assert_eq!(stats.data["totalCapsules"], 0);

    let err = call_tool_err(&session, &registry, "delete_capsule", json!({"id": created.id}));
    assert!(matches!(err, McpError::NotFound(_)));

    let err = call_tool_err(
        &session,
        &registry,
        "update_capsule",
        json!({"id": "no-such-id", "content": "x"}),
    );
    assert!(matches!(err, McpError::NotFound(_)));
}

// =============================================================================
// Stats Tools
// =============================================================================

#[test]
fn test_stats_counts_windows_and_top_tags() {
    let session = test_session();
    let registry = ToolRegistry::new();
    let now = now_millis();

    seed(&session, "today", &["a", "b"], now - 1_000);
    seed(&session, "last week", &["a"], now - 3 * DAY_MS);
    seed(&session, "last month", &["a", "c"], now - 20 * DAY_MS);
    seed(&session, "old", &["d"], now - 90 * DAY_MS);

    let result = call_tool(&session, &registry, "get_capsule_stats", json!({}));
    assert_eq!(result.data["totalCapsules"], 4);
    assert_eq!(result.data["uniqueTags"], 4);
    assert_eq!(result.data["recentCapsules"], 2);
    assert_eq!(result.data["thisMonthCapsules"], 3);
    assert_eq!(result.data["topTags"][0], json!(["a", 3]));
    assert!(result.data.get("detail").is_none());
    assert!(result.text.contains("#a (3 capsules)"));
}

#[test]
fn test_stats_is_idempotent() {
    let session = test_session();
    let registry = ToolRegistry::new();
    seed(&session, "one", &["x"], 1);
    seed(&session, "two", &["x", "y"], 2);

    let first = call_tool(&session, &registry, "get_capsule_stats", json!({}));
    let second = call_tool(&session, &registry, "get_capsule_stats", json!({}));
    assert_eq!(first.data["totalCapsules"], second.data["totalCapsules"]);
    assert_eq!(first.data["uniqueTags"], second.data["uniqueTags"]);
    assert_eq!(first.data["topTags"], second.data["topTags"]);
}

#[test]
fn test_stats_detailed() {
    let session = test_session();
    let registry = ToolRegistry::new();
    let now = now_millis();
    seed(&session, "one", &["x"], now - 4 * DAY_MS);
    seed(&session, "two", &["x", "y"], now);

    let result = call_tool(&session, &registry, "get_capsule_stats", json!({"detailed": true}));
    let detail = &result.data["detail"];
    assert_eq!(detail["firstCapsule"], now - 4 * DAY_MS);
    assert_eq!(detail["latestCapsule"], now);
    assert_eq!(detail["averageTagsPerCapsule"], 1.5);
    assert!(result.text.contains("Detailed Analytics"));
}

#[test]
fn test_tag_cloud_min_count() {
    let session = test_session();
    let registry = ToolRegistry::new();
    for i in 0..3 {
        seed(&session, "p", &["popular"], i);
    }
    seed(&session, "r", &["rare", "popular"], 10);

    let all = call_tool(&session, &registry, "get_tag_cloud", json!({}));
    assert_eq!(all.data["tags"], json!([["popular", 4], ["rare", 1]]));
    assert!(all.text.contains("✨ #popular (4)"));
    assert!(all.text.contains("💫 #rare (1)"));

    let filtered = call_tool(&session, &registry, "get_tag_cloud", json!({"min_count": 2}));
    assert_eq!(filtered.data["tags"], json!([["popular", 4]]));
}

// =============================================================================
// JSON-RPC Dispatcher
// =============================================================================

#[test]
fn test_initialize() {
    let server = McpServer::new(test_session());
    let response = rpc(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}));

    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(response["result"]["serverInfo"]["name"], "capsule-mcp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[test]
fn test_tools_list_matches_registry() {
    let server = McpServer::new(test_session());
    let response = rpc(&server, json!({"jsonrpc": "2.0", "id": "list", "method": "tools/list"}));

    assert_eq!(response["id"], "list");
    let listed = response["result"]["tools"].as_array().unwrap();
    assert_eq!(listed.len(), server.registry().tools().len());
    for (wire, def) in listed.iter().zip(server.registry().tools()) {
        assert_eq!(wire["name"], def.name.as_str());
        assert_eq!(wire["inputSchema"], def.input_schema);
    }
}

#[test]
fn test_tools_call_wraps_text_content() {
    let server = McpServer::new(test_session());
    let response = rpc(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "create_capsule", "arguments": {"content": "hello", "tags": ["greeting"]}}
        }),
    );

    assert_eq!(response["id"], 7);
    let content = response["result"]["content"].as_array().unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0]["type"], "text");
    assert!(content[0]["text"].as_str().unwrap().contains("hello"));
}

#[test]
fn test_parse_error() {
    let server = McpServer::new(test_session());
    let response = server.handle_message("{\"jsonrpc\": \"2.0\", ").unwrap();
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["id"], JsonValue::Null);
    assert_eq!(json["error"]["code"], rpc_codes::PARSE_ERROR);
}

#[test]
fn test_unknown_method_and_tool() {
    let server = McpServer::new(test_session());

    let response = rpc(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}));
    assert_eq!(response["error"]["code"], rpc_codes::METHOD_NOT_FOUND);
    assert_eq!(response["error"]["message"], "Method not found: resources/list");

    let response = rpc(
        &server,
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "nope"}}),
    );
    assert_eq!(response["id"], 3);
    assert_eq!(response["error"]["code"], rpc_codes::METHOD_NOT_FOUND);
    assert_eq!(response["error"]["message"], "Unknown tool: nope");
}

#[test]
fn test_missing_tool_name() {
    let server = McpServer::new(test_session());
    let response = rpc(
        &server,
        json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"arguments": {}}}),
    );
    assert_eq!(response["error"]["code"], rpc_codes::INVALID_PARAMS);
}

#[test]
fn test_validation_error_is_invalid_params() {
    let server = McpServer::new(test_session());
    let response = rpc(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "search_capsules_by_content", "arguments": {"query": ""}}
        }),
    );
    assert_eq!(response["error"]["code"], rpc_codes::INVALID_PARAMS);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Error executing search_capsules_by_content:"));
}

#[test]
fn test_store_failure_is_internal_error() {
    let server = McpServer::new(McpSession::with_store(Arc::new(FailingStore)));
    let response = rpc(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "tools/call",
            "params": {"name": "get_capsule_stats", "arguments": {}}
        }),
    );
    assert_eq!(response["id"], 6);
    assert_eq!(response["error"]["code"], rpc_codes::INTERNAL_ERROR);
    let message = response["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Error executing get_capsule_stats:"));
    assert!(message.contains("disk I/O error"));
}

#[test]
fn test_ping_and_notifications() {
    let server = McpServer::new(test_session());

    let response = rpc(&server, json!({"jsonrpc": "2.0", "id": 8, "method": "ping"}));
    assert_eq!(response["result"], json!({}));

    let none = server.handle_message(
        &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
    );
    assert!(none.is_none());

    let rejected = rpc(
        &server,
        json!({"jsonrpc": "1.0", "method": "notifications/initialized"}),
    );
    assert_eq!(rejected["id"], JsonValue::Null);
    assert_eq!(rejected["error"]["code"], rpc_codes::INVALID_REQUEST);
}

// =============================================================================
// SQLite Store
// =============================================================================

#[test]
fn test_sqlite_session_persists_across_opens() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("capsules.db");
    let registry = ToolRegistry::new();

    {
        let session = McpSession::new(StoreConfig::Sqlite {
            path: path.clone(),
            read_only: false,
        });
        call_tool(
            &session,
            &registry,
            "create_capsule",
            json!({"content": "Persisted thought", "tags": ["disk", "sqlite"]}),
        );
        call_tool(
            &session,
            &registry,
            "create_capsule",
            json!({"content": "Another one", "tags": ["disk"]}),
        );
    }

    let session = McpSession::new(StoreConfig::Sqlite {
        path: path.clone(),
        read_only: true,
    });

    let all = call_tool(
        &session,
        &registry,
        "get_capsules_by_tag",
        json!({"tags": ["disk", "sqlite"], "match_all": true}),
    );
    assert_eq!(all.data["totalCount"], 1);
    assert_eq!(all.data["capsules"][0]["content"], "Persisted thought");

    let found = call_tool(
        &session,
        &registry,
        "search_capsules_by_content",
        json!({"query": "persisted"}),
    );
    assert_eq!(found.data["totalCount"], 1);

    let err = call_tool_err(&session, &registry, "create_capsule", json!({"content": "nope"}));
    assert_eq!(err.rpc_code(), rpc_codes::INTERNAL_ERROR);
}

#[test]
fn test_sqlite_pagination_matches_memory() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let sqlite = McpSession::new(StoreConfig::Sqlite {
        path: dir.path().join("capsules.db"),
        read_only: false,
    });
    let memory = test_session();
    let registry = ToolRegistry::new();

    for i in 0..13 {
        let tags: &[&str] = if i % 2 == 0 { &["even"] } else { &["odd"] };
        let content = if i % 3 == 0 {
            format!("CAFÉ ÜBER item {i}")
        } else {
            format!("item {i}")
        };
        seed(&sqlite, &content, tags, 500 + i);
        seed(&memory, &content, tags, 500 + i);
    }

    let contents = |o: &ToolOutput| -> Vec<String> {
        o.data["capsules"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["content"].as_str().unwrap().to_string())
            .collect()
    };

    for page in 1..=3 {
        let args = json!({"tags": ["even"], "page": page, "pageSize": 3});
        let a = call_tool(&sqlite, &registry, "search_capsules_by_tags", args.clone());
        let b = call_tool(&memory, &registry, "search_capsules_by_tags", args);
        assert_eq!(a.data["totalCount"], b.data["totalCount"]);
        assert_eq!(contents(&a), contents(&b));
    }

    for page in 1..=3 {
        let args = json!({"query": "café über", "page": page, "pageSize": 2});
        let a = call_tool(&sqlite, &registry, "search_capsules_by_content", args.clone());
        let b = call_tool(&memory, &registry, "search_capsules_by_content", args);
        assert_eq!(a.data["totalCount"], 5);
        assert_eq!(b.data["totalCount"], 5);
        assert_eq!(contents(&a), contents(&b));
    }
}
