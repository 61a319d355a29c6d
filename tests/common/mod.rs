#![allow(dead_code)]

use axum::Router;
use footprint_sdk::{footprint_routes, AppState, FootprintService, FullConfig, Record};
use serde_json::{json, Value};

/// Blog schema: users with roles (through user_role), posts, a profile; tags keyed by uuid.
pub fn blog_config(store: Value) -> FullConfig {
    serde_json::from_value(json!({
        "database": {
            "stores": { "main": store },
            "models": { "migrate": "drop", "has_timestamps": false }
        },
        "footprints": { "default_limit": 50 },
        "models": [
            {
                "name": "User",
                "columns": [{ "name": "name", "type": "string" }],
                "relations": {
                    "roles": { "kind": "belongs_to_many", "model": "Role", "through": "UserRole" },
                    "posts": { "kind": "has_many", "model": "Post" },
                    "profile": { "kind": "has_one", "model": "Profile" }
                }
            },
            {
                "name": "Role",
                "has_timestamps": true,
                "columns": [{ "name": "name", "type": "string" }]
            },
            {
                "name": "UserRole",
                "columns": [
                    { "name": "user_id", "type": "integer", "references": { "model": "User", "on_delete": "CASCADE" } },
                    { "name": "role_id", "type": "integer", "references": { "model": "Role", "on_delete": "CASCADE" } }
                ]
            },
            {
                "name": "Profile",
                "columns": [
                    { "name": "first_name", "type": "string" },
                    { "name": "last_name", "type": "string" },
                    { "name": "user_id", "type": "integer" }
                ]
            },
            {
                "name": "Post",
                "columns": [
                    { "name": "title", "type": "string" },
                    { "name": "text", "type": "text" },
                    { "name": "user_id", "type": "integer" }
                ],
                "relations": { "user": { "kind": "belongs_to", "model": "User" } }
            },
            {
                "name": "Tag",
                "id_type": "uuid",
                "columns": [{ "name": "label", "type": "string" }]
            }
        ]
    }))
    .expect("blog config deserializes")
}

pub async fn setup_service() -> FootprintService {
    FootprintService::initialize(&blog_config(json!({ "client": "memory" })))
        .await
        .expect("memory service starts")
}

pub fn setup_test_app(service: FootprintService) -> Router {
    Router::new().nest("/api/v1", footprint_routes(AppState::new(service)))
}

pub fn record(v: Value) -> Record {
    match v {
        Value::Object(m) => m,
        other => panic!("expected an object, got {}", other),
    }
}

/// True when every field of `expected` appears in `actual` with the same value.
pub fn includes(actual: &Record, expected: &Value) -> bool {
    expected
        .as_object()
        .map(|fields| fields.iter().all(|(k, v)| actual.get(k) == Some(v)))
        .unwrap_or(false)
}
