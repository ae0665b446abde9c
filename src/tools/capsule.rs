//! Capsule capture and maintenance tools.
//!
//! Tools: get_recent_capsules, create_capsule, update_capsule, delete_capsule

use serde_json::{Map, Value as JsonValue};

use crate::capsules::{self, DEFAULT_RECENT_LIMIT};
use crate::convert::{
    coerce_tags, get_optional_f64, get_optional_string, get_optional_string_array,
    get_string_arg, get_usize_or,
};
use crate::error::Result;
use crate::render;
use crate::schema;
use crate::session::McpSession;
use crate::tools::{ToolDef, ToolOutput};

/// Get all capsule tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "get_recent_capsules",
            "Get the most recent capsules, newest first. Pass days to only include capsules \
             captured within the last N days.",
            schema!(object {
                optional: { "limit": number = DEFAULT_RECENT_LIMIT, "days": number }
            }),
            recent,
        ),
        ToolDef::new(
            "create_capsule",
            "Capture a new capsule during the conversation. Content is trimmed and must not be \
             empty. Returns the stored capsule including its id.",
            schema!(object {
                required: { "content": string },
                optional: { "tags": array_string = Vec::<String>::new() }
            }),
            create,
        ),
        ToolDef::new(
            "update_capsule",
            "Replace the content and/or tags of an existing capsule. The original capture \
             time is kept.",
            schema!(object {
                required: { "id": string },
                optional: { "content": string, "tags": array_string }
            }),
            update,
        ),
        ToolDef::new(
            "delete_capsule",
            "Permanently delete a capsule by id.",
            schema!(object {
                required: { "id": string }
            }),
            delete,
        ),
    ]
}

fn recent(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let limit = get_usize_or(args, "limit", DEFAULT_RECENT_LIMIT)?;
    let days = get_optional_f64(args, "days")?;

    let result = capsules::recent(session.store()?, limit, days, session.now_millis())?;
    Ok(ToolOutput::new(
        render::recent(&result, days),
        serde_json::to_value(&result)?,
    ))
}

fn create(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let content = get_string_arg(args, "content")?;
    let tags = coerce_tags(args, "tags");

    let capsule = capsules::create(session.store()?, &content, tags, session.now_millis())?;
    tracing::debug!(id = %capsule.id, "created capsule");
    Ok(ToolOutput::new(
        render::created(&capsule),
        serde_json::to_value(&capsule)?,
    ))
}

fn update(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let id = get_string_arg(args, "id")?;
    let content = get_optional_string(args, "content")?;
    let tags = get_optional_string_array(args, "tags")?;

    let capsule = capsules::update(session.store()?, &id, content.as_deref(), tags)?;
    Ok(ToolOutput::new(
        render::updated(&capsule),
        serde_json::to_value(&capsule)?,
    ))
}

fn delete(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let id = get_string_arg(args, "id")?;

    capsules::delete(session.store()?, &id)?;
    Ok(ToolOutput::new(
        render::deleted(&id),
        serde_json::json!({ "id": id, "deleted": true }),
    ))
}
