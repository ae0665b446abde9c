//! Aggregation tools.
//!
//! Tools: get_capsule_stats, get_tag_cloud

use serde_json::{Map, Value as JsonValue};

use crate::capsules::{self, DEFAULT_MIN_TAG_COUNT};
use crate::convert::{get_optional_bool, get_usize_or};
use crate::error::Result;
use crate::render;
use crate::schema;
use crate::session::McpSession;
use crate::tools::{ToolDef, ToolOutput};

/// Get all aggregation tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "get_capsule_stats",
            "Get statistics about the knowledge base: total capsules, unique tags, capsules \
             from the last 7 and 30 days, and the five most used tags.",
            schema!(object {
                optional: { "detailed": boolean = false }
            }),
            stats,
        ),
        ToolDef::new(
            "get_tag_cloud",
            "Get every tag with its usage count, most used first.",
            schema!(object {
                optional: { "min_count": number = DEFAULT_MIN_TAG_COUNT }
            }),
            tag_cloud,
        ),
    ]
}

fn stats(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let detailed = get_optional_bool(args, "detailed")?.unwrap_or(false);

    let stats = capsules::stats(session.store()?, session.now_millis(), detailed)?;
    Ok(ToolOutput::new(
        render::stats(&stats),
        serde_json::to_value(&stats)?,
    ))
}

fn tag_cloud(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let min_count = get_usize_or(args, "min_count", DEFAULT_MIN_TAG_COUNT)?;

    let cloud = capsules::tag_cloud(session.store()?, min_count)?;
    Ok(ToolOutput::new(
        render::tag_cloud(&cloud, min_count),
        serde_json::json!({ "tags": cloud }),
    ))
}
