//! Capsule search tools.
//!
//! Tools: search_capsules, search_capsules_by_tags, search_capsules_by_content, get_capsules_by_tag

use serde_json::{Map, Value as JsonValue};

use crate::capsules::{
    self, Pagination, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_LIMIT, DEFAULT_TAG_LIMIT,
};
use crate::convert::{
    get_optional_bool, get_optional_f64, get_optional_string, get_optional_string_array,
    get_string_arg, get_string_array_arg, get_usize_or,
};
use crate::error::Result;
use crate::render;
use crate::schema;
use crate::session::McpSession;
use crate::tools::{ToolDef, ToolOutput};

/// Get all search tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "search_capsules",
            "Search capsules by content, tags and date range at once. Every criterion is \
             optional and all given criteria must match: query is a case-insensitive \
             substring of the content, tags match when any overlaps, days keeps the last N \
             days. Results are newest first, up to limit.",
            schema!(object {
                optional: {
                    "query": string,
                    "tags": array_string,
                    "days": number,
                    "limit": number = DEFAULT_SEARCH_LIMIT
                }
            }),
            search,
        ),
        ToolDef::new(
            "search_capsules_by_tags",
            "Search capsules that carry any of the given tags. Use this when the user wants \
             everything filed under one or more topics. Results are newest first and paginated; \
             the total count covers all matches.",
            schema!(object {
                required: { "tags": array_string },
                optional: { "page": number = DEFAULT_PAGE, "pageSize": number = DEFAULT_PAGE_SIZE }
            }),
            search_by_tags,
        ),
        ToolDef::new(
            "search_capsules_by_content",
            "Search capsule content for a keyword or phrase (case-insensitive substring match, \
             tags are not searched). Results are newest first and paginated.",
            schema!(object {
                required: { "query": string },
                optional: { "page": number = DEFAULT_PAGE, "pageSize": number = DEFAULT_PAGE_SIZE }
            }),
            search_by_content,
        ),
        ToolDef::new(
            "get_capsules_by_tag",
            "Retrieve capsules by tag. With match_all=true only capsules carrying every given \
             tag are returned; otherwise any tag matches.",
            schema!(object {
                required: { "tags": array_string },
                optional: { "match_all": boolean = false, "limit": number = DEFAULT_TAG_LIMIT }
            }),
            by_tag,
        ),
    ]
}

fn pagination(args: &Map<String, JsonValue>) -> Result<Pagination> {
    Pagination::new(
        get_usize_or(args, "page", DEFAULT_PAGE)?,
        get_usize_or(args, "pageSize", DEFAULT_PAGE_SIZE)?,
    )
}

fn search(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let query = get_optional_string(args, "query")?;
    let tags = get_optional_string_array(args, "tags")?.unwrap_or_default();
    let days = get_optional_f64(args, "days")?;
    let limit = get_usize_or(args, "limit", DEFAULT_SEARCH_LIMIT)?;

    let result = capsules::search(
        session.store()?,
        query.as_deref(),
        &tags,
        days,
        limit,
        session.now_millis(),
    )?;
    Ok(ToolOutput::new(
        render::search(&result, limit),
        serde_json::to_value(&result)?,
    ))
}

fn search_by_tags(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let tags = get_string_array_arg(args, "tags")?;
    let page = pagination(args)?;

    let result = capsules::search_by_tags(session.store()?, &tags, page)?;
    Ok(ToolOutput::new(
        render::tag_search(&result, &tags, page),
        serde_json::to_value(&result)?,
    ))
}

fn search_by_content(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let query = get_string_arg(args, "query")?;
    let page = pagination(args)?;

    let result = capsules::search_by_content(session.store()?, &query, page)?;
    Ok(ToolOutput::new(
        render::content_search(&result, &query, page),
        serde_json::to_value(&result)?,
    ))
}

fn by_tag(session: &McpSession, args: &Map<String, JsonValue>) -> Result<ToolOutput> {
    let tags = get_string_array_arg(args, "tags")?;
    let match_all = get_optional_bool(args, "match_all")?.unwrap_or(false);
    let limit = get_usize_or(args, "limit", DEFAULT_TAG_LIMIT)?;

    let result = capsules::capsules_by_tag(session.store()?, &tags, match_all, limit)?;
    Ok(ToolOutput::new(
        render::by_tag(&result, &tags, match_all),
        serde_json::to_value(&result)?,
    ))
}
