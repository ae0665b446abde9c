//! Markdown text rendered into `tools/call` responses.

use chrono::{DateTime, Utc};

use crate::capsules::{CapsuleSearchResult, CapsuleStats, Pagination};
use crate::store::Capsule;

const RULE: &str = "\n\n---\n\n";

fn format_time(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn format_date(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn format_tags(tags: &[String], separator: &str) -> String {
    if tags.is_empty() {
        "No tags".to_string()
    } else {
        tags.iter()
            .map(|t| format!("#{t}"))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

fn capsule_block(capsule: &Capsule) -> String {
    format!(
        "🌟 **CAPSULE** ({})\n📝 {}\n🏷️ {}\n🆔 {}",
        format_time(capsule.timestamp),
        capsule.content,
        format_tags(&capsule.tags, " "),
        capsule.id
    )
}

fn capsule_list(capsules: &[Capsule], empty: &str) -> String {
    if capsules.is_empty() {
        empty.to_string()
    } else {
        capsules
            .iter()
            .map(capsule_block)
            .collect::<Vec<_>>()
            .join(RULE)
    }
}

fn page_footer(result: &CapsuleSearchResult, page: Pagination) -> String {
    format!(
        "📄 Page {} of {} ({} per page)",
        page.page,
        page.total_pages(result.total_count),
        page.page_size
    )
}

/// Text for `search_capsules`.
pub fn search(result: &CapsuleSearchResult, limit: usize) -> String {
    let mut text = format!(
        "🔍 **Search Results** ({} capsules found)\n\n{}",
        result.total_count,
        capsule_list(&result.capsules, "No capsules found matching your criteria.")
    );
    if limit > 0 && result.capsules.len() == limit {
        text.push_str(&format!(
            "\n\n⚠️ Results limited to {limit}. Use a higher limit to see more."
        ));
    }
    text
}

/// Text for `search_capsules_by_tags`.
pub fn tag_search(result: &CapsuleSearchResult, tags: &[String], page: Pagination) -> String {
    format!(
        "🏷️ **Tag Search Results** (found {} capsules tagged {})\n\n{}\n\n{}",
        result.total_count,
        format_tags(tags, ", "),
        capsule_list(&result.capsules, "No capsules found matching these tags."),
        page_footer(result, page)
    )
}

/// Text for `search_capsules_by_content`.
pub fn content_search(result: &CapsuleSearchResult, query: &str, page: Pagination) -> String {
    format!(
        "🔍 **Content Search Results** (found {} capsules containing \"{}\")\n\n{}\n\n{}",
        result.total_count,
        query,
        capsule_list(&result.capsules, "No capsules found matching this query."),
        page_footer(result, page)
    )
}

/// Text for `get_recent_capsules`.
pub fn recent(result: &CapsuleSearchResult, days: Option<f64>) -> String {
    let timeframe = match days.filter(|d| *d > 0.0) {
        Some(d) => format!("from the last {d} days"),
        None => "overall".to_string(),
    };
    let blocks = if result.capsules.is_empty() {
        "No recent capsules found.".to_string()
    } else {
        result
            .capsules
            .iter()
            .map(|c| {
                format!(
                    "📝 **{}**\n🏷️ {}\n📅 {}\n🆔 {}",
                    c.content,
                    format_tags(&c.tags, " "),
                    format_time(c.timestamp),
                    c.id
                )
            })
            .collect::<Vec<_>>()
            .join(RULE)
    };
    format!(
        "⏰ **Your {} most recent capsules {}:**\n\n{}",
        result.total_count, timeframe, blocks
    )
}

/// Text for `get_capsules_by_tag`.
pub fn by_tag(result: &CapsuleSearchResult, tags: &[String], match_all: bool) -> String {
    let mode = if match_all { "ALL" } else { "ANY" };
    format!(
        "🏷️ **Capsules with {} tags: {}** ({} found)\n\n{}",
        mode,
        format_tags(tags, ", "),
        result.total_count,
        capsule_list(&result.capsules, "No capsules found with the specified tags.")
    )
}

/// Text for `create_capsule`.
pub fn created(capsule: &Capsule) -> String {
    format!(
        "✨ **New Capsule Created Successfully!**\n\n\
         📝 **Content:** {}\n\
         🏷️ **Tags:** {}\n\
         🆔 **ID:** {}\n\
         📅 **Created:** {}\n\n\
         🌟 Your inspiration has been captured! 🚀",
        capsule.content,
        format_tags(&capsule.tags, ", "),
        capsule.id,
        format_time(capsule.timestamp)
    )
}

/// Text for `update_capsule`.
pub fn updated(capsule: &Capsule) -> String {
    format!("✏️ **Capsule Updated**\n\n{}", capsule_block(capsule))
}

/// Text for `delete_capsule`.
pub fn deleted(id: &str) -> String {
    format!("🗑️ **Capsule Deleted**\n\n🆔 {id}")
}

/// Text for `get_capsule_stats`.
pub fn stats(stats: &CapsuleStats) -> String {
    let top_tags = if stats.top_tags.is_empty() {
        "   No tags yet".to_string()
    } else {
        stats
            .top_tags
            .iter()
            .map(|(tag, count)| format!("   #{tag} ({count} capsules)"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut text = format!(
        "📊 **Knowledge Base Statistics**\n\n\
         🌟 **Total Capsules:** {}\n\
         🏷️ **Unique Tags:** {}\n\
         📅 **Recent (7 days):** {}\n\
         📆 **This Month:** {}\n\n\
         🔥 **Top Tags:**\n{}",
        stats.total_capsules,
        stats.unique_tags,
        stats.recent_capsules,
        stats.this_month_capsules,
        top_tags
    );

    if let Some(detail) = &stats.detail {
        text.push_str(&format!(
            "\n\n📈 **Detailed Analytics:**\n\
             🗓️ **First Capsule:** {}\n\
             🗓️ **Latest Capsule:** {}\n\
             📊 **Average per Day:** {:.2} capsules\n\
             💭 **Average Tags per Capsule:** {:.1}",
            format_date(detail.first_capsule),
            format_date(detail.latest_capsule),
            detail.average_per_day,
            detail.average_tags_per_capsule
        ));
    }
    text
}

/// Text for `get_tag_cloud`.
pub fn tag_cloud(cloud: &[(String, usize)], min_count: usize) -> String {
    let lines = if cloud.is_empty() {
        "No tags found.".to_string()
    } else {
        cloud
            .iter()
            .map(|(tag, count)| {
                let size = match count {
                    11.. => "🔥",
                    6..=10 => "⭐",
                    3..=5 => "✨",
                    _ => "💫",
                };
                format!("{size} #{tag} ({count})")
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "🏷️ **Tag Cloud** ({} tags with {}+ uses)\n\n{}\n\n\
         💡 **Legend:** 🔥 11+ uses | ⭐ 6-10 uses | ✨ 3-5 uses | 💫 1-2 uses",
        cloud.len(),
        min_count,
        lines
    )
}
