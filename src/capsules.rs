//! Capsule queries and aggregations.
//!
//! Each function here backs one tool. They validate their inputs before touching
//! the store and never swallow store errors.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::{McpError, Result};
use crate::store::{Capsule, CapsuleFilter, CapsulePatch, CapsuleQuery, CapsuleStore, NewCapsule};

/// Default page number for paginated searches.
pub const DEFAULT_PAGE: u64 = 1;
/// Default page size for paginated searches.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Default number of capsules returned by `get_recent_capsules`.
pub const DEFAULT_RECENT_LIMIT: u64 = 5;
/// Default number of capsules returned by `search_capsules`.
pub const DEFAULT_SEARCH_LIMIT: u64 = 10;
/// Default number of capsules returned by `get_capsules_by_tag`.
pub const DEFAULT_TAG_LIMIT: u64 = 20;
/// Default minimum usage count for `get_tag_cloud`.
pub const DEFAULT_MIN_TAG_COUNT: u64 = 1;
/// Number of entries in `topTags`.
pub const TOP_TAG_COUNT: usize = 5;
/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// A 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number, starting at 1.
    pub page: usize,
    /// Capsules per page, at least 1.
    pub page_size: usize,
}

impl Pagination {
    /// Build a window, rejecting zero page numbers and sizes.
    pub fn new(page: usize, page_size: usize) -> Result<Self> {
        if page < 1 {
            return Err(McpError::invalid_arg("page", "must be at least 1"));
        }
        if page_size < 1 {
            return Err(McpError::invalid_arg("pageSize", "must be at least 1"));
        }
        Ok(Self { page, page_size })
    }

    /// Index of the first capsule on this page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Number of pages needed for `total` capsules.
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }
}

/// Capsules plus a count.
///
/// For paginated searches `total_count` counts every match; elsewhere it is the
/// number of capsules returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapsuleSearchResult {
    /// Matching capsules, newest first.
    pub capsules: Vec<Capsule>,
    /// See the type docs.
    pub total_count: usize,
}

/// Knowledge-base statistics as of one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapsuleStats {
    /// Number of capsules.
    pub total_capsules: usize,
    /// Number of distinct tags across all capsules.
    pub unique_tags: usize,
    /// Capsules newer than seven days.
    pub recent_capsules: usize,
    /// Capsules newer than thirty days.
    pub this_month_capsules: usize,
    /// Most used tags as `[tag, count]`, highest first.
    pub top_tags: Vec<(String, usize)>,
    /// Extra figures when requested and the collection is non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<StatsDetail>,
}

/// Optional analytics for `get_capsule_stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDetail {
    /// Timestamp of the oldest capsule.
    pub first_capsule: i64,
    /// Timestamp of the newest capsule.
    pub latest_capsule: i64,
    /// Capsules per day since the oldest one.
    pub average_per_day: f64,
    /// Tag uses per capsule.
    pub average_tags_per_capsule: f64,
}

/// Paginated tag-overlap search.
pub fn search_by_tags(
    store: &dyn CapsuleStore,
    tags: &[String],
    page: Pagination,
) -> Result<CapsuleSearchResult> {
    if tags.is_empty() {
        return Err(McpError::invalid_arg(
            "tags",
            "must be a non-empty array of strings",
        ));
    }

    let filter = CapsuleFilter {
        tags_any: Some(tags.to_vec()),
        ..CapsuleFilter::default()
    };
    paginated(store, filter, page)
}

/// Paginated case-insensitive content search.
pub fn search_by_content(
    store: &dyn CapsuleStore,
    query: &str,
    page: Pagination,
) -> Result<CapsuleSearchResult> {
    if query.trim().is_empty() {
        return Err(McpError::invalid_arg("query", "must be a non-empty string"));
    }

    let filter = CapsuleFilter {
        content_contains: Some(query.to_string()),
        ..CapsuleFilter::default()
    };
    paginated(store, filter, page)
}

// Count and fetch are separate store calls; a concurrent insert may skew the total.
fn paginated(
    store: &dyn CapsuleStore,
    filter: CapsuleFilter,
    page: Pagination,
) -> Result<CapsuleSearchResult> {
    let total_count = store.count(&filter)?;
    let capsules =
        store.select(&CapsuleQuery::filtered(filter).window(page.offset(), page.page_size))?;
    Ok(CapsuleSearchResult {
        capsules,
        total_count,
    })
}

/// Newest capsules, optionally restricted to the last `days` days.
///
/// `days` of zero means no cutoff.
pub fn recent(
    store: &dyn CapsuleStore,
    limit: usize,
    days: Option<f64>,
    now: i64,
) -> Result<CapsuleSearchResult> {
    let filter = CapsuleFilter {
        since: cutoff(days, now),
        ..CapsuleFilter::default()
    };

    let capsules = store.select(&CapsuleQuery::filtered(filter).window(0, limit))?;
    Ok(CapsuleSearchResult {
        total_count: capsules.len(),
        capsules,
    })
}

/// Newest capsules matching every given criterion, capped at `limit`.
///
/// A blank `query`, an empty `tags` list and `days` of zero each leave that
/// criterion out, so a call without criteria lists the newest capsules.
pub fn search(
    store: &dyn CapsuleStore,
    query: Option<&str>,
    tags: &[String],
    days: Option<f64>,
    limit: usize,
    now: i64,
) -> Result<CapsuleSearchResult> {
    let filter = CapsuleFilter {
        content_contains: query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string),
        tags_any: (!tags.is_empty()).then(|| tags.to_vec()),
        since: cutoff(days, now),
        ..CapsuleFilter::default()
    };

    let capsules = store.select(&CapsuleQuery::filtered(filter).window(0, limit))?;
    Ok(CapsuleSearchResult {
        total_count: capsules.len(),
        capsules,
    })
}

/// Inclusive lower timestamp bound for a window of `days` days; zero means none.
fn cutoff(days: Option<f64>, now: i64) -> Option<i64> {
    days.filter(|d| *d > 0.0)
        .map(|d| now.saturating_sub((d * DAY_MS as f64) as i64))
}

/// Capsules carrying any (or, with `match_all`, every) tag in `tags`.
pub fn capsules_by_tag(
    store: &dyn CapsuleStore,
    tags: &[String],
    match_all: bool,
    limit: usize,
) -> Result<CapsuleSearchResult> {
    if tags.is_empty() {
        return Err(McpError::invalid_arg(
            "tags",
            "must be a non-empty array of strings",
        ));
    }

    let mut filter = CapsuleFilter::default();
    if match_all {
        filter.tags_all = Some(tags.to_vec());
    } else {
        filter.tags_any = Some(tags.to_vec());
    }

    let capsules = store.select(&CapsuleQuery::filtered(filter).window(0, limit))?;
    Ok(CapsuleSearchResult {
        total_count: capsules.len(),
        capsules,
    })
}

/// Persist a new capsule stamped with `now`.
pub fn create(
    store: &dyn CapsuleStore,
    content: &str,
    tags: Vec<String>,
    now: i64,
) -> Result<Capsule> {
    let content = content.trim();
    if content.is_empty() {
        return Err(McpError::invalid_arg("content", "must be a non-empty string"));
    }

    store.insert(NewCapsule {
        content: content.to_string(),
        tags,
        timestamp: now,
    })
}

/// Replace a capsule's content and/or tags. The timestamp is left as is.
pub fn update(
    store: &dyn CapsuleStore,
    id: &str,
    content: Option<&str>,
    tags: Option<Vec<String>>,
) -> Result<Capsule> {
    if id.trim().is_empty() {
        return Err(McpError::invalid_arg("id", "must be a non-empty string"));
    }
    let content = match content.map(str::trim) {
        Some("") => {
            return Err(McpError::invalid_arg("content", "must be a non-empty string"));
        }
        other => other.map(str::to_string),
    };

    store
        .update_by_id(id, CapsulePatch { content, tags })?
        .ok_or_else(|| McpError::NotFound(id.to_string()))
}

/// Remove a capsule by id.
pub fn delete(store: &dyn CapsuleStore, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(McpError::invalid_arg("id", "must be a non-empty string"));
    }
    if store.delete_by_id(id)? {
        Ok(())
    } else {
        Err(McpError::NotFound(id.to_string()))
    }
}

/// Statistics over the whole collection.
pub fn stats(store: &dyn CapsuleStore, now: i64, detailed: bool) -> Result<CapsuleStats> {
    let capsules = store.select(&CapsuleQuery::all())?;
    let counts = tag_counts(&capsules);

    let week_ago = now - 7 * DAY_MS;
    let month_ago = now - 30 * DAY_MS;

    let detail = if detailed && !capsules.is_empty() {
        let first = capsules.iter().map(|c| c.timestamp).min().unwrap_or(now);
        let latest = capsules.iter().map(|c| c.timestamp).max().unwrap_or(now);
        let days = ((now - first) as f64 / DAY_MS as f64).max(1.0);
        let tag_uses: usize = counts.iter().map(|(_, n)| n).sum();
        Some(StatsDetail {
            first_capsule: first,
            latest_capsule: latest,
            average_per_day: capsules.len() as f64 / days,
            average_tags_per_capsule: tag_uses as f64 / capsules.len() as f64,
        })
    } else {
        None
    };

    Ok(CapsuleStats {
        total_capsules: capsules.len(),
        unique_tags: counts.len(),
        recent_capsules: capsules.iter().filter(|c| c.timestamp > week_ago).count(),
        this_month_capsules: capsules.iter().filter(|c| c.timestamp > month_ago).count(),
        top_tags: counts.into_iter().take(TOP_TAG_COUNT).collect(),
        detail,
    })
}

/// Every tag used at least `min_count` times, most used first.
pub fn tag_cloud(store: &dyn CapsuleStore, min_count: usize) -> Result<Vec<(String, usize)>> {
    let capsules = store.select(&CapsuleQuery::all())?;
    Ok(tag_counts(&capsules)
        .into_iter()
        .filter(|(_, count)| *count >= min_count)
        .collect())
}

/// Per-tag capsule counts, sorted by count descending.
///
/// A tag repeated within one capsule counts once. Ties keep first-encounter
/// order over `capsules`.
fn tag_counts(capsules: &[Capsule]) -> Vec<(String, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for capsule in capsules {
        let mut seen: HashSet<&str> = HashSet::new();
        for tag in &capsule.tags {
            if !seen.insert(tag.as_str()) {
                continue;
            }
            match index.get(tag.as_str()) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(tag.as_str(), counts.len());
                    counts.push((tag.clone(), 1));
                }
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
