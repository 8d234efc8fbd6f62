//! Filtered, paginated catalog queries.

use super::normalize_tags;
use super::store::{path_to_sql, record_from_row, CatalogStore, MEDIA_COLUMNS};
use crate::core::media::{normalize_path, MediaRecord};
use crate::error::StoreError;
use rusqlite::types::Value;
use serde::Serialize;
use std::path::PathBuf;

/// Sort order for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaOrder {
    /// Newest file first
    #[default]
    ModifiedDesc,
    ModifiedAsc,
    NameAsc,
    NameDesc,
    /// Newest capture first; files without a capture time last
    CapturedDesc,
    /// Largest file first
    SizeDesc,
}

impl MediaOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            MediaOrder::ModifiedDesc => "modified_time_utc DESC, id DESC",
            MediaOrder::ModifiedAsc => "modified_time_utc ASC, id ASC",
            MediaOrder::NameAsc => "file_name COLLATE NOCASE ASC, id ASC",
            MediaOrder::NameDesc => "file_name COLLATE NOCASE DESC, id DESC",
            MediaOrder::CapturedDesc => {
                "captured_time_utc IS NULL, captured_time_utc DESC, id DESC"
            }
            MediaOrder::SizeDesc => "size_bytes DESC, id DESC",
        }
    }
}

/// Filters for [`CatalogStore::query`]. Active records only, always.
#[derive(Debug, Clone)]
pub struct MediaQuery {
    /// Tags to filter by, normalized before matching
    pub tags: Vec<String>,
    /// `true`: every tag required; `false`: any tag suffices
    pub match_all: bool,
    /// Case-insensitive substring of the file name
    pub search: Option<String>,
    /// Restrict to records discovered under this root
    pub root_dir: Option<PathBuf>,
    pub limit: usize,
    pub offset: usize,
    pub order: MediaOrder,
}

impl Default for MediaQuery {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            match_all: true,
            search: None,
            root_dir: None,
            limit: 200,
            offset: 0,
            order: MediaOrder::default(),
        }
    }
}

impl MediaQuery {
    /// Require tags (intersection)
    pub fn with_all_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags = tags.iter().map(|t| t.as_ref().to_string()).collect();
        self.match_all = true;
        self
    }

    /// Accept any of the tags (union)
    pub fn with_any_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags = tags.iter().map(|t| t.as_ref().to_string()).collect();
        self.match_all = false;
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root.into());
        self
    }

    pub fn with_page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn with_order(mut self, order: MediaOrder) -> Self {
        self.order = order;
        self
    }
}

/// One page of results plus the total across all pages
#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    pub records: Vec<MediaRecord>,
    pub total_count: usize,
}

/// Escape LIKE wildcards so search text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// WHERE clause and its bound values
fn build_filter(query: &MediaQuery) -> (String, Vec<Value>) {
    let mut clauses = vec!["status = 'active'".to_string()];
    let mut values = Vec::new();

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        clauses.push("LOWER(file_name) LIKE LOWER(?) ESCAPE '\\'".to_string());
        values.push(Value::Text(format!("%{}%", escape_like(search))));
    }

    let tags = normalize_tags(&query.tags);
    if !tags.is_empty() {
        let placeholders = vec!["?"; tags.len()].join(",");
        if query.match_all {
            clauses.push(format!(
                "id IN (SELECT media_id FROM media_tags WHERE tag_id IN \
                 (SELECT id FROM tags WHERE name IN ({})) \
                 GROUP BY media_id HAVING COUNT(DISTINCT tag_id) = {})",
                placeholders,
                tags.len()
            ));
        } else {
            clauses.push(format!(
                "id IN (SELECT DISTINCT media_id FROM media_tags WHERE tag_id IN \
                 (SELECT id FROM tags WHERE name IN ({})))",
                placeholders
            ));
        }
        values.extend(tags.into_iter().map(Value::Text));
    }

    if let Some(root) = &query.root_dir {
        clauses.push("root_dir = ?".to_string());
        values.push(Value::Text(path_to_sql(&normalize_path(root))));
    }

    (clauses.join(" AND "), values)
}

impl CatalogStore {
    /// Page through active records matching `query`
    pub fn query(&self, query: &MediaQuery) -> Result<QueryPage, StoreError> {
        let (filter, values) = build_filter(query);
        let conn = self.lock()?;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM media WHERE {}", filter),
            rusqlite::params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM media WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            MEDIA_COLUMNS,
            filter,
            query.order.as_sql()
        );
        let mut paged = values;
        paged.push(Value::Integer(query.limit.min(i64::MAX as usize) as i64));
        paged.push(Value::Integer(query.offset.min(i64::MAX as usize) as i64));

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(rusqlite::params_from_iter(paged.iter()), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryPage {
            records,
            total_count: total as usize,
        })
    }
}
