//! Cache key derivation.
//!
//! List keys encode the seven list parameters positionally,
//! `{ns}:{class}:{unit}:{status}:{weakChapters}:{subject}:{page}:{limit}`.
//! Item keys are `{ns}:id:{id}`. Field values escape `%` and `:` so that a
//! field can never contain the delimiter, which keeps derivation injective.

use crate::application::chapters::ChapterListQuery;

const DEFAULT_PAGE: &str = "1";
const DEFAULT_LIMIT: &str = "10";
const ITEM_SEGMENT: &str = "id";

/// Which read route a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScope {
    List,
    Item,
}

/// Derives keys under one resource-family namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    namespace: String,
}

impl CacheKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prefix shared by every key in the family.
    pub fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Key for a list query. Absent and empty values collapse to the same default.
    pub fn derive_key(&self, query: &ChapterListQuery) -> String {
        let fields = [
            field(&query.class, ""),
            field(&query.unit, ""),
            field(&query.status, ""),
            field(&query.weak_chapters, ""),
            field(&query.subject, ""),
            field(&query.page, DEFAULT_PAGE),
            field(&query.limit, DEFAULT_LIMIT),
        ];

        let mut key = self.namespace.clone();
        for value in fields {
            key.push(':');
            key.push_str(&escape(value));
        }
        key
    }

    /// Key for a single record looked up by id.
    pub fn derive_item_key(&self, id: &str) -> String {
        format!("{}:{ITEM_SEGMENT}:{}", self.namespace, escape(id))
    }
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new("chapters")
    }
}

fn field<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value
        .as_deref()
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            other => escaped.push(other),
        }
    }
    escaped
}
