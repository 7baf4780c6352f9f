use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys every list response must carry.
pub const REQUIRED_ENVELOPE_KEYS: [&str; 5] = ["totalItems", "sortOrder", "limit", "filters", "items"];

/// Query of a list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    pub sort_order: Option<String>,
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, sort_order: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self.sort_order = Some(sort_order.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// Query string pairs, filters encoded as `filters[field]=value`.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(order_by) = &self.order_by {
            pairs.push(("orderBy".to_string(), order_by.clone()));
        }
        if let Some(sort_order) = &self.sort_order {
            pairs.push(("sortOrder".to_string(), sort_order.clone()));
        }
        for (field, value) in &self.filters {
            pairs.push((format!("filters[{field}]"), value.clone()));
        }
        pairs
    }
}

/// Decoded list envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedList {
    pub total_items: usize,
    pub sort_order: String,
    pub limit: usize,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub order_by: Option<String>,
    pub filters: Map<String, Value>,
    pub items: Vec<Value>,
}

impl PaginatedList {
    /// # Errors
    ///
    /// Returns an error listing the missing envelope keys, or if a key has the wrong type.
    pub fn from_value(body: Value) -> Result<Self> {
        let missing = missing_envelope_keys(&body);
        if !missing.is_empty() {
            return Err(eyre!(
                "List response is missing {}: {body}",
                missing.join(", ")
            ));
        }
        serde_json::from_value(body).wrap_err("List response does not match the list envelope")
    }

    /// Values of `field` across the returned items, skipping items without it.
    #[must_use]
    pub fn column(&self, field: &str) -> Vec<&Value> {
        self.items.iter().filter_map(|item| item.get(field)).collect()
    }

    /// Numeric ids found under `id_field`.
    #[must_use]
    pub fn ids(&self, id_field: &str) -> Vec<u64> {
        self.column(id_field).into_iter().filter_map(Value::as_u64).collect()
    }
}

#[must_use]
pub fn missing_envelope_keys(body: &Value) -> Vec<&'static str> {
    REQUIRED_ENVELOPE_KEYS
        .into_iter()
        .filter(|key| body.get(key).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs() {
        let query = ListQuery::new()
            .limit(10)
            .offset(20)
            .order_by("name", "desc")
            .filter("name", "eur");

        assert_eq!(
            query.to_query_pairs(),
            vec![
                ("limit".to_string(), "10".to_string()),
                ("offset".to_string(), "20".to_string()),
                ("orderBy".to_string(), "name".to_string()),
                ("sortOrder".to_string(), "desc".to_string()),
                ("filters[name]".to_string(), "eur".to_string()),
            ]
        );
        assert!(ListQuery::new().to_query_pairs().is_empty());
    }

    #[test]
    fn test_envelope_keys_checked() {
        let body = json!({ "totalItems": 0, "items": [] });
        assert_eq!(missing_envelope_keys(&body), vec!["sortOrder", "limit", "filters"]);
        assert!(PaginatedList::from_value(body).is_err());
    }

    #[test]
    fn test_decode_envelope() {
        let body = json!({
            "totalItems": 2,
            "sortOrder": "asc",
            "limit": 50,
            "offset": 0,
            "orderBy": "zoneId",
            "filters": {},
            "items": [{ "zoneId": 1 }, { "zoneId": 2 }]
        });

        let list = PaginatedList::from_value(body).unwrap();
        assert_eq!(list.total_items, 2);
        assert_eq!(list.ids("zoneId"), vec![1, 2]);
    }
}
