use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::catalog::{FieldKind, ResourceDefinition};
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::ListEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Query parameters of a list request: `limit`, `offset`, `orderBy`, `sortOrder`
/// and any number of `filters[field]=value`.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub limit: usize,
    pub offset: usize,
    pub order_by: String,
    pub sort_order: SortOrder,
    pub filters: BTreeMap<String, String>,
}

impl ListParams {
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for a non-numeric or out of range `limit`/`offset`,
    /// an unknown `orderBy` field, or a `sortOrder` other than asc/desc.
    pub fn parse(pairs: &[(String, String)], definition: &ResourceDefinition, config: &ServerConfig) -> ApiResult<Self> {
        let mut params = Self {
            limit: config.default_page_limit,
            offset: 0,
            order_by: definition.id_field.clone(),
            sort_order: SortOrder::Asc,
            filters: BTreeMap::new(),
        };

        for (key, value) in pairs {
            match key.as_str() {
                "limit" => {
                    params.limit = value
                        .parse()
                        .ok()
                        .filter(|limit| (1..=config.max_page_limit).contains(limit))
                        .ok_or_else(|| {
                            ApiError::BadRequest(format!("limit must be between 1 and {}", config.max_page_limit))
                        })?;
                }
                "offset" => {
                    params.offset = value
                        .parse()
                        .map_err(|_| ApiError::BadRequest("offset must be a positive integer".to_string()))?;
                }
                "orderBy" => {
                    if *value != definition.id_field && definition.rule(value).is_none() {
                        return Err(ApiError::BadRequest(format!("Cannot order by unknown field \"{value}\"")));
                    }
                    params.order_by.clone_from(value);
                }
                "sortOrder" => {
                    params.sort_order = match value.to_ascii_lowercase().as_str() {
                        "asc" => SortOrder::Asc,
                        "desc" => SortOrder::Desc,
                        _ => return Err(ApiError::BadRequest("sortOrder must be asc or desc".to_string())),
                    };
                }
                other => {
                    if let Some(field) = other.strip_prefix("filters[").and_then(|rest| rest.strip_suffix(']')) {
                        params.filters.insert(field.to_string(), value.clone());
                    }
                }
            }
        }

        Ok(params)
    }

    /// Filters, sorts and paginates rendered items into a list envelope.
    #[must_use]
    pub fn apply(&self, definition: &ResourceDefinition, default_locale: &str, items: Vec<Value>) -> ListEnvelope {
        let mut matching: Vec<Value> = items
            .into_iter()
            .filter(|item| {
                self.filters
                    .iter()
                    .all(|(field, expected)| matches_filter(definition, item, field, expected))
            })
            .collect();

        let kind = definition.rule(&self.order_by).map(|rule| &rule.kind);
        matching.sort_by(|a, b| {
            let ordering = compare_keys(
                &sort_key(a.get(&self.order_by), kind, default_locale),
                &sort_key(b.get(&self.order_by), kind, default_locale),
            );
            match self.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total_items = matching.len();
        let items = matching.into_iter().skip(self.offset).take(self.limit).collect();

        ListEnvelope {
            total_items,
            sort_order: self.sort_order.as_str().to_string(),
            limit: self.limit,
            offset: self.offset,
            order_by: self.order_by.clone(),
            filters: self.filters.clone(),
            items,
        }
    }
}

fn matches_filter(definition: &ResourceDefinition, item: &Value, field: &str, expected: &str) -> bool {
    let value = item.get(field);

    if field == definition.id_field {
        return value.map(render_scalar).as_deref() == Some(expected);
    }

    let Some(rule) = definition.rule(field) else {
        // unknown filters are echoed back but do not restrict the result
        return true;
    };

    let needle = expected.to_lowercase();
    match (&rule.kind, value) {
        (FieldKind::Text { .. } | FieldKind::Email, Some(Value::String(text))) => text.to_lowercase().contains(&needle),
        (FieldKind::Localized, Some(Value::Object(translations))) => translations
            .values()
            .filter_map(Value::as_str)
            .any(|text| text.to_lowercase().contains(&needle)),
        (_, Some(value)) => render_scalar(value) == expected,
        (_, None) => false,
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug)]
enum SortKey {
    Missing,
    Bool(bool),
    Number(f64),
    Text(String),
}

fn sort_key(value: Option<&Value>, kind: Option<&FieldKind>, default_locale: &str) -> SortKey {
    match value {
        None | Some(Value::Null) => SortKey::Missing,
        Some(Value::Bool(flag)) => SortKey::Bool(*flag),
        Some(Value::Number(number)) => number.as_f64().map_or(SortKey::Missing, SortKey::Number),
        Some(Value::String(text)) => match (kind, text.trim().parse::<f64>()) {
            (Some(FieldKind::Decimal { .. }), Ok(number)) => SortKey::Number(number),
            _ => SortKey::Text(text.to_lowercase()),
        },
        Some(Value::Object(translations)) => translations
            .get(default_locale)
            .and_then(Value::as_str)
            .map_or(SortKey::Missing, |text| SortKey::Text(text.to_lowercase())),
        Some(other) => SortKey::Text(other.to_string()),
    }
}

fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    const fn rank(key: &SortKey) -> u8 {
        match key {
            SortKey::Missing => 0,
            SortKey::Bool(_) => 1,
            SortKey::Number(_) => 2,
            SortKey::Text(_) => 3,
        }
    }

    match (a, b) {
        (SortKey::Bool(x), SortKey::Bool(y)) => x.cmp(y),
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceCatalog;
    use serde_json::json;

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    fn zones() -> Vec<Value> {
        vec![
            json!({ "zoneId": 1, "name": "Europe", "enabled": true }),
            json!({ "zoneId": 2, "name": "North America", "enabled": false }),
            json!({ "zoneId": 3, "name": "Asia", "enabled": true }),
        ]
    }

    #[test]
    fn test_defaults() {
        let catalog = ResourceCatalog::default_catalog().unwrap();
        let definition = catalog.get("zones").unwrap();
        let params = ListParams::parse(&[], &definition, &ServerConfig::default()).unwrap();

        assert_eq!(params.limit, 50);
        assert_eq!(params.offset, 0);
        assert_eq!(params.order_by, "zoneId");
        assert_eq!(params.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_sort_filter_and_paginate() {
        let catalog = ResourceCatalog::default_catalog().unwrap();
        let definition = catalog.get("zones").unwrap();
        let params = ListParams::parse(
            &pairs(&[("orderBy", "name"), ("sortOrder", "DESC"), ("filters[enabled]", "true")]),
            &definition,
            &ServerConfig::default(),
        )
        .unwrap();

        let envelope = params.apply(&definition, "en-US", zones());
        assert_eq!(envelope.total_items, 2);
        assert_eq!(envelope.sort_order, "desc");
        assert_eq!(envelope.items[0]["name"], "Europe");
        assert_eq!(envelope.items[1]["name"], "Asia");
        assert_eq!(envelope.filters.get("enabled").map(String::as_str), Some("true"));

        let params = ListParams::parse(
            &pairs(&[("limit", "1"), ("offset", "1")]),
            &definition,
            &ServerConfig::default(),
        )
        .unwrap();
        let envelope = params.apply(&definition, "en-US", zones());
        assert_eq!(envelope.total_items, 3);
        assert_eq!(envelope.items.len(), 1);
        assert_eq!(envelope.items[0]["zoneId"], 2);
    }

    #[test]
    fn test_text_filter_is_case_insensitive_substring() {
        let catalog = ResourceCatalog::default_catalog().unwrap();
        let definition = catalog.get("zones").unwrap();
        let params =
            ListParams::parse(&pairs(&[("filters[name]", "AMER")]), &definition, &ServerConfig::default()).unwrap();

        let envelope = params.apply(&definition, "en-US", zones());
        assert_eq!(envelope.total_items, 1);
        assert_eq!(envelope.items[0]["zoneId"], 2);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let catalog = ResourceCatalog::default_catalog().unwrap();
        let definition = catalog.get("zones").unwrap();
        let config = ServerConfig::default();

        for bad in [
            pairs(&[("limit", "0")]),
            pairs(&[("limit", "abc")]),
            pairs(&[("offset", "-1")]),
            pairs(&[("orderBy", "population")]),
            pairs(&[("sortOrder", "sideways")]),
        ] {
            assert!(matches!(
                ListParams::parse(&bad, &definition, &config),
                Err(ApiError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn test_decimal_strings_sort_numerically() {
        let catalog = ResourceCatalog::default_catalog().unwrap();
        let definition = catalog.get("taxes").unwrap();
        let items = vec![
            json!({ "taxId": 1, "rate": "20.000" }),
            json!({ "taxId": 2, "rate": "5.500" }),
            json!({ "taxId": 3, "rate": "10.000" }),
        ];
        let params = ListParams::parse(&pairs(&[("orderBy", "rate")]), &definition, &ServerConfig::default()).unwrap();

        let envelope = params.apply(&definition, "en-US", items);
        let ids: Vec<i64> = envelope.items.iter().filter_map(|item| item["taxId"].as_i64()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
