use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An expected `(propertyPath, message)` entry. An empty message matches any message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedViolation {
    pub property_path: String,
    pub message: String,
}

impl ExpectedViolation {
    pub fn new(property_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            message: message.into(),
        }
    }

    /// Matches any violation on `property_path`.
    pub fn any_message(property_path: impl Into<String>) -> Self {
        Self::new(property_path, "")
    }

    fn matches(&self, actual: &Value) -> bool {
        let path_matches = actual.get("propertyPath").and_then(Value::as_str) == Some(self.property_path.as_str());
        let message_matches =
            self.message.is_empty() || actual.get("message").and_then(Value::as_str) == Some(self.message.as_str());
        path_matches && message_matches
    }
}

/// Shorthand for building expectations from `(path, message)` pairs.
#[must_use]
pub fn violations(pairs: &[(&str, &str)]) -> Vec<ExpectedViolation> {
    pairs
        .iter()
        .map(|(path, message)| ExpectedViolation::new(*path, *message))
        .collect()
}

/// Expected entries with no match in `actual`.
///
/// `actual` is the decoded 422 body; anything other than an array matches nothing.
#[must_use]
pub fn missing_violations(expected: &[ExpectedViolation], actual: &Value) -> Vec<ExpectedViolation> {
    let actual = actual.as_array().map(Vec::as_slice).unwrap_or_default();

    expected
        .iter()
        .filter(|expectation| !actual.iter().any(|violation| expectation.matches(violation)))
        .cloned()
        .collect()
}

/// Asserts that every expected violation is present in `actual`. Extra violations are allowed.
///
/// # Panics
///
/// Panics listing the missing entries and the actual violations.
#[track_caller]
pub fn assert_validation_errors(expected: &[ExpectedViolation], actual: &Value) {
    let missing = missing_violations(expected, actual);
    if missing.is_empty() {
        return;
    }

    let missing: Vec<String> = missing
        .iter()
        .map(|violation| {
            if violation.message.is_empty() {
                format!("{} (any message)", violation.property_path)
            } else {
                format!("{}: {}", violation.property_path, violation.message)
            }
        })
        .collect();
    let actual = serde_json::to_string_pretty(actual).unwrap_or_else(|_| actual.to_string());

    panic!(
        "Expected validation errors not found:\n  {}\nActual violations:\n{actual}",
        missing.join("\n  ")
    );
}
