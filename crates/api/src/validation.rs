use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{FieldKind, FieldRule, ResourceCatalog, ResourceDefinition};
use crate::error::{ApiError, ApiResult};
use crate::store::{Fields, ResourceStore};

pub const NOT_BLANK: &str = "This value should not be blank.";
pub const NOT_NULL: &str = "This value should not be null.";
pub const INVALID_EMAIL: &str = "This value is not a valid email address.";

/// A single validation error as returned in 422 responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub property_path: String,
    pub message: String,
}

impl Violation {
    pub fn new(property_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Every required field must be present, defaults are applied
    Create,
    /// Same rules as `Create`, used by PUT
    Replace,
    /// Only the provided fields are checked
    Patch,
}

/// Everything field validation needs to look at besides the payload.
pub struct ValidationContext<'a> {
    pub catalog: &'a ResourceCatalog,
    pub store: &'a ResourceStore,
    pub locales: &'a [String],
}

impl ValidationContext<'_> {
    /// Validates a payload against the field rules of `definition`.
    ///
    /// Unknown keys are dropped. On success the returned fields are ready to be stored.
    ///
    /// # Errors
    ///
    /// - `ApiError::BadRequest` if the payload is not a JSON object
    /// - `ApiError::Validation` with every violation found
    pub fn validate(&self, definition: &ResourceDefinition, payload: &Value, mode: ValidationMode) -> ApiResult<Fields> {
        let object = payload
            .as_object()
            .ok_or_else(|| ApiError::BadRequest("Request body must be a JSON object".to_string()))?;

        let mut fields = Fields::new();
        let mut violations = Vec::new();

        for rule in &definition.fields {
            match object.get(&rule.name) {
                None if mode == ValidationMode::Patch => {}
                None | Some(Value::Null) if rule.required => {
                    violations.push(Violation::new(&rule.name, NOT_BLANK));
                }
                None => {
                    if let Some(default) = &rule.default {
                        fields.insert(rule.name.clone(), default.clone());
                    }
                }
                Some(Value::Null) => {
                    fields.insert(rule.name.clone(), Value::Null);
                }
                Some(value) => {
                    let found = self.check_value(rule, value);
                    if found.is_empty() {
                        fields.insert(rule.name.clone(), value.clone());
                    } else {
                        violations.extend(found);
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(fields)
        } else {
            Err(ApiError::Validation(violations))
        }
    }

    fn check_value(&self, rule: &FieldRule, value: &Value) -> Vec<Violation> {
        let path = rule.name.as_str();
        let wrong_type = || vec![Violation::new(path, format!("This value should be of type {}.", rule.kind.type_name()))];

        match &rule.kind {
            FieldKind::Text { max_len } => {
                let Some(text) = value.as_str() else {
                    return wrong_type();
                };
                if rule.required && text.trim().is_empty() {
                    return vec![Violation::new(path, NOT_BLANK)];
                }
                if text.chars().count() > *max_len {
                    return vec![Violation::new(
                        path,
                        format!("This value is too long. It should have {max_len} characters or less."),
                    )];
                }
                Vec::new()
            }
            FieldKind::Email => {
                let Some(text) = value.as_str() else {
                    return wrong_type();
                };
                if rule.required && text.trim().is_empty() {
                    return vec![Violation::new(path, NOT_BLANK)];
                }
                if !text.is_empty() && !is_valid_email(text) {
                    return vec![Violation::new(path, INVALID_EMAIL)];
                }
                Vec::new()
            }
            FieldKind::Integer { min, max } => {
                let Some(number) = value.as_i64() else {
                    return wrong_type();
                };
                if number < *min || number > *max {
                    return vec![out_of_range(path, min, max)];
                }
                Vec::new()
            }
            FieldKind::Decimal { min, max } => {
                let number = match value {
                    Value::Number(number) => number.as_f64(),
                    Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
                    _ => None,
                };
                let Some(number) = number else {
                    return wrong_type();
                };
                if number < *min || number > *max {
                    return vec![out_of_range(path, min, max)];
                }
                Vec::new()
            }
            FieldKind::Boolean => {
                if value.is_boolean() {
                    Vec::new()
                } else {
                    wrong_type()
                }
            }
            FieldKind::Localized => self.check_localized(rule, value),
            FieldKind::Reference { resource } => {
                let Some(id) = value.as_u64() else {
                    return wrong_type();
                };
                if self.store.contains(resource, id) {
                    Vec::new()
                } else {
                    let label = self
                        .catalog
                        .get(resource)
                        .map_or_else(|| resource.clone(), |definition| definition.label.clone());
                    vec![Violation::new(path, format!("{label} {id} does not exist."))]
                }
            }
        }
    }

    fn check_localized(&self, rule: &FieldRule, value: &Value) -> Vec<Violation> {
        let path = rule.name.as_str();
        let Some(translations) = value.as_object() else {
            return vec![Violation::new(path, "This value should be of type object.")];
        };

        let mut violations = Vec::new();
        for (locale, text) in translations {
            if !self.locales.iter().any(|known| known == locale) {
                violations.push(Violation::new(path, format!("Locale \"{locale}\" is not supported.")));
            } else if !text.is_string() {
                violations.push(Violation::new(
                    format!("{path}[{locale}]"),
                    "This value should be of type string.",
                ));
            }
        }

        if rule.required {
            let default_locale = self.locales.first().map_or("en-US", String::as_str);
            let has_default = translations
                .get(default_locale)
                .and_then(Value::as_str)
                .is_some_and(|text| !text.trim().is_empty());
            if !has_default {
                violations.push(Violation::new(
                    path,
                    format!("The field {path} is required at least in your default language."),
                ));
            }
        }

        violations
    }
}

fn out_of_range<T: std::fmt::Display>(path: &str, min: &T, max: &T) -> Violation {
    Violation::new(path, format!("This value should be between {min} and {max}."))
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
