//! Resource definitions served by the sandbox API.
//!
//! Every resource is plain data: a collection path, an id field, the read and
//! write scopes guarding it, and the field rules its payloads are validated
//! against. The router registers the same set of routes for each definition.

use color_eyre::Result;
use color_eyre::eyre::eyre;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text { max_len: usize },
    Email,
    Integer { min: i64, max: i64 },
    Decimal { min: f64, max: f64 },
    Boolean,
    /// Object keyed by locale, e.g. `{"en-US": "Tax", "fr-FR": "Taxe"}`
    Localized,
    /// Id of an item of another resource
    Reference { resource: String },
}

impl FieldKind {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } | FieldKind::Email => "string",
            FieldKind::Integer { .. } | FieldKind::Reference { .. } => "int",
            FieldKind::Decimal { .. } => "numeric",
            FieldKind::Boolean => "bool",
            FieldKind::Localized => "object",
        }
    }

    #[must_use]
    pub const fn text(max_len: usize) -> Self {
        FieldKind::Text { max_len }
    }

    #[must_use]
    pub fn reference(resource: &str) -> Self {
        FieldKind::Reference {
            resource: resource.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldRule {
    #[must_use]
    pub fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
        }
    }

    #[must_use]
    pub fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceDefinition {
    pub name: String,
    pub collection: String,
    pub id_field: String,
    /// Human-readable name used in messages ("Customer group 12 does not exist.")
    pub label: String,
    pub read_scope: String,
    pub write_scope: String,
    pub fields: Vec<FieldRule>,
    #[serde(skip)]
    pub seeds: Vec<Map<String, Value>>,
    /// Creation takes a multipart upload instead of a JSON body
    pub multipart: bool,
}

impl ResourceDefinition {
    #[must_use]
    pub fn new(name: &str, collection: &str, id_field: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            collection: collection.to_string(),
            id_field: id_field.to_string(),
            label: label.to_string(),
            read_scope: format!("{name}_read"),
            write_scope: format!("{name}_write"),
            fields: Vec::new(),
            seeds: Vec::new(),
            multipart: false,
        }
    }

    #[must_use]
    pub fn scopes(mut self, read: &str, write: &str) -> Self {
        self.read_scope = read.to_string();
        self.write_scope = write.to_string();
        self
    }

    #[must_use]
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    /// Adds a baseline row. Non-object values are ignored.
    #[must_use]
    pub fn seed(mut self, row: Value) -> Self {
        if let Value::Object(fields) = row {
            self.seeds.push(fields);
        }
        self
    }

    #[must_use]
    pub const fn with_multipart(mut self) -> Self {
        self.multipart = true;
        self
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|rule| rule.name == name)
    }

    #[must_use]
    pub fn item_path(&self) -> String {
        format!("{}/{{id}}", self.collection)
    }

    #[must_use]
    pub fn bulk_delete_path(&self) -> String {
        format!("{}/bulk-delete", self.collection)
    }

    /// Item representation: the id under `id_field` plus the stored fields.
    #[must_use]
    pub fn render(&self, id: u64, fields: &Map<String, Value>) -> Value {
        let mut item = Map::with_capacity(fields.len() + 1);
        item.insert(self.id_field.clone(), json!(id));
        for (key, value) in fields {
            item.insert(key.clone(), value.clone());
        }
        Value::Object(item)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    definitions: Vec<Arc<ResourceDefinition>>,
}

impl ResourceCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns an error if the name or collection path is already registered, or the
    /// collection path does not start with `/`.
    pub fn register(&mut self, definition: ResourceDefinition) -> Result<()> {
        if !definition.collection.starts_with('/') || definition.collection.ends_with('/') {
            return Err(eyre!(
                "Collection path {:?} must start with '/' and not end with one",
                definition.collection
            ));
        }
        if self.get(&definition.name).is_some() {
            return Err(eyre!("Resource {:?} is already registered", definition.name));
        }
        if self.iter().any(|existing| existing.collection == definition.collection) {
            return Err(eyre!("Collection {:?} is already registered", definition.collection));
        }

        self.definitions.push(Arc::new(definition));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ResourceDefinition>> {
        self.definitions.iter().find(|definition| definition.name == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceDefinition>> {
        self.definitions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Checks that every reference field points at a registered resource.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first dangling reference.
    pub fn validate(&self) -> Result<()> {
        for definition in self.iter() {
            for rule in &definition.fields {
                let FieldKind::Reference { resource } = &rule.kind else {
                    continue;
                };
                if self.get(resource).is_none() {
                    return Err(eyre!(
                        "Field {}.{} references unknown resource {:?}",
                        definition.name,
                        rule.name,
                        resource
                    ));
                }
            }
        }
        Ok(())
    }

    /// The resources served by default, with their baseline rows.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in definitions; the `Result` comes from `register`.
    pub fn default_catalog() -> Result<Self> {
        let mut catalog = Self::new();

        catalog.register(
            ResourceDefinition::new("customer_groups", "/customers/groups", "customerGroupId", "Customer group")
                .scopes("customer_group_read", "customer_group_write")
                .field(FieldRule::required("localizedNames", FieldKind::Localized))
                .field(FieldRule::required(
                    "reductionPercent",
                    FieldKind::Decimal { min: 0.0, max: 100.0 },
                ))
                .field(FieldRule::required("displayPriceTaxExcluded", FieldKind::Boolean))
                .field(FieldRule::required("showPrice", FieldKind::Boolean))
                .seed(json!({
                    "localizedNames": { "en-US": "Visitor", "fr-FR": "Visiteur" },
                    "reductionPercent": "0.00",
                    "displayPriceTaxExcluded": false,
                    "showPrice": true
                }))
                .seed(json!({
                    "localizedNames": { "en-US": "Guest", "fr-FR": "Invité" },
                    "reductionPercent": "0.00",
                    "displayPriceTaxExcluded": false,
                    "showPrice": true
                }))
                .seed(json!({
                    "localizedNames": { "en-US": "Customer", "fr-FR": "Client" },
                    "reductionPercent": "0.00",
                    "displayPriceTaxExcluded": false,
                    "showPrice": true
                })),
        )?;

        catalog.register(
            ResourceDefinition::new("customers", "/customers", "customerId", "Customer")
                .scopes("customer_read", "customer_write")
                .field(FieldRule::required("firstName", FieldKind::text(255)))
                .field(FieldRule::required("lastName", FieldKind::text(255)))
                .field(FieldRule::required("email", FieldKind::Email))
                .field(FieldRule::required("defaultGroupId", FieldKind::reference("customer_groups")))
                .field(FieldRule::optional("newsletterSubscribed", FieldKind::Boolean).with_default(json!(false)))
                .field(FieldRule::optional("enabled", FieldKind::Boolean).with_default(json!(true))),
        )?;

        catalog.register(
            ResourceDefinition::new("addresses", "/addresses", "addressId", "Address")
                .scopes("address_read", "address_write")
                .field(FieldRule::required("customerId", FieldKind::reference("customers")))
                .field(FieldRule::required("alias", FieldKind::text(32)))
                .field(FieldRule::required("firstName", FieldKind::text(255)))
                .field(FieldRule::required("lastName", FieldKind::text(255)))
                .field(FieldRule::required("address1", FieldKind::text(128)))
                .field(FieldRule::optional("address2", FieldKind::text(128)))
                .field(FieldRule::optional("postCode", FieldKind::text(12)))
                .field(FieldRule::required("city", FieldKind::text(64)))
                .field(FieldRule::optional("phone", FieldKind::text(32))),
        )?;

        catalog.register(
            ResourceDefinition::new("zones", "/zones", "zoneId", "Zone")
                .scopes("zone_read", "zone_write")
                .field(FieldRule::required("name", FieldKind::text(64)))
                .field(FieldRule::optional("enabled", FieldKind::Boolean).with_default(json!(true)))
                .seed(json!({ "name": "Europe", "enabled": true }))
                .seed(json!({ "name": "North America", "enabled": true }))
                .seed(json!({ "name": "Asia", "enabled": true }))
                .seed(json!({ "name": "Africa", "enabled": true }))
                .seed(json!({ "name": "Oceania", "enabled": true })),
        )?;

        catalog.register(
            ResourceDefinition::new("taxes", "/taxes", "taxId", "Tax")
                .scopes("tax_read", "tax_write")
                .field(FieldRule::required("localizedNames", FieldKind::Localized))
                .field(FieldRule::required("rate", FieldKind::Decimal { min: 0.0, max: 100.0 }))
                .field(FieldRule::optional("enabled", FieldKind::Boolean).with_default(json!(true)))
                .seed(json!({
                    "localizedNames": { "en-US": "VAT FR 20%", "fr-FR": "TVA FR 20%" },
                    "rate": "20.000",
                    "enabled": true
                }))
                .seed(json!({
                    "localizedNames": { "en-US": "VAT FR 10%", "fr-FR": "TVA FR 10%" },
                    "rate": "10.000",
                    "enabled": true
                })),
        )?;

        catalog.register(
            ResourceDefinition::new("suppliers", "/suppliers", "supplierId", "Supplier")
                .scopes("supplier_read", "supplier_write")
                .field(FieldRule::required("name", FieldKind::text(64)))
                .field(FieldRule::optional("localizedDescriptions", FieldKind::Localized))
                .field(FieldRule::optional("enabled", FieldKind::Boolean).with_default(json!(true))),
        )?;

        catalog.register(
            ResourceDefinition::new("attachments", "/attachments", "attachmentId", "Attachment")
                .scopes("attachment_read", "attachment_write")
                .field(FieldRule::required("name", FieldKind::text(128)))
                .field(FieldRule::required("fileName", FieldKind::text(255)))
                .field(FieldRule::required("mimeType", FieldKind::text(128)))
                .field(FieldRule::required(
                    "size",
                    FieldKind::Integer { min: 0, max: i64::MAX },
                ))
                .with_multipart(),
        )?;

        catalog.validate()?;
        Ok(catalog)
    }
}
