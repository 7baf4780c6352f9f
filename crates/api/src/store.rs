use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::catalog::{ResourceCatalog, ResourceDefinition};
use crate::error::{ApiError, ApiResult};

pub type Fields = Map<String, Value>;

#[derive(Debug, Default)]
struct ResourceTable {
    next_id: u64,
    rows: BTreeMap<u64, Fields>,
}

impl ResourceTable {
    fn seeded(definition: &ResourceDefinition) -> Self {
        let mut table = Self {
            next_id: 1,
            rows: BTreeMap::new(),
        };
        for seed in &definition.seeds {
            table.push(seed.clone());
        }
        table
    }

    fn push(&mut self, fields: Fields) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.insert(id, fields);
        id
    }
}

/// In-memory rows of every catalog resource.
///
/// Ids are assigned per resource, start at 1 and are never reused until the
/// resource is reset to its seeds.
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
    tables: Arc<RwLock<HashMap<String, ResourceTable>>>,
}

impl ResourceStore {
    #[must_use]
    pub fn from_catalog(catalog: &ResourceCatalog) -> Self {
        let tables = catalog
            .iter()
            .map(|definition| (definition.name.clone(), ResourceTable::seeded(definition)))
            .collect();

        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    fn read(&self) -> ApiResult<RwLockReadGuard<'_, HashMap<String, ResourceTable>>> {
        self.tables
            .read()
            .map_err(|_| ApiError::InternalError("Resource store lock poisoned".to_string()))
    }

    fn write(&self) -> ApiResult<RwLockWriteGuard<'_, HashMap<String, ResourceTable>>> {
        self.tables
            .write()
            .map_err(|_| ApiError::InternalError("Resource store lock poisoned".to_string()))
    }

    /// Restores a resource to its seed rows and restarts its id sequence.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InternalError` if the store lock is poisoned.
    pub fn reset(&self, definition: &ResourceDefinition) -> ApiResult<()> {
        self.write()?
            .insert(definition.name.clone(), ResourceTable::seeded(definition));
        debug!(resource = %definition.name, seeds = definition.seeds.len(), "resource reset");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ApiError::InternalError` if the store lock is poisoned.
    pub fn insert(&self, definition: &ResourceDefinition, fields: Fields) -> ApiResult<Value> {
        let mut tables = self.write()?;
        let table = tables.entry(definition.name.clone()).or_default();
        if table.next_id == 0 {
            table.next_id = 1;
        }
        let item = definition.render(table.next_id, &fields);
        table.push(fields);
        Ok(item)
    }

    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if no item has this id.
    pub fn get(&self, definition: &ResourceDefinition, id: u64) -> ApiResult<Value> {
        self.read()?
            .get(&definition.name)
            .and_then(|table| table.rows.get(&id))
            .map(|fields| definition.render(id, fields))
            .ok_or_else(|| not_found(definition, id))
    }

    #[must_use]
    pub fn contains(&self, resource: &str, id: u64) -> bool {
        self.read()
            .map(|tables| tables.get(resource).is_some_and(|table| table.rows.contains_key(&id)))
            .unwrap_or(false)
    }

    /// Replaces every stored field of an item.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if no item has this id.
    pub fn replace(&self, definition: &ResourceDefinition, id: u64, fields: Fields) -> ApiResult<Value> {
        let mut tables = self.write()?;
        let row = tables
            .get_mut(&definition.name)
            .and_then(|table| table.rows.get_mut(&id))
            .ok_or_else(|| not_found(definition, id))?;
        *row = fields;
        Ok(definition.render(id, row))
    }

    /// Merges the given fields into an item, leaving the others untouched.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if no item has this id.
    pub fn merge(&self, definition: &ResourceDefinition, id: u64, fields: Fields) -> ApiResult<Value> {
        let mut tables = self.write()?;
        let row = tables
            .get_mut(&definition.name)
            .and_then(|table| table.rows.get_mut(&id))
            .ok_or_else(|| not_found(definition, id))?;
        for (key, value) in fields {
            row.insert(key, value);
        }
        Ok(definition.render(id, row))
    }

    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if no item has this id.
    pub fn remove(&self, definition: &ResourceDefinition, id: u64) -> ApiResult<()> {
        self.write()?
            .get_mut(&definition.name)
            .and_then(|table| table.rows.remove(&id))
            .map(|_| ())
            .ok_or_else(|| not_found(definition, id))
    }

    /// Removes all given ids, or none of them when one is missing.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` listing the missing ids.
    pub fn remove_many(&self, definition: &ResourceDefinition, ids: &[u64]) -> ApiResult<()> {
        let mut tables = self.write()?;
        let table = tables
            .get_mut(&definition.name)
            .ok_or_else(|| ApiError::NotFound(format!("{} not found", definition.label)))?;

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !table.rows.contains_key(*id))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::NotFound(format!(
                "{} not found: {}",
                definition.label,
                missing.join(", ")
            )));
        }

        for id in ids {
            table.rows.remove(id);
        }
        Ok(())
    }

    /// Every item of a resource, rendered, in id order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InternalError` if the store lock is poisoned.
    pub fn list(&self, definition: &ResourceDefinition) -> ApiResult<Vec<Value>> {
        Ok(self
            .read()?
            .get(&definition.name)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .map(|(id, fields)| definition.render(*id, fields))
                    .collect()
            })
            .unwrap_or_default())
    }

    #[must_use]
    pub fn count(&self, resource: &str) -> usize {
        self.read()
            .map(|tables| tables.get(resource).map_or(0, |table| table.rows.len()))
            .unwrap_or(0)
    }
}

fn not_found(definition: &ResourceDefinition, id: u64) -> ApiError {
    ApiError::NotFound(format!("{} {id} not found", definition.label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldKind, FieldRule};
    use serde_json::json;

    fn zones() -> ResourceDefinition {
        ResourceDefinition::new("zones", "/zones", "zoneId", "Zone")
            .field(FieldRule::required("name", FieldKind::text(64)))
            .seed(json!({ "name": "Europe" }))
            .seed(json!({ "name": "Asia" }))
    }

    fn store_for(definition: &ResourceDefinition) -> ResourceStore {
        let mut catalog = ResourceCatalog::new();
        catalog.register(definition.clone()).unwrap();
        ResourceStore::from_catalog(&catalog)
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_seeds_get_sequential_ids() {
        let definition = zones();
        let store = store_for(&definition);

        assert_eq!(store.count("zones"), 2);
        assert_eq!(store.get(&definition, 1).unwrap()["name"], "Europe");
        assert_eq!(store.get(&definition, 2).unwrap()["zoneId"], 2);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let definition = zones();
        let store = store_for(&definition);

        let created = store.insert(&definition, fields(json!({ "name": "Oceania" }))).unwrap();
        assert_eq!(created["zoneId"], 3);
        store.remove(&definition, 3).unwrap();

        let next = store.insert(&definition, fields(json!({ "name": "Africa" }))).unwrap();
        assert_eq!(next["zoneId"], 4);
    }

    #[test]
    fn test_reset_restores_seeds() {
        let definition = zones();
        let store = store_for(&definition);
        store.insert(&definition, fields(json!({ "name": "Oceania" }))).unwrap();
        store.remove(&definition, 1).unwrap();

        store.reset(&definition).unwrap();

        assert_eq!(store.count("zones"), 2);
        assert!(store.contains("zones", 1));
        let created = store.insert(&definition, fields(json!({ "name": "Oceania" }))).unwrap();
        assert_eq!(created["zoneId"], 3);
    }

    #[test]
    fn test_merge_keeps_other_fields() {
        let definition = zones();
        let store = store_for(&definition);
        store.merge(&definition, 1, fields(json!({ "enabled": false }))).unwrap();

        let item = store.get(&definition, 1).unwrap();
        assert_eq!(item["name"], "Europe");
        assert_eq!(item["enabled"], false);
    }

    #[test]
    fn test_remove_many_is_all_or_nothing() {
        let definition = zones();
        let store = store_for(&definition);

        let result = store.remove_many(&definition, &[1, 99]);
        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert_eq!(store.count("zones"), 2);

        store.remove_many(&definition, &[1, 2]).unwrap();
        assert_eq!(store.count("zones"), 0);
    }

    #[test]
    fn test_missing_item_is_not_found() {
        let definition = zones();
        let store = store_for(&definition);

        assert!(matches!(store.get(&definition, 42), Err(ApiError::NotFound(_))));
        assert!(matches!(store.remove(&definition, 42), Err(ApiError::NotFound(_))));
        assert!(matches!(
            store.replace(&definition, 42, Fields::new()),
            Err(ApiError::NotFound(_))
        ));
    }
}
