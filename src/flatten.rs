//! Flattening nested results into a table of entities.
//!
//! An entity is any object carrying a string type discriminator and an `id` (string or number).
//! Entities are the unit of cross-query consistency: the cache compares their snapshots between
//! writes to decide which queries are stale.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::{btree_map, BTreeMap},
    fmt::{self, Display, Formatter},
};

use crate::config::{DEFAULT_ID_FIELD, DEFAULT_TYPENAME_FIELD};

/// `"{typename}-{id}"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(typename: &str, id: &str) -> Self {
        EntityKey(format!("{typename}-{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityKey {
    fn from(key: &str) -> Self {
        EntityKey(key.to_string())
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which fields identify an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIdentity {
    pub typename_field: String,
    pub id_field: String,
}

impl Default for EntityIdentity {
    fn default() -> Self {
        EntityIdentity {
            typename_field: DEFAULT_TYPENAME_FIELD.to_string(),
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }
}

impl EntityIdentity {
    /// The entity key of `object`, if it is an entity.
    pub fn key_of(&self, object: &Map<String, Value>) -> Option<EntityKey> {
        let typename = object.get(&self.typename_field)?.as_str()?;
        let id = match object.get(&self.id_field)? {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        Some(EntityKey::new(typename, &id))
    }
}

/// Entity key -> entity snapshot, as seen in one result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlattenedResult(BTreeMap<EntityKey, Value>);

impl FlattenedResult {
    pub fn new() -> Self {
        FlattenedResult::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &EntityKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> btree_map::Keys<'_, EntityKey, Value> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, EntityKey, Value> {
        self.0.iter()
    }

    /// Record an entity. A second occurrence in the same result adds its fields to the first.
    fn record(&mut self, key: EntityKey, object: &Map<String, Value>) {
        match self.0.entry(key) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(Value::Object(object.clone()));
            }
            btree_map::Entry::Occupied(mut existing) => {
                if let Value::Object(fields) = existing.get_mut() {
                    for (name, value) in object {
                        fields.insert(name.clone(), value.clone());
                    }
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a FlattenedResult {
    type Item = (&'a EntityKey, &'a Value);
    type IntoIter = btree_map::Iter<'a, EntityKey, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(EntityKey, Value)> for FlattenedResult {
    fn from_iter<I: IntoIterator<Item = (EntityKey, Value)>>(iter: I) -> Self {
        FlattenedResult(iter.into_iter().collect())
    }
}

/// Collect every entity found anywhere in `result`.
pub fn flatten(result: &Value, identity: &EntityIdentity) -> FlattenedResult {
    let mut flattened = FlattenedResult::new();
    flatten_into(result, identity, &mut flattened);
    flattened
}

fn flatten_into(value: &Value, identity: &EntityIdentity, flattened: &mut FlattenedResult) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, identity, flattened);
            }
        }
        Value::Object(object) => {
            if let Some(key) = identity.key_of(object) {
                flattened.record(key, object);
            }
            for child in object.values() {
                if child.is_object() || child.is_array() {
                    flatten_into(child, identity, flattened);
                }
            }
        }
        _ => {}
    }
}
