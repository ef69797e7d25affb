//! Schema definitions.
//!
//! A [`DbDef`] lists the tables and object stores of a database. Tables are
//! declared with their key and value types as generic parameters; the
//! database keeps them type-erased and checks the requested types again
//! whenever a transaction opens a table by name.
//!
//! ```
//! use isodb::codec::{AnyValue, AutoKey, StringKey};
//! use isodb::schema::{DbDef, IndexDef, ObjectDef, TableDef};
//!
//! let users = TableDef::<AutoKey, AnyValue>::new("users").with_index(IndexDef::new(
//!     "by_name",
//!     |_key, value: &AnyValue| value.get("name").and_then(AnyValue::as_str).map(StringKey::from),
//! ));
//! let def = DbDef::new()
//!     .table(users)
//!     .object(ObjectDef::new("auth").slot::<Vec<u8>>("secret"));
//! assert_eq!(def.namespaces().len(), 4);
//! ```

use crate::codec::{type_label, Encodable, KeyKind, TableKey};
use crate::error::{IsoDbResult, SchemaError};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Namespace holding per-table bookkeeping such as `AutoKey` high-water marks.
pub const META_NAMESPACE: &str = "#meta";

pub fn index_namespace(table: &str, index: &str) -> String {
    format!("{table}#{index}")
}

pub fn object_namespace(name: &str) -> String {
    format!("object#{name}")
}

type Mapper<K, V> = Arc<dyn Fn(&K, &V) -> IsoDbResult<Option<Vec<u8>>> + Send + Sync>;

/// A secondary index over a table with key `K` and value `V`.
///
/// The mapper computes the index key of a row; `None` leaves the row out
/// of the index.
pub struct IndexDef<K, V> {
    name: String,
    key_kind: KeyKind,
    key_type: TypeId,
    key_type_name: &'static str,
    mapper: Mapper<K, V>,
}

impl<K, V> Clone for IndexDef<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            key_kind: self.key_kind,
            key_type: self.key_type,
            key_type_name: self.key_type_name,
            mapper: Arc::clone(&self.mapper),
        }
    }
}

impl<K: TableKey, V: Encodable> IndexDef<K, V> {
    pub fn new<IK, F>(name: impl Into<String>, mapper: F) -> Self
    where
        IK: TableKey,
        F: Fn(&K, &V) -> Option<IK> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            key_kind: IK::KIND,
            key_type: TypeId::of::<IK>(),
            key_type_name: type_label::<IK>(),
            mapper: Arc::new(move |key: &K, value: &V| {
                mapper(key, value).map(|ik| ik.encode()).transpose()
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_kind(&self) -> KeyKind {
        self.key_kind
    }

    /// Encoded index key for a row, if the row is indexed.
    pub(crate) fn map(&self, key: &K, value: &V) -> IsoDbResult<Option<Vec<u8>>> {
        (self.mapper)(key, value)
    }

    pub(crate) fn check_key_type<IK: 'static>(&self, table: &str) -> IsoDbResult<()> {
        if self.key_type != TypeId::of::<IK>() {
            return Err(SchemaError::TypeMismatch {
                target: index_namespace(table, &self.name),
                declared: self.key_type_name,
                requested: type_label::<IK>(),
            }
            .into());
        }
        Ok(())
    }
}

/// A table with key type `K` and value type `V`.
pub struct TableDef<K, V> {
    name: String,
    indexes: Vec<IndexDef<K, V>>,
}

impl<K, V> Clone for TableDef<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            indexes: self.indexes.clone(),
        }
    }
}

impl<K: TableKey, V: Encodable> TableDef<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexDef<K, V>) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indexes(&self) -> &[IndexDef<K, V>] {
        &self.indexes
    }

    pub(crate) fn index(&self, name: &str) -> IsoDbResult<&IndexDef<K, V>> {
        self.indexes
            .iter()
            .find(|index| index.name == name)
            .ok_or_else(|| {
                SchemaError::UnknownIndex {
                    table: self.name.clone(),
                    index: name.to_string(),
                }
                .into()
            })
    }

    pub(crate) fn index_namespaces(&self) -> impl Iterator<Item = String> + '_ {
        self.indexes
            .iter()
            .map(|index| index_namespace(&self.name, &index.name))
    }
}

/// A fixed set of named singleton slots.
#[derive(Debug, Clone)]
pub struct ObjectDef {
    name: String,
    slots: BTreeMap<String, SlotType>,
}

#[derive(Debug, Clone, Copy)]
struct SlotType {
    id: TypeId,
    name: &'static str,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: BTreeMap::new(),
        }
    }

    /// Declares a slot holding values of type `V`.
    pub fn slot<V: Encodable>(mut self, slot: impl Into<String>) -> Self {
        self.slots.insert(
            slot.into(),
            SlotType {
                id: TypeId::of::<V>(),
                name: type_label::<V>(),
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    fn declared(&self, slot: &str) -> Result<&SlotType, SchemaError> {
        self.slots.get(slot).ok_or_else(|| SchemaError::UndeclaredSlot {
            store: self.name.clone(),
            slot: slot.to_string(),
        })
    }

    pub(crate) fn check_declared(&self, slot: &str) -> IsoDbResult<()> {
        self.declared(slot)?;
        Ok(())
    }

    pub(crate) fn check_slot<V: 'static>(&self, slot: &str) -> IsoDbResult<()> {
        let declared = self.declared(slot)?;
        if declared.id != TypeId::of::<V>() {
            return Err(SchemaError::TypeMismatch {
                target: format!("{}.{}", self.name, slot),
                declared: declared.name,
                requested: type_label::<V>(),
            }
            .into());
        }
        Ok(())
    }
}

/// Type-erased table entry.
#[derive(Clone)]
struct TableEntry {
    name: String,
    key_kind: KeyKind,
    key_type: TypeId,
    key_type_name: &'static str,
    value_type: TypeId,
    value_type_name: &'static str,
    indexes: Vec<(String, KeyKind)>,
    def: Arc<dyn Any + Send + Sync>,
}

/// The schema of a database.
#[derive(Clone, Default)]
pub struct DbDef {
    tables: Vec<TableEntry>,
    objects: Vec<Arc<ObjectDef>>,
}

impl DbDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table<K: TableKey, V: Encodable>(mut self, def: TableDef<K, V>) -> Self {
        self.tables.push(TableEntry {
            name: def.name.clone(),
            key_kind: K::KIND,
            key_type: TypeId::of::<K>(),
            key_type_name: type_label::<K>(),
            value_type: TypeId::of::<V>(),
            value_type_name: type_label::<V>(),
            indexes: def
                .indexes
                .iter()
                .map(|index| (index.name.clone(), index.key_kind))
                .collect(),
            def: Arc::new(def),
        });
        self
    }

    pub fn object(mut self, def: ObjectDef) -> Self {
        self.objects.push(Arc::new(def));
        self
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Every backing namespace with the key ordering it stores.
    ///
    /// The metadata namespace is included when a table uses `AutoKey`.
    pub fn namespaces(&self) -> Vec<(String, KeyKind)> {
        let mut out = Vec::new();
        for table in &self.tables {
            out.push((table.name.clone(), table.key_kind));
            for (index, kind) in &table.indexes {
                out.push((index_namespace(&table.name, index), *kind));
            }
        }
        for object in &self.objects {
            out.push((object_namespace(&object.name), KeyKind::String));
        }
        if self.tables.iter().any(|t| t.key_kind == KeyKind::Auto) {
            out.push((META_NAMESPACE.to_string(), KeyKind::String));
        }
        out
    }

    /// Rejects empty names, names containing `#`, and colliding namespaces.
    pub fn validate(&self) -> IsoDbResult<()> {
        let names = self
            .tables
            .iter()
            .flat_map(|t| std::iter::once(&t.name).chain(t.indexes.iter().map(|(n, _)| n)))
            .chain(self.objects.iter().map(|o| &o.name));
        for name in names {
            if name.is_empty() || name.contains('#') {
                return Err(SchemaError::InvalidName(name.clone()).into());
            }
        }
        let mut seen = BTreeSet::new();
        for (namespace, _) in self.namespaces() {
            if !seen.insert(namespace.clone()) {
                return Err(SchemaError::DuplicateName(namespace).into());
            }
        }
        Ok(())
    }

    /// Looks up a table and checks it was declared with `K` and `V`.
    pub(crate) fn table_def<K: TableKey, V: Encodable>(
        &self,
        name: &str,
    ) -> IsoDbResult<Arc<TableDef<K, V>>> {
        let entry = self
            .tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))?;
        if entry.key_type != TypeId::of::<K>() {
            return Err(SchemaError::TypeMismatch {
                target: format!("{name} key"),
                declared: entry.key_type_name,
                requested: type_label::<K>(),
            }
            .into());
        }
        if entry.value_type != TypeId::of::<V>() {
            return Err(SchemaError::TypeMismatch {
                target: format!("{name} value"),
                declared: entry.value_type_name,
                requested: type_label::<V>(),
            }
            .into());
        }
        Arc::clone(&entry.def)
            .downcast::<TableDef<K, V>>()
            .map_err(|_| {
                SchemaError::TypeMismatch {
                    target: name.to_string(),
                    declared: entry.key_type_name,
                    requested: type_label::<K>(),
                }
                .into()
            })
    }

    pub(crate) fn object_def(&self, name: &str) -> IsoDbResult<Arc<ObjectDef>> {
        self.objects
            .iter()
            .find(|o| o.name == name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownObjectStore(name.to_string()).into())
    }
}
