use std::fmt;

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::ConfigurationError;

/// A record type stored in a document collection.
///
/// Implemented by `#[derive(Record)]`; the derive turns the `#[aggrel(...)]`
/// attributes into a [`TypeSchema`]. The schema is read once per type by the
/// metadata cache and never inspected again.
///
/// ```text
/// #[derive(Record, Serialize, Deserialize)]
/// #[aggrel(collection = "group")]
/// pub struct Group {
///     #[aggrel(id)]
///     #[serde(rename = "_id")]
///     pub id: String,
///     #[aggrel(parent)]
///     pub parent_id: Option<String>,
///     pub name: String,
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn schema() -> TypeSchema<Self>
    where
        Self: Sized;
}

/// Capability description of a record type: its collection declaration and
/// every field that carries a role.
pub struct TypeSchema<T> {
    pub type_name: &'static str,
    pub collection: Option<&'static str>,
    pub fields: Vec<FieldSchema<T>>,
}

impl<T> TypeSchema<T> {
    pub fn new(type_name: &'static str, collection: Option<&'static str>) -> Self {
        Self {
            type_name,
            collection,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSchema<T>) -> Self {
        self.fields.push(field);
        self
    }
}

impl<T> fmt::Debug for TypeSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSchema")
            .field("type_name", &self.type_name)
            .field("collection", &self.collection)
            .field("fields", &self.fields)
            .finish()
    }
}

/// One role-carrying field of a record type.
pub struct FieldSchema<T> {
    /// Rust field name.
    pub property: &'static str,
    /// Name of the field inside stored documents (honours `serde(rename)`).
    pub document_field: &'static str,
    pub role: FieldRole<T>,
}

impl<T> FieldSchema<T> {
    pub fn primary_key(
        property: &'static str,
        document_field: &'static str,
        get: fn(&T) -> Option<&str>,
        set: fn(&mut T, String),
    ) -> Self {
        Self {
            property,
            document_field,
            role: FieldRole::PrimaryKey { get, set },
        }
    }

    pub fn parent_reference(property: &'static str, document_field: &'static str, get: fn(&T) -> Option<&str>) -> Self {
        Self {
            property,
            document_field,
            role: FieldRole::ParentReference { get },
        }
    }

    pub fn local_key(
        property: &'static str,
        document_field: &'static str,
        link: &'static str,
        related: RelatedType,
    ) -> Self {
        Self {
            property,
            document_field,
            role: FieldRole::LocalKey { link, related },
        }
    }

    pub fn foreign_key(
        property: &'static str,
        document_field: &'static str,
        link: &'static str,
        related: RelatedType,
    ) -> Self {
        Self {
            property,
            document_field,
            role: FieldRole::ForeignKey { link, related },
        }
    }
}

impl<T> fmt::Debug for FieldSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSchema")
            .field("property", &self.property)
            .field("document_field", &self.document_field)
            .field("role", &self.role)
            .finish()
    }
}

pub enum FieldRole<T> {
    PrimaryKey {
        get: fn(&T) -> Option<&str>,
        set: fn(&mut T, String),
    },
    ParentReference {
        get: fn(&T) -> Option<&str>,
    },
    /// This type holds the identifier(s) of the related record at `link`.
    LocalKey { link: &'static str, related: RelatedType },
    /// The related type holds a back-reference to this type at `link`.
    ForeignKey { link: &'static str, related: RelatedType },
}

impl<T> fmt::Debug for FieldRole<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRole::PrimaryKey { .. } => f.write_str("PrimaryKey"),
            FieldRole::ParentReference { .. } => f.write_str("ParentReference"),
            FieldRole::LocalKey { link, related } => f
                .debug_struct("LocalKey")
                .field("link", link)
                .field("related", related)
                .finish(),
            FieldRole::ForeignKey { link, related } => f
                .debug_struct("ForeignKey")
                .field("link", link)
                .field("related", related)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Single,
    Collection,
}

/// The declared type of a relationship property, reduced to its element type.
#[derive(Clone, Copy)]
pub struct RelatedType {
    pub type_name: &'static str,
    pub cardinality: Cardinality,
    /// Resolves the element type's metadata; see [`crate::metadata::related_target`].
    pub resolve: fn() -> Result<RelatedTarget, ConfigurationError>,
}

impl RelatedType {
    pub fn new(
        type_name: &'static str,
        cardinality: Cardinality,
        resolve: fn() -> Result<RelatedTarget, ConfigurationError>,
    ) -> Self {
        Self {
            type_name,
            cardinality,
            resolve,
        }
    }
}

impl PartialEq for RelatedType {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.cardinality == other.cardinality
    }
}

impl Eq for RelatedType {}

impl fmt::Debug for RelatedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelatedType")
            .field("type_name", &self.type_name)
            .field("cardinality", &self.cardinality)
            .finish()
    }
}

/// Where a related record type lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedTarget {
    pub collection: String,
    pub primary_key: String,
}

/// Field types usable as primary keys and parent references.
///
/// An empty string or `None` means "no identifier": an unsaved record for
/// primary keys, the root sentinel for parent references.
pub trait KeyValue {
    fn key(&self) -> Option<&str>;
    fn assign(&mut self, key: String);
}

impl KeyValue for String {
    fn key(&self) -> Option<&str> {
        (!self.is_empty()).then_some(self.as_str())
    }

    fn assign(&mut self, key: String) {
        *self = key;
    }
}

impl KeyValue for Option<String> {
    fn key(&self) -> Option<&str> {
        self.as_deref().filter(|key| !key.is_empty())
    }

    fn assign(&mut self, key: String) {
        *self = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_keys_are_unassigned() {
        assert_eq!(String::new().key(), None);
        assert_eq!(Some(String::new()).key(), None);
        assert_eq!(None::<String>.key(), None);
        assert_eq!("g1".to_string().key(), Some("g1"));
    }

    #[test]
    fn assign_replaces_key() {
        let mut optional: Option<String> = None;
        optional.assign("abc".into());
        assert_eq!(optional.key(), Some("abc"));

        let mut plain = String::from("old");
        plain.assign("new".into());
        assert_eq!(plain, "new");
    }
}
