//! Process-wide record metadata cache.
//!
//! Entries are created lazily on the first [`resolve`] of a type and live for
//! the rest of the process. There is no invalidation: the binding between a
//! Rust type and its stored documents is static. Reads take a shared lock; a
//! miss takes the exclusive lock and re-checks before building, so at most one
//! value is ever published per type.

use std::{
    any::{Any, TypeId},
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use log::{debug, trace};

use crate::{
    errors::{ConfigurationError, ConfigurationErrorKind},
    types::{FieldRole, RelatedTarget, RelatedType, Record, TypeSchema},
};

type CacheEntry = Arc<dyn Any + Send + Sync>;

static CACHE: OnceLock<RwLock<HashMap<TypeId, CacheEntry>>> = OnceLock::new();

fn cache() -> &'static RwLock<HashMap<TypeId, CacheEntry>> {
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

fn cached<T: Record>(entries: &HashMap<TypeId, CacheEntry>) -> Option<Arc<TypeMetadata<T>>> {
    entries
        .get(&TypeId::of::<T>())
        .cloned()
        .and_then(|entry| entry.downcast::<TypeMetadata<T>>().ok())
}

/// Resolve (and memoize) the metadata of `T`.
///
/// Failed resolutions are not cached; every call for an invalid type reports
/// the same [`ConfigurationError`].
pub fn resolve<T: Record>() -> Result<Arc<TypeMetadata<T>>, ConfigurationError> {
    {
        let entries = cache().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(metadata) = cached::<T>(&entries) {
            trace!("metadata cache hit for {}", metadata.type_name);
            return Ok(metadata);
        }
    }

    let mut entries = cache().write().unwrap_or_else(PoisonError::into_inner);
    if let Some(metadata) = cached::<T>(&entries) {
        return Ok(metadata);
    }

    let metadata = Arc::new(TypeMetadata::from_schema(T::schema())?);
    debug!(
        "resolved metadata for {} (collection `{}`, {} local keys, {} foreign keys)",
        metadata.type_name,
        metadata.collection,
        metadata.local_keys.len(),
        metadata.foreign_keys.len()
    );
    entries.insert(TypeId::of::<T>(), metadata.clone());
    Ok(metadata)
}

/// Collection name declared for `T`.
pub fn collection_name<T: Record>() -> Result<String, ConfigurationError> {
    Ok(resolve::<T>()?.collection.clone())
}

/// Location of a related record type, used by relationship descriptors.
pub fn related_target<R: Record>() -> Result<RelatedTarget, ConfigurationError> {
    let metadata = resolve::<R>()?;
    Ok(RelatedTarget {
        collection: metadata.collection.clone(),
        primary_key: metadata.primary_key.field.to_string(),
    })
}

/// Resolved, immutable metadata of one record type.
pub struct TypeMetadata<T> {
    type_name: &'static str,
    collection: String,
    primary_key: KeyAccessor<T>,
    parent_reference: Option<ParentAccessor<T>>,
    local_keys: BTreeMap<String, RelationshipField>,
    foreign_keys: BTreeMap<String, RelationshipField>,
}

impl<T> TypeMetadata<T> {
    pub fn from_schema(schema: TypeSchema<T>) -> Result<Self, ConfigurationError> {
        let type_name = schema.type_name;
        let fail = |kind| ConfigurationError::new(type_name, kind);

        let collection = schema
            .collection
            .ok_or_else(|| fail(ConfigurationErrorKind::MissingCollectionDeclaration))?
            .to_string();

        let mut primary_keys = Vec::new();
        let mut parents = Vec::new();
        let mut local_keys = BTreeMap::new();
        let mut foreign_keys = BTreeMap::new();

        for field in schema.fields {
            match field.role {
                FieldRole::PrimaryKey { get, set } => primary_keys.push(KeyAccessor {
                    property: field.property,
                    field: field.document_field,
                    get,
                    set,
                }),
                FieldRole::ParentReference { get } => parents.push(ParentAccessor {
                    property: field.property,
                    field: field.document_field,
                    get,
                }),
                FieldRole::LocalKey { link, related } | FieldRole::ForeignKey { link, related } => {
                    let property = field.property.to_string();
                    if local_keys.contains_key(&property) || foreign_keys.contains_key(&property) {
                        return Err(fail(ConfigurationErrorKind::ConflictingRelationshipDeclaration { property }));
                    }
                    let target = if matches!(field.role, FieldRole::LocalKey { .. }) {
                        &mut local_keys
                    } else {
                        &mut foreign_keys
                    };
                    target.insert(
                        property.clone(),
                        RelationshipField {
                            property,
                            document_field: field.document_field.to_string(),
                            link: link.to_string(),
                            related,
                        },
                    );
                }
            }
        }

        if primary_keys.len() > 1 {
            let fields = primary_keys.iter().map(|key| key.property.to_string()).collect();
            return Err(fail(ConfigurationErrorKind::DuplicatePrimaryKeyDeclaration { fields }));
        }
        let primary_key = primary_keys
            .pop()
            .ok_or_else(|| fail(ConfigurationErrorKind::MissingPrimaryKeyDeclaration))?;

        if parents.len() > 1 {
            let fields = parents.iter().map(|parent| parent.property.to_string()).collect();
            return Err(fail(ConfigurationErrorKind::DuplicateParentReferenceDeclaration { fields }));
        }

        Ok(Self {
            type_name,
            collection,
            primary_key,
            parent_reference: parents.pop(),
            local_keys,
            foreign_keys,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn primary_key(&self) -> &KeyAccessor<T> {
        &self.primary_key
    }

    pub fn parent_reference(&self) -> Option<&ParentAccessor<T>> {
        self.parent_reference.as_ref()
    }

    /// Parent reference required by hierarchy and path pipelines.
    pub fn require_parent_reference(&self) -> Result<&ParentAccessor<T>, ConfigurationError> {
        self.parent_reference.as_ref().ok_or_else(|| {
            ConfigurationError::new(self.type_name, ConfigurationErrorKind::MissingParentReferenceDeclaration)
        })
    }

    pub fn local_keys(&self) -> &BTreeMap<String, RelationshipField> {
        &self.local_keys
    }

    pub fn foreign_keys(&self) -> &BTreeMap<String, RelationshipField> {
        &self.foreign_keys
    }
}

impl<T> PartialEq for TypeMetadata<T> {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.collection == other.collection
            && self.primary_key.field == other.primary_key.field
            && self.parent_reference.as_ref().map(|parent| parent.field)
                == other.parent_reference.as_ref().map(|parent| parent.field)
            && self.local_keys == other.local_keys
            && self.foreign_keys == other.foreign_keys
    }
}

impl<T> fmt::Debug for TypeMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("type_name", &self.type_name)
            .field("collection", &self.collection)
            .field("primary_key", &self.primary_key.field)
            .field("parent_reference", &self.parent_reference.as_ref().map(|parent| parent.field))
            .field("local_keys", &self.local_keys)
            .field("foreign_keys", &self.foreign_keys)
            .finish()
    }
}

/// Read/write access to a record's primary key, captured once at resolution.
pub struct KeyAccessor<T> {
    property: &'static str,
    field: &'static str,
    get: fn(&T) -> Option<&str>,
    set: fn(&mut T, String),
}

impl<T> KeyAccessor<T> {
    pub fn property(&self) -> &'static str {
        self.property
    }

    /// Document field holding the key.
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn get<'a>(&self, record: &'a T) -> Option<&'a str> {
        (self.get)(record)
    }

    pub fn set(&self, record: &mut T, key: String) {
        (self.set)(record, key)
    }
}

impl<T> fmt::Debug for KeyAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAccessor")
            .field("property", &self.property)
            .field("field", &self.field)
            .finish()
    }
}

/// Read access to a record's parent identifier.
pub struct ParentAccessor<T> {
    property: &'static str,
    field: &'static str,
    get: fn(&T) -> Option<&str>,
}

impl<T> ParentAccessor<T> {
    pub fn property(&self) -> &'static str {
        self.property
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    /// `None` for roots.
    pub fn get<'a>(&self, record: &'a T) -> Option<&'a str> {
        (self.get)(record)
    }
}

impl<T> fmt::Debug for ParentAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentAccessor")
            .field("property", &self.property)
            .field("field", &self.field)
            .finish()
    }
}

/// A local-key or foreign-key declaration on one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipField {
    pub property: String,
    /// Document field the joined records are attached under.
    pub document_field: String,
    /// Linking field: on this type for local keys, on the related type for foreign keys.
    pub link: String,
    pub related: RelatedType,
}
