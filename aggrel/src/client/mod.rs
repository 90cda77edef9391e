//! Typed entry points over a document store.
//!
//! This module provides:
//! - `Client` - owns the store and settings, hands out collection handles
//! - `Collection<T, S>` - typed handle for one record type's collection
//! - `Find<T, S>` - simple filtered reads used to pick a starting set
//! - `Aggregate<T, S>` - fluent pipeline handle (hierarchy, path, joins)
//!
//! # Example
//! ```ignore
//! let client = Client::new(MemoryStore::new("app"));
//! let groups = client.collection::<Group>()?;
//!
//! let roots = groups.aggregate().match_filter(json!({"parent_id": null}));
//! let tree = roots.get_hierarchy()?;
//! let paths = groups.aggregate().match_keys(["g42"])?.get_path()?;
//! ```

mod aggregate;
mod collection;

pub use aggregate::Aggregate;
pub use collection::{Collection, Find};

use std::sync::Arc;

use crate::{errors::ConfigurationError, metadata, settings::Settings, types::Record};

/// Main entry point.
///
/// Cheap to clone; clones share the store and the settings.
pub struct Client<S> {
    store: Arc<S>,
    settings: Arc<Settings>,
}

impl<S> Client<S> {
    /// Client with default settings.
    pub fn new(store: S) -> Self {
        Self::with_settings(store, Settings::default())
    }

    pub fn with_settings(store: S, settings: Settings) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(settings))
    }

    /// Client over a store that is also used elsewhere.
    pub fn from_shared(store: Arc<S>, settings: Arc<Settings>) -> Self {
        Self { store, settings }
    }

    /// Handle for the collection `T` is stored in.
    ///
    /// Resolves (and caches) `T`'s metadata, so a type with a missing
    /// collection or primary key declaration fails here.
    pub fn collection<T: Record>(&self) -> Result<Collection<T, S>, ConfigurationError> {
        let metadata = metadata::resolve::<T>()?;
        Ok(Collection::new(self.clone(), metadata))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl<S> Clone for Client<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
        }
    }
}
