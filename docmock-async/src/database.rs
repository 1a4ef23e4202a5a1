//! Async database facade.

use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

use bson::Document;
use tokio::runtime::Handle;
use tracing::debug;

use docmock_core::{
    command::Command,
    options::CollectionOptions,
    store::{HandleKey, StoreDatabase},
};

use crate::{
    bridge::{async_bridged, bridge_async},
    build_info::BuildInfo,
    collection::AsyncMockCollection,
    error::FacadeResult,
    masquerade::{Masquerade, targets},
    node::{ClientContext, Member},
};

/// Async facade over a Store database handle.
///
/// Collection facades are never cached: every lookup wraps a freshly obtained Store
/// handle, relying on the Store to hand back its cached handle for default options.
#[derive(Debug, Clone)]
pub struct AsyncMockDatabase {
    delegate: Arc<dyn StoreDatabase>,
    context: Arc<ClientContext>,
}

impl AsyncMockDatabase {
    pub(crate) fn new(delegate: Arc<dyn StoreDatabase>, context: Arc<ClientContext>) -> Self {
        Self { delegate, context }
    }

    /// The wrapped Store handle.
    pub fn delegate(&self) -> &Arc<dyn StoreDatabase> {
        &self.delegate
    }

    pub fn name(&self) -> &str {
        self.delegate.name()
    }

    /// The collection `name`, with default options.
    pub fn collection(&self, name: &str) -> FacadeResult<AsyncMockCollection> {
        self.get_collection(name, None)
    }

    pub fn get_collection(&self, name: &str, options: Option<CollectionOptions>) -> FacadeResult<AsyncMockCollection> {
        AsyncMockCollection::open(&self.delegate, name, options, &self.context)
    }

    /// Resolves `name` to a handle attribute or, failing that, a collection.
    pub fn resolve(&self, name: &str) -> FacadeResult<Member<AsyncMockCollection>> {
        match self.delegate.attribute(name) {
            Some(value) => Ok(Member::Attribute(value)),
            None => Ok(Member::Child(self.collection(name)?)),
        }
    }

    /// Creates the collection and returns its facade.
    pub async fn create_collection(&self, name: &str) -> FacadeResult<AsyncMockCollection> {
        let delegate = &self.delegate;
        bridge_async(|| delegate.create_collection(name)).await?;
        self.collection(name)
    }

    /// Runs a database command.
    ///
    /// The Store does not simulate `buildinfo`; that command alone, given by name or as the
    /// first key of a command document in any letter case, is answered with the client's
    /// [`BuildInfo`]. Every other failure is passed through.
    pub async fn command(&self, command: impl Into<Command>) -> FacadeResult<Document> {
        let command = command.into();
        let delegate = &self.delegate;

        match bridge_async(|| delegate.command(&command)).await {
            Err(err) if err.is_not_implemented() && command.is("buildinfo") => {
                debug!(database = %self.name(), "answered buildinfo with the configured record");
                self.context.build_info.to_document()
            }
            result => result,
        }
    }

    pub fn build_info(&self) -> &BuildInfo {
        &self.context.build_info
    }

    /// The runtime this database's client is bound to.
    pub fn io_loop(&self) -> FacadeResult<Handle> {
        self.context.loop_binding.resolve()
    }

    fn key(&self) -> HandleKey {
        self.delegate.key()
    }
}

async_bridged! {
    AsyncMockDatabase => delegate as StoreDatabase, table ASYNC_METHODS;
    "list_collection_names" => fn list_collection_names() -> Vec<String>;
    "drop_collection" => fn drop_collection(name: &str) -> ();
}

impl Masquerade for AsyncMockDatabase {
    const TARGET: &'static str = targets::DATABASE;
}

impl PartialEq for AsyncMockDatabase {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AsyncMockDatabase {}

impl Hash for AsyncMockDatabase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
