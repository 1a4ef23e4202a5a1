//! Async client facade.

use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

use bson::Document;
use tokio::runtime::Handle;
use tracing::debug;

use docmock_core::{
    options::DatabaseOptions,
    store::StoreClient,
};
use docmock_memory::{MemoryClient, MemoryClientBuilder};

use crate::{
    bridge::async_bridged,
    build_info::BuildInfo,
    database::AsyncMockDatabase,
    error::FacadeResult,
    masquerade::{Masquerade, targets},
    node::{ClientContext, LoopBinding, Member},
};

/// Async facade over a Store client.
///
/// Entry point of the facade hierarchy. Databases obtained from a client inherit its
/// [`BuildInfo`] and loop binding.
///
/// # Example
///
/// ```ignore
/// use docmock_async::AsyncMockClient;
/// use bson::doc;
///
/// let client = AsyncMockClient::new();
/// let users = client.database("app")?.collection("users")?;
/// users.insert_one(doc! { "name": "Alice" }).await?;
///
/// let mut cursor = users.find(doc! {}, None);
/// let documents = cursor.limit(10).to_list(None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct AsyncMockClient {
    delegate: Arc<dyn StoreClient>,
    context: Arc<ClientContext>,
}

impl Default for AsyncMockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncMockClient {
    /// A client over fresh in-memory storage at the default address.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> AsyncMockClientBuilder {
        AsyncMockClientBuilder::default()
    }

    /// The wrapped Store client.
    pub fn delegate(&self) -> &Arc<dyn StoreClient> {
        &self.delegate
    }

    /// `host:port` of the simulated server.
    pub fn address(&self) -> String {
        self.delegate.key().address
    }

    pub fn database(&self, name: &str) -> FacadeResult<AsyncMockDatabase> {
        self.get_database(name, None)
    }

    pub fn get_database(&self, name: &str, options: Option<DatabaseOptions>) -> FacadeResult<AsyncMockDatabase> {
        let delegate = self.delegate.get_database(name, options)?;
        Ok(AsyncMockDatabase::new(delegate, self.context.clone()))
    }

    /// Resolves `name` to a handle attribute or, failing that, a database.
    pub fn resolve(&self, name: &str) -> FacadeResult<Member<AsyncMockDatabase>> {
        match self.delegate.attribute(name) {
            Some(value) => Ok(Member::Attribute(value)),
            None => Ok(Member::Child(self.database(name)?)),
        }
    }

    /// The build information reported for `buildinfo` commands.
    pub async fn server_info(&self) -> FacadeResult<Document> {
        self.context.build_info.to_document()
    }

    pub async fn close(&self) -> FacadeResult<()> {
        self.delegate.close();
        Ok(())
    }

    pub fn build_info(&self) -> &BuildInfo {
        &self.context.build_info
    }

    /// The runtime this client is bound to.
    pub fn io_loop(&self) -> FacadeResult<Handle> {
        self.context.loop_binding.resolve()
    }
}

async_bridged! {
    AsyncMockClient => delegate as StoreClient, table ASYNC_METHODS;
    "list_database_names" => fn list_database_names() -> Vec<String>;
    "drop_database" => fn drop_database(name: &str) -> ();
}

impl Masquerade for AsyncMockClient {
    const TARGET: &'static str = targets::CLIENT;
}

impl PartialEq for AsyncMockClient {
    fn eq(&self, other: &Self) -> bool {
        self.delegate.key() == other.delegate.key()
    }
}

impl Eq for AsyncMockClient {}

impl Hash for AsyncMockClient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.delegate.key().hash(state);
    }
}

/// Builder for [`AsyncMockClient`].
///
/// Without [`store_client`](Self::store_client) the client gets a fresh
/// [`MemoryClient`] for the configured host and port.
#[derive(Debug, Default)]
pub struct AsyncMockClientBuilder {
    store_client: Option<Arc<dyn StoreClient>>,
    memory: MemoryClientBuilder,
    build_info: Option<BuildInfo>,
    loop_binding: LoopBinding,
}

impl AsyncMockClientBuilder {
    /// Wraps an existing Store client. Host and port settings are then ignored.
    pub fn store_client(mut self, client: Arc<dyn StoreClient>) -> Self {
        self.store_client = Some(client);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.memory = self.memory.host(host);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.memory = self.memory.port(port);
        self
    }

    pub fn build_info(mut self, build_info: BuildInfo) -> Self {
        self.build_info = Some(build_info);
        self
    }

    /// Binds the client to `handle` instead of the runtime current at call time.
    pub fn io_loop(mut self, handle: Handle) -> Self {
        self.loop_binding = LoopBinding::Explicit(handle);
        self
    }

    pub fn build(self) -> AsyncMockClient {
        let delegate = self
            .store_client
            .unwrap_or_else(|| Arc::new(self.memory.build()) as Arc<dyn StoreClient>);

        let context = ClientContext {
            build_info: self.build_info.unwrap_or_default(),
            loop_binding: self.loop_binding,
        };

        debug!(
            address = %delegate.key().address,
            version = %context.build_info.version,
            "created async mock client"
        );

        AsyncMockClient {
            delegate,
            context: Arc::new(context),
        }
    }
}

impl From<MemoryClient> for AsyncMockClient {
    fn from(client: MemoryClient) -> Self {
        AsyncMockClient::builder().store_client(Arc::new(client)).build()
    }
}
