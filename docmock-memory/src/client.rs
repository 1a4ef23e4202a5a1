//! In-memory client handles.

use std::{collections::HashMap, sync::Arc};

use bson::Bson;
use parking_lot::Mutex;
use tracing::debug;

use docmock_core::{
    error::StoreResult,
    options::DatabaseOptions,
    store::{HandleKey, StoreClient, StoreDatabase},
};

use crate::{
    database::{MemoryDatabase, validate_database_name},
    store::MemoryStore,
};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;

/// A simulated server connection.
///
/// Every client built with [`MemoryClient::new`] or the builder owns fresh storage;
/// clones share it. Two clients for the same address compare equal through their
/// [`HandleKey`] even though their data is separate.
///
/// # Example
///
/// ```ignore
/// use docmock_memory::MemoryClient;
/// use docmock_core::store::StoreClient;
/// use bson::doc;
///
/// let client = MemoryClient::builder().host("db.local").port(27018).build();
/// let collection = client.get_database("app", None)?.get_collection("users", None)?;
/// collection.insert_one(doc! { "name": "Alice" })?;
/// ```
#[derive(Clone, Debug)]
pub struct MemoryClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    host: String,
    port: u16,
    key: HandleKey,
    store: MemoryStore,
    databases: Mutex<HashMap<String, Arc<dyn StoreDatabase>>>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    /// A client for the default address with empty storage.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MemoryClientBuilder {
        MemoryClientBuilder::default()
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.inner.host, self.inner.port)
    }

    /// The storage backing this client.
    pub fn store(&self) -> &MemoryStore {
        &self.inner.store
    }
}

impl StoreClient for MemoryClient {
    fn key(&self) -> HandleKey {
        self.inner.key.clone()
    }

    fn get_database(&self, name: &str, options: Option<DatabaseOptions>) -> StoreResult<Arc<dyn StoreDatabase>> {
        validate_database_name(name)?;

        if let Some(options) = options.filter(|options| !options.is_default()) {
            return Ok(Arc::new(MemoryDatabase::new(
                self.inner.store.clone(),
                &self.inner.key,
                name,
                options,
            )));
        }

        let mut databases = self.inner.databases.lock();
        let database = databases.entry(name.to_string()).or_insert_with(|| {
            Arc::new(MemoryDatabase::new(
                self.inner.store.clone(),
                &self.inner.key,
                name,
                DatabaseOptions::default(),
            ))
        });

        Ok(database.clone())
    }

    fn list_database_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.inner.store.database_names())
    }

    fn drop_database(&self, name: &str) -> StoreResult<()> {
        debug!(address = %self.address(), database = %name, "dropping database");
        self.inner.store.drop_database(name);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Bson> {
        match name {
            "address" => Some(Bson::String(self.address())),
            "host" => Some(Bson::String(self.inner.host.clone())),
            "port" => Some(Bson::Int32(self.inner.port as i32)),
            _ => None,
        }
    }
}

/// Builder for [`MemoryClient`].
#[derive(Debug, Clone)]
pub struct MemoryClientBuilder {
    host: String,
    port: u16,
    store: Option<MemoryStore>,
}

impl Default for MemoryClientBuilder {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            store: None,
        }
    }
}

impl MemoryClientBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Shares existing storage instead of starting empty.
    pub fn store(mut self, store: MemoryStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> MemoryClient {
        let key = HandleKey::client(format!("{}:{}", self.host, self.port));
        debug!(address = %key.address, "created in-memory client");

        MemoryClient {
            inner: Arc::new(ClientInner {
                host: self.host,
                port: self.port,
                key,
                store: self.store.unwrap_or_default(),
                databases: Mutex::new(HashMap::new()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_clients_share_key_but_not_data() {
        let first = MemoryClient::new();
        let second = MemoryClient::new();
        assert_eq!(first.key(), second.key());

        first
            .get_database("db", None)
            .unwrap()
            .get_collection("c", None)
            .unwrap()
            .insert_one(doc! { "a": 1 })
            .unwrap();

        assert_eq!(first.list_database_names().unwrap(), vec!["db".to_string()]);
        assert!(second.list_database_names().unwrap().is_empty());
    }

    #[test]
    fn test_explicit_address() {
        let client = MemoryClient::builder().host("example.com").port(27018).build();
        assert_eq!(client.attribute("address"), Some(Bson::from("example.com:27018")));
        assert_ne!(client.key(), MemoryClient::new().key());
    }

    #[test]
    fn test_database_names_are_validated() {
        let client = MemoryClient::new();
        assert!(client.get_database("a.b", None).is_err());
        assert!(client.get_database("", None).is_err());
    }

    #[test]
    fn test_drop_database() {
        let client = MemoryClient::new();
        let database = client.get_database("db", None).unwrap();
        database.create_collection("c").unwrap();

        client.drop_database("db").unwrap();
        assert!(database.list_collection_names().unwrap().is_empty());
    }
}
