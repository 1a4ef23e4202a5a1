//! In-memory database handles.

use std::{collections::HashMap, sync::Arc};

use bson::{Bson, Document, doc};
use parking_lot::Mutex;
use tracing::debug;

use docmock_core::{
    command::Command,
    error::{StoreError, StoreResult},
    options::{CollectionOptions, DatabaseOptions},
    store::{HandleKey, StoreCollection, StoreDatabase},
};

use crate::{collection::MemoryCollection, store::MemoryStore};

#[derive(Clone, Debug)]
pub struct MemoryDatabase {
    inner: Arc<DatabaseInner>,
}

#[derive(Debug)]
struct DatabaseInner {
    key: HandleKey,
    name: String,
    store: MemoryStore,
    options: DatabaseOptions,
    /// Collection handles obtained with default options, by name.
    collections: Mutex<HashMap<String, Arc<dyn StoreCollection>>>,
}

pub(crate) fn validate_collection_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.contains('$') || name.starts_with('.') || name.ends_with('.') {
        return Err(StoreError::InvalidName(format!("invalid collection name '{name}'")));
    }
    Ok(())
}

pub(crate) fn validate_database_name(name: &str) -> StoreResult<()> {
    const FORBIDDEN: &[char] = &['/', '\\', '.', ' ', '"', '$'];

    if name.is_empty() || name.contains(FORBIDDEN) {
        return Err(StoreError::InvalidName(format!("invalid database name '{name}'")));
    }
    Ok(())
}

impl MemoryDatabase {
    pub(crate) fn new(store: MemoryStore, client_key: &HandleKey, name: &str, options: DatabaseOptions) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                key: client_key.database(name),
                name: name.to_string(),
                store,
                options,
                collections: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.inner.options
    }

    fn inherited_options(&self) -> CollectionOptions {
        CollectionOptions {
            read_preference: self.inner.options.read_preference,
            write_concern: self.inner.options.write_concern.clone(),
            read_concern: self.inner.options.read_concern.clone(),
        }
    }

    fn collection_from_command(&self, command: &Command) -> StoreResult<String> {
        match command.argument() {
            Bson::String(name) => Ok(name),
            other => Err(StoreError::OperationFailure(format!(
                "collection name must be a string, got {other}"
            ))),
        }
    }

    fn count_command(&self, command: &Command) -> StoreResult<Document> {
        let name = self.collection_from_command(command)?;
        let filter = match command.to_document().get("query") {
            Some(Bson::Document(filter)) => filter.clone(),
            _ => Document::new(),
        };

        let n = self.get_collection(&name, None)?.count_documents(filter)?;
        Ok(doc! { "n": n as i64, "ok": 1.0 })
    }

    fn list_collections_command(&self) -> StoreResult<Document> {
        let batch = self
            .list_collection_names()?
            .into_iter()
            .map(|name| Bson::Document(doc! { "name": name, "type": "collection" }))
            .collect::<Vec<_>>();

        Ok(doc! {
            "cursor": {
                "id": 0_i64,
                "ns": format!("{}.$cmd.listCollections", self.inner.name),
                "firstBatch": batch,
            },
            "ok": 1.0,
        })
    }

    fn db_stats_command(&self) -> StoreResult<Document> {
        let names = self.list_collection_names()?;
        let objects = names
            .iter()
            .filter_map(|name| self.inner.store.collection(&self.inner.name, name))
            .map(|data| data.len() as i64)
            .sum::<i64>();

        Ok(doc! {
            "db": self.inner.name.clone(),
            "collections": names.len() as i64,
            "objects": objects,
            "ok": 1.0,
        })
    }
}

impl StoreDatabase for MemoryDatabase {
    fn key(&self) -> HandleKey {
        self.inner.key.clone()
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn get_collection(&self, name: &str, options: Option<CollectionOptions>) -> StoreResult<Arc<dyn StoreCollection>> {
        validate_collection_name(name)?;

        let options = options.filter(|options| !options.is_default());

        if let Some(options) = options {
            debug!(database = %self.inner.name, collection = %name, "created collection handle with custom options");
            return Ok(Arc::new(MemoryCollection::new(
                self.inner.store.clone(),
                &self.inner.key,
                name,
                options,
            )));
        }

        let mut collections = self.inner.collections.lock();
        let collection = collections.entry(name.to_string()).or_insert_with(|| {
            Arc::new(MemoryCollection::new(
                self.inner.store.clone(),
                &self.inner.key,
                name,
                self.inherited_options(),
            ))
        });

        Ok(collection.clone())
    }

    fn list_collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.inner.store.collection_names(&self.inner.name))
    }

    fn create_collection(&self, name: &str) -> StoreResult<Arc<dyn StoreCollection>> {
        validate_collection_name(name)?;
        self.inner.store.create_collection(&self.inner.name, name)?;
        self.get_collection(name, None)
    }

    fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.inner.store.drop_collection(&self.inner.name, name);
        Ok(())
    }

    fn command(&self, command: &Command) -> StoreResult<Document> {
        let Some(name) = command.name() else {
            return Err(StoreError::operation_failure("empty command document"));
        };

        match name.to_ascii_lowercase().as_str() {
            "ping" => Ok(doc! { "ok": 1.0 }),
            "count" => self.count_command(command),
            "create" => {
                let collection = self.collection_from_command(command)?;
                self.create_collection(&collection)?;
                Ok(doc! { "ok": 1.0 })
            }
            "drop" => {
                let collection = self.collection_from_command(command)?;
                self.drop_collection(&collection)?;
                Ok(doc! { "ns": format!("{}.{}", self.inner.name, collection), "ok": 1.0 })
            }
            "dbstats" => self.db_stats_command(),
            "listcollections" => self.list_collections_command(),
            _ => Err(StoreError::not_implemented(format!(
                "command '{name}' is not simulated"
            ))),
        }
    }

    fn attribute(&self, name: &str) -> Option<Bson> {
        match name {
            "name" => Some(Bson::String(self.inner.name.clone())),
            "read_preference" => Some(Bson::String(
                self.inner
                    .options
                    .read_preference
                    .map(|preference| preference.as_str())
                    .unwrap_or("primary")
                    .to_string(),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmock_core::options::ReadPreference;
    use pretty_assertions::assert_eq;

    fn database() -> MemoryDatabase {
        let key = HandleKey::client("localhost:27017");
        MemoryDatabase::new(MemoryStore::new(), &key, "tests", DatabaseOptions::default())
    }

    #[test]
    fn test_default_collection_handles_are_cached() {
        let database = database();
        let first = database.get_collection("test", None).unwrap();
        let second = database.get_collection("test", Some(CollectionOptions::default())).unwrap();
        let custom = database
            .get_collection(
                "test",
                Some(CollectionOptions {
                    read_preference: Some(ReadPreference::Secondary),
                    ..Default::default()
                }),
            )
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &custom));
        assert_eq!(first.key(), custom.key());
    }

    #[test]
    fn test_invalid_collection_names() {
        let database = database();
        for name in ["", "a$b", ".a", "a."] {
            assert!(matches!(database.get_collection(name, None), Err(StoreError::InvalidName(_))));
        }
    }

    #[test]
    fn test_commands() {
        let database = database();
        database.get_collection("c", None).unwrap().insert_one(doc! { "a": 1 }).unwrap();

        assert_eq!(database.command(&"ping".into()).unwrap(), doc! { "ok": 1.0 });
        assert_eq!(
            database.command(&doc! { "count": "c" }.into()).unwrap(),
            doc! { "n": 1_i64, "ok": 1.0 }
        );
        assert!(database.command(&"buildinfo".into()).unwrap_err().is_not_implemented());
        assert!(database.command(&"unknown_cmd".into()).unwrap_err().is_not_implemented());
    }

    #[test]
    fn test_create_and_drop_collection() {
        let database = database();
        database.create_collection("a").unwrap();
        assert!(database.create_collection("a").is_err());
        assert_eq!(database.list_collection_names().unwrap(), vec!["a".to_string()]);

        database.drop_collection("a").unwrap();
        assert!(database.list_collection_names().unwrap().is_empty());
    }
}
