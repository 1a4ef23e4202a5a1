use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
};

use bson::{Bson, doc};
use pretty_assertions::assert_eq;

use docmock_async::{
    AsyncMockClient, AsyncMockCollection, AsyncMockDatabase, BuildInfo, FacadeError,
    patches::is_adapted,
};
use docmock_core::{
    options::{CollectionOptions, ReadPreference},
    store::StoreClient,
};
use docmock_memory::MemoryClient;

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn test_hashing_is_stable() {
    assert_eq!(hash_of(&AsyncMockClient::new()), hash_of(&AsyncMockClient::new()));
    assert_eq!(AsyncMockClient::new(), AsyncMockClient::new());

    let elsewhere = AsyncMockClient::builder().host("not.localhost").build();
    assert_ne!(hash_of(&AsyncMockClient::new()), hash_of(&elsewhere));

    let database = |name: &str| AsyncMockClient::new().database(name).unwrap();
    assert_eq!(hash_of(&database("database1")), hash_of(&database("database1")));
    assert_ne!(hash_of(&database("database1")), hash_of(&database("database2")));

    let collection = |name: &str| database("database1").collection(name).unwrap();
    assert_eq!(collection("a"), collection("a"));
    assert_ne!(hash_of(&collection("a")), hash_of(&collection("b")));
}

#[test]
fn test_facades_are_fresh_but_handles_are_shared() {
    let database = AsyncMockClient::new().database("test").unwrap();

    let first = database.collection("test").unwrap();
    let second = database.collection("test").unwrap();
    assert!(Arc::ptr_eq(first.delegate(), second.delegate()));
    assert_eq!(first.delegate().installed_hooks(), 1);

    let options = || {
        Some(CollectionOptions {
            read_preference: Some(ReadPreference::Primary),
            ..Default::default()
        })
    };
    let primary = database.get_collection("test", options()).unwrap();
    let again = database.get_collection("test", options()).unwrap();

    assert!(!Arc::ptr_eq(first.delegate(), primary.delegate()));
    assert!(!Arc::ptr_eq(primary.delegate(), again.delegate()));
    for collection in [&first, &primary, &again] {
        assert!(is_adapted(collection.delegate()));
        assert_eq!(collection.delegate().installed_hooks(), 1);
    }

    let third = database.collection("test").unwrap();
    assert!(Arc::ptr_eq(first.delegate(), third.delegate()));
    assert_eq!(third.delegate().installed_hooks(), 1);
    assert_eq!(first, primary);
}

#[tokio::test]
async fn test_buildinfo_is_answered() {
    let database = AsyncMockClient::new().database("admin").unwrap();
    let expected = doc! { "ok": 1.0, "version": "5.0.5", "versionArray": [5, 0, 5, 0] };

    assert_eq!(database.command("buildinfo").await.unwrap(), expected);
    assert_eq!(database.command(doc! { "buildInfo": 1 }).await.unwrap(), expected);
    assert_eq!(database.command("BUILDINFO").await.unwrap(), expected);
}

#[tokio::test]
async fn test_other_commands_pass_through() {
    let database = AsyncMockClient::new().database("admin").unwrap();

    assert_eq!(database.command("ping").await.unwrap(), doc! { "ok": 1.0 });

    let err = database.command("unknown_cmd").await.unwrap_err();
    assert!(err.is_not_implemented());
}

#[tokio::test]
async fn test_configured_build_info() {
    let client = AsyncMockClient::builder()
        .build_info(BuildInfo::new("6.0.1"))
        .build();

    let info = client.database("admin").unwrap().command("buildinfo").await.unwrap();
    assert_eq!(info.get_str("version").unwrap(), "6.0.1");
    assert_eq!(client.server_info().await.unwrap(), info);
}

#[tokio::test]
async fn test_list_names() {
    let client = AsyncMockClient::new();

    client
        .database("tests-1")
        .unwrap()
        .collection("test-1")
        .unwrap()
        .insert_one(doc! { "a": 1 })
        .await
        .unwrap();
    let second = client.database("tests-2").unwrap();
    second.collection("test-2").unwrap().insert_one(doc! { "a": 2 }).await.unwrap();
    second.collection("test-2-copy").unwrap().insert_one(doc! { "a": 2 }).await.unwrap();

    assert_eq!(client.list_database_names().await.unwrap(), vec!["tests-1", "tests-2"]);
    assert_eq!(
        client.database("tests-1").unwrap().list_collection_names().await.unwrap(),
        vec!["test-1"]
    );
    assert_eq!(second.list_collection_names().await.unwrap(), vec!["test-2", "test-2-copy"]);

    second.drop_collection("test-2").await.unwrap();
    client.drop_database("tests-1").await.unwrap();
    assert_eq!(client.list_database_names().await.unwrap(), vec!["tests-2"]);
    assert_eq!(second.list_collection_names().await.unwrap(), vec!["test-2-copy"]);
}

#[tokio::test]
async fn test_create_collection() {
    let database = AsyncMockClient::new().database("tests").unwrap();

    let collection: AsyncMockCollection = database.create_collection("created").await.unwrap();
    assert_eq!(collection.name(), "created");
    assert_eq!(database.list_collection_names().await.unwrap(), vec!["created"]);
    assert!(database.create_collection("created").await.is_err());
}

#[tokio::test]
async fn test_shared_store_client() {
    let store: Arc<dyn StoreClient> = Arc::new(MemoryClient::new());
    let writer = AsyncMockClient::builder().store_client(store.clone()).build();
    let reader = AsyncMockClient::builder().store_client(store).build();

    writer
        .database("shared")
        .unwrap()
        .collection("items")
        .unwrap()
        .insert_one(doc! { "n": 1 })
        .await
        .unwrap();

    let count = reader
        .database("shared")
        .unwrap()
        .collection("items")
        .unwrap()
        .count_documents(doc! {})
        .await
        .unwrap();
    assert_eq!(count, 1);

    let separate = AsyncMockClient::new();
    assert!(separate.list_database_names().await.unwrap().is_empty());
}

#[test]
fn test_resolution_falls_back_to_children() {
    let client = AsyncMockClient::builder().host("db.local").port(27018).build();

    let address = client.resolve("address").unwrap();
    assert_eq!(address.attribute(), Some(&Bson::String("db.local:27018".into())));
    assert_eq!(client.address(), "db.local:27018");

    let database: AsyncMockDatabase = client.resolve("records").unwrap().into_child().unwrap();
    assert_eq!(database.name(), "records");
    assert_eq!(
        database.resolve("name").unwrap().attribute(),
        Some(&Bson::String("records".into()))
    );

    let collection = database.resolve("entries").unwrap().into_child().unwrap();
    assert_eq!(collection.full_name(), "records.entries");
}

#[test]
fn test_invalid_names_are_rejected() {
    let client = AsyncMockClient::new();

    assert!(matches!(client.database("bad.name"), Err(FacadeError::Store(_))));
    let database = client.database("good").unwrap();
    assert!(database.collection("bad$name").is_err());
}

#[test]
fn test_io_loop_without_runtime() {
    let client = AsyncMockClient::new();
    assert!(matches!(client.io_loop(), Err(FacadeError::NoRuntime(_))));
}

#[test]
fn test_io_loop_explicit_binding() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let client = AsyncMockClient::builder().io_loop(runtime.handle().clone()).build();

    let collection = client.database("tests").unwrap().collection("test").unwrap();
    let handle = collection.io_loop().unwrap();

    let inserted = handle.block_on(collection.insert_one(doc! { "a": 1 })).unwrap();
    assert!(matches!(inserted.inserted_id, Bson::ObjectId(_)));
}

#[tokio::test]
async fn test_io_loop_ambient_runtime() {
    let database = AsyncMockClient::new().database("tests").unwrap();
    assert!(database.io_loop().is_ok());
}

#[tokio::test]
async fn test_close_is_harmless() {
    let client = AsyncMockClient::new();
    client.close().await.unwrap();
    client.close().await.unwrap();
}
