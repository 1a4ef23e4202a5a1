use bson::doc;

use docmock_async::{
    AsyncCommandCursor, AsyncMockClient, Masquerade,
    bridge::declares,
    masquerade::{register_driver_type, resolve, targets},
    AsyncMockCollection, AsyncMockDatabase,
};

struct DriverCommandCursor;

#[test]
fn test_unknown_driver_types_do_not_masquerade() {
    assert!(resolve("mongodb::NoSuchType").is_none());
}

#[test]
fn test_registered_driver_type_is_reported() {
    let cursor = AsyncCommandCursor::new(vec![doc! { "a": 1 }]);
    assert!(resolve(targets::COMMAND_CURSOR).is_none());
    assert!(cursor.reported_type().is_none());
    assert!(!cursor.reports_as::<DriverCommandCursor>());

    register_driver_type::<DriverCommandCursor>(targets::COMMAND_CURSOR);

    let identity = cursor.reported_type().unwrap();
    assert_eq!(identity.name, "mongodb::CommandCursor");
    assert!(cursor.reports_as::<DriverCommandCursor>());
    assert!(cursor.reports_as_name("mongodb::CommandCursor"));
    assert!(!cursor.reports_as::<AsyncCommandCursor>());
}

#[cfg(feature = "mongodb")]
#[test]
fn test_driver_types_are_preregistered() {
    let client = AsyncMockClient::new();
    assert!(client.reports_as::<mongodb::Client>());

    let database = client.database("db").unwrap();
    assert!(database.reports_as::<mongodb::Database>());
}

#[test]
fn test_facade_targets() {
    assert_eq!(<AsyncMockClient as Masquerade>::TARGET, targets::CLIENT);
    assert_eq!(<AsyncMockDatabase as Masquerade>::TARGET, targets::DATABASE);
    assert_eq!(<AsyncMockCollection as Masquerade>::TARGET, targets::COLLECTION);
}

#[test]
fn test_bridged_method_tables() {
    assert_eq!(AsyncMockCollection::ASYNC_METHODS.len(), 22);
    for name in ["count_documents", "drop", "find_one", "map_reduce", "save", "update_one"] {
        assert!(declares(AsyncMockCollection::ASYNC_METHODS, name), "{name}");
    }
    assert!(!declares(AsyncMockCollection::ASYNC_METHODS, "find"));

    for name in ["bulk_write", "distinct", "drop_index", "drop_indexes"] {
        assert!(declares(AsyncMockCollection::EXTENDED_ASYNC_METHODS, name), "{name}");
    }

    assert!(declares(AsyncMockDatabase::ASYNC_METHODS, "list_collection_names"));
    assert!(declares(AsyncMockClient::ASYNC_METHODS, "drop_database"));
}
