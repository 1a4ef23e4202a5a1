use std::panic;

use bson::{Binary, Bson, doc, spec::BinarySubtype};
use futures::io::{AsyncReadExt, Cursor};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use docmock_async::{
    AsyncMockClient, FacadeError,
    gridfs::{
        GridFsBucket, GridFsBucketOptions, current_bindings, enabled_gridfs_integration,
        with_gridfs_integration,
    },
};
use docmock_core::options::{IndexModel, IndexOptions};

// The bindings slot is process-wide.
static SERIAL: Mutex<()> = parking_lot::const_mutex(());

#[tokio::test]
async fn test_round_trip() {
    let _serial = SERIAL.lock();
    let _integration = enabled_gridfs_integration();

    let database = AsyncMockClient::new().database("db").unwrap();
    let bucket = GridFsBucket::new(&database).unwrap();

    let id = bucket
        .upload_from_stream("file.txt", Cursor::new(b"sup".to_vec()), None)
        .await
        .unwrap();

    let mut buffer = Vec::new();
    bucket.download_to_stream(&id, &mut buffer).await.unwrap();
    assert_eq!(buffer, b"sup".to_vec());

    assert_eq!(
        database.list_collection_names().await.unwrap(),
        vec!["fs.chunks", "fs.files"]
    );
}

#[tokio::test]
async fn test_multiple_chunks_and_listing() {
    let _serial = SERIAL.lock();
    let _integration = enabled_gridfs_integration();

    let database = AsyncMockClient::new().database("db").unwrap();
    let bucket = GridFsBucket::with_options(
        &database,
        GridFsBucketOptions {
            bucket_name: "images".into(),
            chunk_size_bytes: 4,
        },
    )
    .unwrap();

    let contents = b"0123456789".to_vec();
    let id = bucket
        .upload_from_stream(
            "digits.bin",
            Cursor::new(contents.clone()),
            Some(doc! { "kind": "digits" }),
        )
        .await
        .unwrap();

    assert_eq!(bucket.chunks().count_documents(doc! {}).await.unwrap(), 3);

    let mut stream = bucket.open_download_stream(&id).await.unwrap();
    assert_eq!(stream.filename(), Some("digits.bin"));
    assert_eq!(stream.length(), 10);

    let mut read = Vec::new();
    stream.read_to_end(&mut read).await.unwrap();
    assert_eq!(read, contents);

    let files = bucket
        .find(doc! { "metadata.kind": "digits" })
        .unwrap()
        .to_list(None)
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].get_i64("length").unwrap(), 10);
    assert_eq!(files[0].get_i32("chunkSize").unwrap(), 4);
}

#[tokio::test]
async fn test_empty_file() {
    let _serial = SERIAL.lock();
    let _integration = enabled_gridfs_integration();

    let bucket = GridFsBucket::new(&AsyncMockClient::new().database("db").unwrap()).unwrap();
    let id = bucket
        .upload_from_stream("empty", Cursor::new(Vec::new()), None)
        .await
        .unwrap();

    let mut buffer = Vec::new();
    bucket.download_to_stream(&id, &mut buffer).await.unwrap();
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn test_delete() {
    let _serial = SERIAL.lock();
    let _integration = enabled_gridfs_integration();

    let bucket = GridFsBucket::new(&AsyncMockClient::new().database("db").unwrap()).unwrap();
    let id = bucket
        .upload_from_stream("gone.txt", Cursor::new(b"bye".to_vec()), None)
        .await
        .unwrap();

    bucket.delete(&id).await.unwrap();
    assert_eq!(bucket.chunks().count_documents(doc! {}).await.unwrap(), 0);

    let err = bucket.open_download_stream(&id).await.unwrap_err();
    assert!(matches!(err, FacadeError::FileNotFound(_)));
    assert!(matches!(
        bucket.delete(&id).await.unwrap_err(),
        FacadeError::FileNotFound(_)
    ));
}

#[tokio::test]
async fn test_inconsistent_file_documents_are_rejected() {
    let _serial = SERIAL.lock();
    let _integration = enabled_gridfs_integration();

    let bucket = GridFsBucket::new(&AsyncMockClient::new().database("db").unwrap()).unwrap();
    bucket
        .files()
        .insert_many(vec![
            doc! { "_id": 1, "length": 1_i64 << 46, "chunkSize": 1 },
            doc! { "_id": 2, "length": 1_i64 << 46, "chunkSize": 1_i64 << 46 },
        ])
        .await
        .unwrap();
    bucket
        .chunks()
        .insert_one(doc! {
            "files_id": 2,
            "n": 0,
            "data": Binary { subtype: BinarySubtype::Generic, bytes: b"abc".to_vec() },
        })
        .await
        .unwrap();

    for id in [1, 2] {
        let err = bucket.open_download_stream(&Bson::Int32(id)).await.unwrap_err();
        assert!(matches!(err, FacadeError::GridFs(_)), "{err:?}");
    }
}

#[test]
fn test_oversized_chunk_size_is_rejected() {
    let _serial = SERIAL.lock();
    let _integration = enabled_gridfs_integration();

    let database = AsyncMockClient::new().database("db").unwrap();
    let options = GridFsBucketOptions {
        chunk_size_bytes: i32::MAX as usize + 1,
        ..Default::default()
    };
    assert!(matches!(
        GridFsBucket::with_options(&database, options),
        Err(FacadeError::GridFs(_))
    ));
}

#[tokio::test]
async fn test_rejected_file_leaves_no_chunks() {
    let _serial = SERIAL.lock();
    let _integration = enabled_gridfs_integration();

    let bucket = GridFsBucket::new(&AsyncMockClient::new().database("db").unwrap()).unwrap();
    bucket
        .files()
        .create_index(IndexModel::with_options(
            doc! { "filename": 1 },
            IndexOptions {
                unique: Some(true),
                ..Default::default()
            },
        ))
        .await
        .unwrap();

    bucket
        .upload_from_stream("same.txt", Cursor::new(b"first".to_vec()), None)
        .await
        .unwrap();
    let err = bucket
        .upload_from_stream("same.txt", Cursor::new(b"second".to_vec()), None)
        .await
        .unwrap_err();

    assert!(err.is_duplicate_key());
    assert_eq!(bucket.files().count_documents(doc! {}).await.unwrap(), 1);
    assert_eq!(bucket.chunks().count_documents(doc! {}).await.unwrap(), 1);
}

#[cfg(not(feature = "mongodb"))]
#[test]
fn test_driver_bindings_reject_facades() {
    let _serial = SERIAL.lock();
    assert_eq!(current_bindings().name, "driver");

    let database = AsyncMockClient::new().database("db").unwrap();
    assert!(matches!(GridFsBucket::new(&database), Err(FacadeError::GridFs(_))));

    let accepted = with_gridfs_integration(|| GridFsBucket::new(&database).is_ok());
    assert!(accepted);
    assert_eq!(current_bindings().name, "driver");
}

#[test]
fn test_bindings_restored_after_panic() {
    let _serial = SERIAL.lock();
    let before = current_bindings().name;

    let outcome = panic::catch_unwind(|| {
        with_gridfs_integration(|| {
            assert_eq!(current_bindings().name, "integration");
            panic!("failure inside the integration scope");
        })
    });

    assert!(outcome.is_err());
    assert_eq!(current_bindings().name, before);
}

#[test]
fn test_bindings_restored_when_guard_drops() {
    let _serial = SERIAL.lock();
    let before = current_bindings().name;

    {
        let _outer = enabled_gridfs_integration();
        {
            let _inner = enabled_gridfs_integration();
            assert_eq!(current_bindings().name, "integration");
        }
        assert_eq!(current_bindings().name, "integration");
    }

    assert_eq!(current_bindings().name, before);
}
