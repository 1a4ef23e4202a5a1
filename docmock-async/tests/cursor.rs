use bson::{Document, doc};
use pretty_assertions::assert_eq;

use docmock_async::{
    AsyncCursor, AsyncMockClient, AsyncMockCollection, CursorFacade, CursorState, FacadeError,
};
use docmock_core::options::FindOptions;

async fn numbers(count: i32) -> AsyncMockCollection {
    let collection = AsyncMockClient::new()
        .database("tests")
        .unwrap()
        .collection("numbers")
        .unwrap();

    let documents = (0..count).map(|i| doc! { "i": i }).collect::<Vec<_>>();
    collection.insert_many(documents).await.unwrap();
    collection
}

fn without_id() -> Option<FindOptions> {
    Some(FindOptions {
        projection: Some(doc! { "_id": 0 }),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_chaining_methods_return_the_cursor() {
    let collection = numbers(3).await;
    let mut cursor = collection.find(doc! {}, None);
    let address: *const AsyncCursor = &cursor;

    assert!(std::ptr::eq(cursor.add_option(2), address));
    assert!(std::ptr::eq(cursor.remove_option(2), address));
    assert!(std::ptr::eq(cursor.allow_disk_use(true), address));
    assert!(std::ptr::eq(cursor.batch_size(10), address));
    assert!(std::ptr::eq(cursor.collation(doc! { "locale": "en" }), address));
    assert!(std::ptr::eq(cursor.comment("tagged".into()), address));
    assert!(std::ptr::eq(cursor.hint(doc! { "i": 1 }.into()), address));
    assert!(std::ptr::eq(cursor.limit(5), address));
    assert!(std::ptr::eq(cursor.max_await_time_ms(10), address));
    assert!(std::ptr::eq(cursor.max_scan(100), address));
    assert!(std::ptr::eq(cursor.max_time_ms(10), address));
    assert!(std::ptr::eq(cursor.max(doc! { "i": 10 }), address));
    assert!(std::ptr::eq(cursor.min(doc! { "i": 0 }), address));
    assert!(std::ptr::eq(cursor.skip(0), address));
    assert!(std::ptr::eq(cursor.sort(doc! { "i": 1 }), address));

    let names = AsyncCursor::CHAINING_METHODS
        .iter()
        .map(|spec| spec.name)
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "add_option",
            "allow_disk_use",
            "batch_size",
            "collation",
            "comment",
            "hint",
            "limit",
            "max_await_time_ms",
            "max_scan",
            "max_time_ms",
            "max",
            "min",
            "remove_option",
            "skip",
            "sort",
            "where",
        ]
    );
}

#[tokio::test]
async fn test_skip_limit_sort_projection() {
    let collection = numbers(10).await;

    let documents = collection
        .find(doc! {}, without_id())
        .skip(2)
        .limit(2)
        .sort(doc! { "i": -1 })
        .to_list(None)
        .await
        .unwrap();

    assert_eq!(documents, vec![doc! { "i": 7 }, doc! { "i": 6 }]);
}

#[tokio::test]
async fn test_skip_limit_bounds() {
    let collection = numbers(10).await;

    for (skip, limit) in [(0, 3), (8, 5), (10, 2), (12, 1)] {
        let documents = collection
            .find(doc! {}, None)
            .skip(skip)
            .limit(limit)
            .to_list(None)
            .await
            .unwrap();

        let expected = limit.min(10 - (skip as i64).min(10)).max(0) as usize;
        assert_eq!(documents.len(), expected, "skip {skip} limit {limit}");
    }
}

#[tokio::test]
async fn test_to_list_caps_and_continues() {
    let collection = numbers(5).await;
    let mut cursor = collection.find(doc! {}, without_id());

    let first = cursor.to_list(Some(2)).await.unwrap();
    let rest = cursor.to_list(None).await.unwrap();

    assert_eq!(first, vec![doc! { "i": 0 }, doc! { "i": 1 }]);
    assert_eq!(rest, vec![doc! { "i": 2 }, doc! { "i": 3 }, doc! { "i": 4 }]);
}

#[tokio::test]
async fn test_next_document_past_the_end() {
    let collection = numbers(2).await;
    let mut cursor = collection.find(doc! {}, None);
    assert_eq!(cursor.state(), CursorState::Configuring);

    cursor.next_document().await.unwrap();
    assert_eq!(cursor.state(), CursorState::Iterating);
    cursor.next_document().await.unwrap();

    let err = cursor.next_document().await.unwrap_err();
    assert!(matches!(err, FacadeError::EndOfSequence));
    assert_eq!(cursor.state(), CursorState::Exhausted);
    assert!(!cursor.alive());
}

#[tokio::test]
async fn test_stream_ends_after_every_document() {
    use futures::StreamExt;

    let collection = numbers(10).await;
    let mut cursor = collection.find(doc! {}, None);

    let mut seen = 0;
    while let Some(document) = cursor.next().await {
        document.unwrap();
        seen += 1;
    }

    assert_eq!(seen, 10);
}

#[tokio::test]
async fn test_close_twice() {
    let collection = numbers(3).await;

    let mut cursor = collection.find(doc! {}, None);
    cursor.close();
    cursor.close();
    assert_eq!(cursor.state(), CursorState::Exhausted);
    assert!(cursor.to_list(None).await.unwrap().is_empty());

    let mut indexes = collection.list_indexes().unwrap();
    indexes.close();
    indexes.close();
    assert!(!indexes.alive());

    let mut pipeline = collection.aggregate(vec![doc! { "$match": {} }]);
    pipeline.close();
    pipeline.close();
    assert!(!pipeline.alive());
}

#[tokio::test]
async fn test_clone_restarts_with_same_parameters() {
    let collection = numbers(5).await;

    let mut cursor = collection.find(doc! { "i": { "$gte": 2 } }, without_id());
    cursor.sort(doc! { "i": -1 }).limit(2);
    cursor.next_document().await.unwrap();

    let mut copy = cursor.clone();
    assert_eq!(copy.state(), CursorState::Configuring);
    assert_eq!(
        copy.to_list(None).await.unwrap(),
        vec![doc! { "i": 4 }, doc! { "i": 3 }]
    );
    assert_eq!(cursor.to_list(None).await.unwrap(), vec![doc! { "i": 3 }]);
}

#[tokio::test]
async fn test_rewind() {
    let collection = numbers(3).await;
    let mut cursor = collection.find(doc! {}, without_id());

    let first = cursor.to_list(None).await.unwrap();
    let again = cursor.rewind().to_list(None).await.unwrap();

    assert_eq!(first, again);
}

#[tokio::test]
async fn test_cursor_distinct() {
    let collection = numbers(4).await;
    collection
        .insert_one(doc! { "i": 1, "extra": true })
        .await
        .unwrap();

    let cursor = collection.find(doc! { "i": { "$lt": 2 } }, None);
    assert_eq!(
        cursor.distinct("i").await.unwrap(),
        vec![bson::Bson::Int32(0), bson::Bson::Int32(1)]
    );
}

#[tokio::test]
async fn test_where_is_not_simulated() {
    let collection = numbers(1).await;

    let err = collection
        .find(doc! {}, None)
        .where_clause("this.i > 0".to_string())
        .to_list(None)
        .await
        .unwrap_err();

    assert!(err.is_not_implemented());
}

#[tokio::test]
async fn test_latent_cursor_evaluates_pipeline() {
    let collection = numbers(6).await;

    let documents: Vec<Document> = collection
        .aggregate(vec![
            doc! { "$match": { "i": { "$gte": 3 } } },
            doc! { "$sort": { "i": -1 } },
            doc! { "$project": { "_id": 0 } },
        ])
        .to_list(None)
        .await
        .unwrap();

    assert_eq!(
        documents,
        vec![doc! { "i": 5 }, doc! { "i": 4 }, doc! { "i": 3 }]
    );
}
