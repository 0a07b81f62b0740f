use std::sync::Once;

use httpmock::{Method::DELETE, Method::GET, Method::POST, MockServer};
use serde_json::json;
use syzgy_client::prelude::*;

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

#[tokio::test]
async fn quickstart_text_search_round_trip() {
    init();
    let server = MockServer::start_async().await;

    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/v1/collections/pycollection");
            then.status(200)
                .json_body(json!({"message": "Collection deleted successfully."}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/collections").json_body(json!({
                "name": "pycollection",
                "vector_size": 384,
                "quantization": 64,
                "distance_function": "cosine"
            }));
            then.status(201).json_body(json!({
                "message": "Collection created successfully.",
                "collection_name": "pycollection"
            }));
        })
        .await;
    let insert = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/collections/pycollection/records")
                .json_body(json!([
                    {"id": 1, "text": "This is the first test record", "metadata": {"category": "test"}},
                    {"id": 2, "text": "This is the second test record", "metadata": {"category": "test"}},
                    {"id": 3, "text": "This is the third test record", "metadata": {"category": "test"}}
                ]));
            then.status(200).json_body(json!({"message": "Records inserted successfully."}));
        })
        .await;
    let search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/collections/pycollection/search")
                .json_body(json!({"text": "test record", "k": 2}));
            then.status(200).json_body(json!({
                "results": [
                    {"id": 1, "metadata": {"category": "test"}, "distance": 0.12},
                    {"id": 3, "metadata": {"category": "test"}, "distance": 0.19}
                ]
            }));
        })
        .await;

    let client = SyzgyClient::new(server.base_url()).unwrap();
    client.delete_collection("pycollection").await.unwrap();

    let collection = client
        .create_collection("pycollection", 384, 64, DistanceFunction::Cosine)
        .await
        .unwrap();
    assert_eq!(collection.name, "pycollection");
    assert_eq!(collection.dimension_count, 384);
    assert_eq!(collection.quantization, 64);

    let ordinals = ["first", "second", "third"];
    let documents: Vec<Document> = ordinals
        .iter()
        .zip(1u64..)
        .map(|(ordinal, id)| {
            Document::new(id)
                .with_text(format!("This is the {ordinal} test record"))
                .with_metadata_entry("category", "test")
        })
        .collect();
    client
        .collection("pycollection")
        .insert(&documents)
        .await
        .unwrap();

    let results = client
        .collection("pycollection")
        .search(&SearchQuery::by_text("test record").with_k(2))
        .await
        .unwrap();

    delete.assert_async().await;
    create.assert_async().await;
    insert.assert_async().await;
    search.assert_async().await;

    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.distance >= 0.0);
        assert_eq!(result.metadata.get("category"), Some(&json!("test")));
    }
}

#[tokio::test]
async fn missing_collection_is_a_404_service_error() {
    init();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/collections/missing");
            then.status(404).body("Collection not found\n");
        })
        .await;

    let client = SyzgyClient::new(server.base_url()).unwrap();
    let error = client.get_collection("missing").await.unwrap_err();

    match error {
        SyzgyError::Service { status_code, body } => {
            assert_eq!(status_code, 404);
            assert_eq!(body.trim(), "Collection not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn get_collection_is_idempotent() {
    init();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/collections/tweets");
            then.status(200).json_body(json!({
                "name": "tweets",
                "vector_size": 384,
                "quantization": 64,
                "distance_function": 1,
                "storage_space": 0,
                "num_vectors": 1500,
                "average_distance": 0.0
            }));
        })
        .await;

    let client = SyzgyClient::new(format!("{}/", server.base_url())).unwrap();
    let first = client.get_collection("tweets").await.unwrap();
    let second = client.collection("tweets").info().await.unwrap();

    mock.assert_hits_async(2).await;
    assert_eq!(first, second);
    assert_eq!(first.document_count, 1500);
    assert_eq!(first.distance_function, DistanceFunction::Cosine);
}
