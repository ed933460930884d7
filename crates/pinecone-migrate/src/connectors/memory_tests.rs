//! Tests for the in-memory connector.

use super::*;
use serde_json::json;

fn record(id: &str, values: Vec<f32>) -> VectorRecord {
    VectorRecord::new(id, values)
}

async fn connected(service: &MemoryService, index: &str) -> Box<dyn DataPlane> {
    let description = service.describe_index(index).await.unwrap();
    service.connect(&description).await.unwrap()
}

#[tokio::test]
async fn test_upsert_rejects_wrong_dimension() {
    let service = MemoryService::new();
    service.insert_index("docs", 3, DistanceMetric::Cosine);
    let index = connected(&service, "docs").await;

    let result = index
        .upsert(&[record("a", vec![1.0, 0.0, 0.0]), record("b", vec![1.0])], "")
        .await;

    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            expected: 3,
            actual: 1
        })
    ));
    // Nothing from the rejected request is written.
    assert!(service.records("docs", "").is_empty());
    assert!(service.upsert_calls().is_empty());
}

#[tokio::test]
async fn test_upsert_same_id_overwrites() {
    let service = MemoryService::new();
    service.insert_index("docs", 2, DistanceMetric::Cosine);
    let index = connected(&service, "docs").await;

    let first = record("a", vec![1.0, 0.0])
        .with_metadata(Metadata::from([("v".to_string(), json!(1))]));
    let second = record("a", vec![1.0, 0.0])
        .with_metadata(Metadata::from([("v".to_string(), json!(2))]));
    index.upsert(&[first], "ns").await.unwrap();
    index.upsert(&[second], "ns").await.unwrap();

    let stored = service.records("docs", "ns");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].metadata["v"], json!(2));
}

#[tokio::test]
async fn test_list_ids_paginates_in_id_order() {
    let service = MemoryService::new().with_list_page_size(2);
    service.insert_index("docs", 1, DistanceMetric::Cosine);
    service
        .seed(
            "docs",
            "",
            vec![
                record("c", vec![0.3]),
                record("a", vec![0.1]),
                record("b", vec![0.2]),
            ],
        )
        .unwrap();
    let index = connected(&service, "docs").await;

    let first = index.list_ids("", None, None).await.unwrap();
    assert_eq!(first.ids, vec!["a", "b"]);
    let second = index.list_ids("", None, first.next).await.unwrap();
    assert_eq!(second.ids, vec!["c"]);
    assert!(second.next.is_none());
}

#[tokio::test]
async fn test_list_ids_explicit_limit() {
    let service = MemoryService::new();
    service.insert_index("docs", 1, DistanceMetric::Cosine);
    service
        .seed("docs", "", vec![record("a", vec![0.1]), record("b", vec![0.2])])
        .unwrap();
    let index = connected(&service, "docs").await;

    let page = index.list_ids("", Some(1), None).await.unwrap();
    assert_eq!(page.ids, vec!["a"]);
    assert_eq!(page.next.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_list_ids_unsupported() {
    let service = MemoryService::new().without_id_listing();
    service.insert_index("pods", 1, DistanceMetric::Cosine);
    let index = connected(&service, "pods").await;

    let result = index.list_ids("", None, None).await;
    assert!(matches!(result, Err(Error::ListingUnsupported(name)) if name == "pods"));
}

#[tokio::test]
async fn test_fetch_skips_unknown_ids() {
    let service = MemoryService::new();
    service.insert_index("docs", 1, DistanceMetric::Cosine);
    service.seed("docs", "ns", vec![record("a", vec![0.5])]).unwrap();
    let index = connected(&service, "docs").await;

    let fetched = index
        .fetch(&["a".to_string(), "missing".to_string()], "ns")
        .await
        .unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched["a"].values, vec![0.5]);

    let other_ns = index.fetch(&["a".to_string()], "other").await.unwrap();
    assert!(other_ns.is_empty());
}

#[tokio::test]
async fn test_stats_with_and_without_namespace_breakdown() {
    let service = MemoryService::new();
    service.insert_index("docs", 1, DistanceMetric::Cosine);
    service.seed("docs", "a", vec![record("1", vec![0.1])]).unwrap();
    service
        .seed("docs", "b", vec![record("1", vec![0.1]), record("2", vec![0.2])])
        .unwrap();

    let stats = connected(&service, "docs").await.describe_stats().await.unwrap();
    assert_eq!(stats.total_vector_count, 3);
    assert_eq!(stats.namespaces.len(), 2);
    assert_eq!(stats.namespaces[1].name, "b");
    assert_eq!(stats.namespaces[1].vector_count, 2);

    let totals_only = service.clone().without_namespace_stats();
    let stats = connected(&totals_only, "docs")
        .await
        .describe_stats()
        .await
        .unwrap();
    assert_eq!(stats.total_vector_count, 3);
    assert!(stats.namespaces.is_empty());
}

#[tokio::test]
async fn test_provisioning_polls() {
    let service = MemoryService::new().with_provisioning_polls(2);
    service
        .create_index(&CreateIndexRequest {
            name: "new".to_string(),
            dimension: 4,
            metric: DistanceMetric::DotProduct,
            spec: ServerlessSpec::default(),
        })
        .await
        .unwrap();

    assert!(!service.describe_index("new").await.unwrap().ready);
    assert!(!service.describe_index("new").await.unwrap().ready);
    let ready = service.describe_index("new").await.unwrap();
    assert!(ready.ready);
    assert_eq!(ready.dimension, 4);
    assert_eq!(ready.metric, DistanceMetric::DotProduct);
}

#[tokio::test]
async fn test_create_existing_index_conflicts() {
    let service = MemoryService::new();
    service.insert_index("docs", 2, DistanceMetric::Cosine);
    let result = service
        .create_index(&CreateIndexRequest {
            name: "docs".to_string(),
            dimension: 2,
            metric: DistanceMetric::Cosine,
            spec: ServerlessSpec::default(),
        })
        .await;
    assert!(matches!(result, Err(Error::Service { status: 409, .. })));
}

#[tokio::test]
async fn test_delete_missing_index() {
    let service = MemoryService::new();
    let result = service.delete_index("ghost").await;
    assert!(matches!(result, Err(Error::IndexNotFound(_))));
}

#[tokio::test]
async fn test_query_ranks_by_cosine() {
    let service = MemoryService::new();
    service.insert_index("docs", 2, DistanceMetric::Cosine);
    service
        .seed(
            "docs",
            "",
            vec![
                record("east", vec![1.0, 0.0]),
                record("north", vec![0.0, 1.0]),
                record("northeast", vec![1.0, 1.0]),
            ],
        )
        .unwrap();
    let index = connected(&service, "docs").await;

    let matches = index
        .query(&QueryRequest {
            vector: vec![1.0, 0.1],
            namespace: String::new(),
            top_k: 2,
            include_values: false,
            include_metadata: true,
            filter: None,
        })
        .await
        .unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "east");
    assert_eq!(matches[1].id, "northeast");
    assert!(matches[0].values.is_none());
    assert!(matches[0].metadata.is_some());
}

#[tokio::test]
async fn test_query_euclidean_ascending() {
    let service = MemoryService::new();
    service.insert_index("docs", 1, DistanceMetric::Euclidean);
    service
        .seed(
            "docs",
            "",
            vec![record("far", vec![10.0]), record("near", vec![1.5])],
        )
        .unwrap();
    let index = connected(&service, "docs").await;

    let matches = index
        .query(&QueryRequest {
            vector: vec![1.0],
            namespace: String::new(),
            top_k: 10,
            include_values: true,
            include_metadata: false,
            filter: None,
        })
        .await
        .unwrap();

    assert_eq!(matches[0].id, "near");
    assert_eq!(matches[0].values, Some(vec![1.5]));
}

#[test]
fn test_filter_operators() {
    let metadata = Metadata::from([
        ("country".to_string(), json!("PT")),
        ("rating".to_string(), json!(4.5)),
    ]);

    assert!(matches_filter(&metadata, &json!({"country": "PT"})).unwrap());
    assert!(matches_filter(&metadata, &json!({"country": {"$eq": "PT"}})).unwrap());
    assert!(!matches_filter(&metadata, &json!({"country": {"$ne": "PT"}})).unwrap());
    assert!(matches_filter(&metadata, &json!({"country": {"$in": ["ES", "PT"]}})).unwrap());
    assert!(matches_filter(&metadata, &json!({"country": {"$nin": ["ES"]}})).unwrap());
    assert!(matches_filter(&metadata, &json!({"rating": {"$gte": 4.5, "$lt": 5}})).unwrap());
    assert!(!matches_filter(&metadata, &json!({"rating": {"$gt": 4.5}})).unwrap());
    assert!(matches_filter(
        &metadata,
        &json!({"$or": [{"country": "ES"}, {"rating": {"$gt": 4}}]})
    )
    .unwrap());
    assert!(!matches_filter(
        &metadata,
        &json!({"$and": [{"country": "PT"}, {"missing": "x"}]})
    )
    .unwrap());
}

#[test]
fn test_filter_rejects_unknown_operator() {
    let metadata = Metadata::new();
    assert!(matches_filter(&metadata, &json!({"x": {"$regex": "a"}})).is_err());
    assert!(matches_filter(&metadata, &json!(["not", "an", "object"])).is_err());
}
