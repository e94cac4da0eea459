use std::collections::BTreeMap;
use std::sync::Arc;

use logshard_core::mocks::MockShardConnection;
use logshard_core::{
    Cell, Dialect, Error, ErrorKind, FamilyResolver, IngestionPipeline, LogEvent, QueryRouter,
    ResultSet, Shard, ShardRegistry,
};
use serde_json::json;

fn schema(fields: &[(&str, &str)]) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(name, ty)| (name.to_string(), ty.to_string()))
        .collect()
}

fn events(values: Vec<serde_json::Value>) -> Vec<LogEvent> {
    values
        .into_iter()
        .map(|value| value.as_object().cloned().unwrap())
        .collect()
}

async fn registry(connections: &[Arc<MockShardConnection>]) -> Arc<ShardRegistry> {
    let shards = connections
        .iter()
        .enumerate()
        .map(|(id, conn)| Shard::new(id, format!("mock-{}", id), conn.clone()))
        .collect();
    let registry = Arc::new(ShardRegistry::new(shards).unwrap());
    registry.prepare().await;
    registry
}

fn creates_of(conn: &MockShardConnection, table: &str) -> usize {
    conn.executed()
        .iter()
        .filter(|statement| statement.table == table && statement.sql.starts_with("CREATE TABLE"))
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_ingests_create_one_table() {
    let conns = vec![
        Arc::new(MockShardConnection::new()),
        Arc::new(MockShardConnection::new()),
    ];
    let pipeline = Arc::new(IngestionPipeline::new(registry(&conns).await));

    let mut handles = Vec::new();
    for n in 0..16 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let batch = events(vec![json!({"user": format!("u{}", n), "port": n})]);
            pipeline
                .ingest("auth", &schema(&[("user", "string"), ("port", "int")]), &batch)
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    let hosting: Vec<_> = conns.iter().filter(|conn| conn.has_table("auth")).collect();
    assert_eq!(hosting.len(), 1);
    assert_eq!(creates_of(&conns[0], "auth") + creates_of(&conns[1], "auth"), 1);
    assert_eq!(hosting[0].row_count("auth"), 16);
    assert_eq!(hosting[0].row_count("raw_logs"), 16);
}

#[tokio::test]
async fn new_family_lands_on_least_loaded_shard() {
    let s1 = Arc::new(MockShardConnection::with_tables(["a", "b"]));
    let s2 = Arc::new(MockShardConnection::with_tables(["c"]));
    let pipeline = IngestionPipeline::new(registry(&[s1.clone(), s2.clone()]).await);

    let summary = pipeline
        .ingest("d", &schema(&[("msg", "string")]), &events(vec![json!({"msg": "hi"})]))
        .await
        .unwrap();

    assert!(summary.created);
    assert_eq!(summary.shard, "mock-1");
    assert!(s2.has_table("d"));
    assert!(!s1.has_table("d"));
}

#[tokio::test]
async fn existing_family_is_written_where_it_lives() {
    let s1 = Arc::new(MockShardConnection::with_tables(["a", "b"]));
    let s2 = Arc::new(MockShardConnection::with_tables(["c"]));
    let pipeline = IngestionPipeline::new(registry(&[s1.clone(), s2.clone()]).await);

    let summary = pipeline
        .ingest("a", &schema(&[("msg", "string")]), &events(vec![json!({"msg": "hi"})]))
        .await
        .unwrap();

    assert!(!summary.created);
    assert_eq!(summary.shard, "mock-0");
    assert_eq!(s1.row_count("a"), 1);
    assert_eq!(creates_of(&s1, "a"), 0);
}

#[tokio::test]
async fn storage_failure_keeps_earlier_events() {
    let conn = Arc::new(MockShardConnection::with_tables(["auth"]));
    let pipeline = IngestionPipeline::new(registry(&[conn.clone()]).await);
    conn.fail_writes_to("auth", 2);

    let batch = events(vec![
        json!({"user": "a"}),
        json!({"user": "b"}),
        json!({"user": "c"}),
    ]);
    let err = pipeline
        .ingest("auth", &schema(&[("user", "string")]), &batch)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(conn.row_count("auth"), 2);
    assert_eq!(conn.row_count("raw_logs"), 3);
}

#[tokio::test]
async fn queries_are_routed_to_the_owning_shard() {
    let s1 = Arc::new(MockShardConnection::with_tables(["a", "b"]));
    let s2 = Arc::new(MockShardConnection::with_tables(["c"]));
    s2.set_query_result(ResultSet {
        columns: vec!["n".into()],
        rows: vec![vec![Cell::Integer(3)]],
    });
    let registry = registry(&[s1.clone(), s2.clone()]).await;
    let router = QueryRouter::new(FamilyResolver::new(registry));

    let result = router.query("SELECT count(*) AS n FROM c WHERE 1 = 1").await.unwrap();
    assert_eq!(result.rows, vec![vec![Cell::Integer(3)]]);
    assert_eq!(s2.queries(), vec!["SELECT count(*) AS n FROM c WHERE 1 = 1".to_string()]);
    assert!(s1.queries().is_empty());

    let err = router.query("SELECT * FROM missing").await.unwrap_err();
    assert!(matches!(err, Error::FamilyNotFound(ref name) if name == "missing"));
    assert!(s1.queries().is_empty());
}

#[tokio::test]
async fn tables_created_out_of_band_become_routable() {
    let conn = Arc::new(MockShardConnection::new());
    let registry = registry(&[conn.clone()]).await;
    let router = QueryRouter::new(FamilyResolver::new(registry));

    assert!(matches!(
        router.query("SELECT * FROM late").await,
        Err(Error::FamilyNotFound(_))
    ));
    conn.push_row("late", Vec::new());
    assert!(router.query("SELECT * FROM late").await.is_ok());
}

#[tokio::test]
async fn failed_queries_are_storage_errors() {
    let conn = Arc::new(MockShardConnection::with_tables(["auth"]));
    let registry = registry(&[conn.clone()]).await;
    let router = QueryRouter::new(FamilyResolver::new(registry));

    conn.fail_queries(true);
    let err = router.query("SELECT * FROM auth").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(conn.queries(), vec!["SELECT * FROM auth".to_string()]);

    conn.fail_queries(false);
    assert!(router.query("SELECT * FROM Auth").await.is_ok());
}

#[tokio::test]
async fn statements_follow_the_shard_dialect() {
    let conn = Arc::new(MockShardConnection::with_dialect(Dialect::Sqlite));
    let registry = registry(&[conn.clone()]).await;
    let pipeline = IngestionPipeline::new(registry);

    pipeline
        .ingest("auth", &schema(&[("port", "int")]), &events(vec![json!({"port": 22})]))
        .await
        .unwrap();

    let executed = conn.executed();
    let create = executed
        .iter()
        .find(|statement| statement.table == "auth" && statement.sql.starts_with("CREATE TABLE"))
        .unwrap();
    assert!(create.sql.contains("AUTOINCREMENT"));
    let insert = executed
        .iter()
        .find(|statement| statement.table == "auth" && statement.sql.starts_with("INSERT"))
        .unwrap();
    assert!(insert.sql.contains('?'));
    assert!(!insert.sql.contains("$1"));
}
