use std::collections::BTreeMap;
use std::sync::Arc;

use logshard_core::{
    Cell, FamilyResolver, IngestionPipeline, QueryRouter, RetentionPurger, Shard, ShardRegistry,
};
use logshard_sql::{PostgresShard, ShardConnectionOptions, ShardDsn};
use serde_json::json;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::test]
async fn postgres_shard_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let address = match std::env::var("PG_TEST_ADDRESS") {
        Ok(value) => value,
        Err(_) => {
            eprintln!("skipping postgres_shard_smoke; set PG_TEST_ADDRESS to run");
            return Ok(());
        }
    };
    let dsn = ShardDsn::postgres(
        &address,
        &env_or("PG_TEST_USER", "postgres"),
        &env_or("PG_TEST_PASSWORD", "postgres"),
        &env_or("PG_TEST_DB", "postgres"),
    )?;
    let shard = PostgresShard::connect(&dsn, &ShardConnectionOptions::default()).await?;

    // Best-effort cleanup so the test can be re-run.
    for stmt in ["DROP TABLE IF EXISTS pg_smoke", "DROP TABLE IF EXISTS raw_logs"] {
        sqlx::query(stmt).execute(shard.pool()).await?;
    }

    let registry = Arc::new(ShardRegistry::new(vec![Shard::new(
        0,
        dsn.label(),
        Arc::new(shard),
    )])?);
    registry.prepare().await;

    let schema: BTreeMap<String, String> = [
        ("host".to_string(), "string".to_string()),
        ("status".to_string(), "int".to_string()),
    ]
    .into();
    let events = vec![json!({"host": "web-1", "status": 200})
        .as_object()
        .cloned()
        .unwrap()];
    IngestionPipeline::new(registry.clone())
        .ingest("pg_smoke", &schema, &events)
        .await?;

    let result = QueryRouter::new(FamilyResolver::new(registry.clone()))
        .query("SELECT host, status, count(*) AS n FROM pg_smoke GROUP BY host, status")
        .await?;
    assert_eq!(
        result.rows,
        vec![vec![
            Cell::Text("web-1".into()),
            Cell::Integer(200),
            Cell::Integer(1)
        ]]
    );

    let totals = QueryRouter::new(FamilyResolver::new(registry.clone()))
        .query("SELECT sum(status) AS total, avg(status) AS mean FROM pg_smoke")
        .await?;
    assert_eq!(
        totals.rows,
        vec![vec![Cell::Integer(200), Cell::Float(200.0)]]
    );

    let deleted = RetentionPurger::new(registry)
        .purge_family("pg_smoke", chrono::Utc::now() + chrono::Duration::minutes(1))
        .await?;
    assert_eq!(deleted, 1);
    Ok(())
}
