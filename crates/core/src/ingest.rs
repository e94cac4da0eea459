//! Event ingestion: validation, family provisioning, audit and typed writes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use logshard_observability as obs;
use serde_json::{Map, Value};
use tracing::{debug, info, info_span, Instrument};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::family::FamilyName;
use crate::placement::{LeastLoaded, PlacementPolicy};
use crate::registry::ShardRegistry;
use crate::resolver::FamilyResolver;
use crate::schema::{ColumnType, SchemaBuilder, SchemaDescriptor};
use crate::shard::Shard;
use crate::statement::{SqlValue, Statement};

/// Longest text accepted for a `string` column.
pub const MAX_STRING_LEN: usize = 255;

/// One log event: field name to JSON value.
pub type LogEvent = Map<String, Value>;

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// Family written to.
    pub family: String,
    /// Label of the shard hosting the family.
    pub shard: String,
    /// Whether this request provisioned the family table.
    pub created: bool,
    /// Number of events persisted.
    pub events: usize,
}

/// Validated event ready to be written.
struct PreparedEvent<'a> {
    event: &'a LogEvent,
    values: Vec<SqlValue>,
}

/// Writes batches of events for one family onto its shard.
pub struct IngestionPipeline {
    resolver: FamilyResolver,
    placement: Arc<dyn PlacementPolicy>,
    clock: Arc<dyn Clock>,
}

impl IngestionPipeline {
    /// Pipeline with least-loaded placement and the system clock.
    pub fn new(registry: Arc<ShardRegistry>) -> Self {
        Self {
            resolver: FamilyResolver::new(registry),
            placement: Arc::new(LeastLoaded),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the placement policy.
    pub fn with_placement(mut self, placement: Arc<dyn PlacementPolicy>) -> Self {
        self.placement = placement;
        self
    }

    /// Replaces the clock stamping `ingested_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Ingests `events` for `family` under the declared `schema`.
    ///
    /// Every event is validated before anything is written, so client errors
    /// leave no trace. Storage failures stop the batch at the failing event;
    /// earlier events stay persisted.
    pub async fn ingest(
        &self,
        family: &str,
        schema: &BTreeMap<String, String>,
        events: &[LogEvent],
    ) -> Result<IngestSummary> {
        let started = Instant::now();
        let result = self
            .ingest_inner(family, schema, events)
            .instrument(info_span!("ingest", family = %family.trim(), events = events.len()))
            .await;
        match &result {
            Ok(summary) => {
                obs::record_ingest_latency(&summary.family, &summary.shard, summary.events, started.elapsed())
            }
            Err(err) => obs::record_ingest_failure(family.trim(), &err.to_string()),
        }
        result
    }

    async fn ingest_inner(
        &self,
        family: &str,
        schema: &BTreeMap<String, String>,
        events: &[LogEvent],
    ) -> Result<IngestSummary> {
        let family = FamilyName::parse(family)?;
        debug!("Received logs for the {} log family", family);
        let schema = SchemaDescriptor::parse(&family, schema)?;
        let prepared = events
            .iter()
            .map(|event| prepare_event(&family, &schema, event))
            .collect::<Result<Vec<_>>>()?;

        let (shard, created) = self.owning_shard(&family, &schema).await?;
        let connection = shard.connection();
        let dialect = connection.dialect();
        let columns: Vec<&str> = schema.fields().map(|(name, _)| name).collect();

        for prepared in prepared {
            debug!("Handling a new log event for the {} log family", family);
            let ingested_at = self.clock.now();

            let raw = serde_json::to_string(prepared.event)?;
            connection
                .execute(&Statement::insert_raw_log(dialect, &family, raw, ingested_at))
                .await
                .map_err(|source| Error::storage("store raw log", family.as_str(), source))?;

            connection
                .execute(&Statement::insert_row(
                    dialect,
                    &family,
                    &columns,
                    prepared.values,
                    ingested_at,
                ))
                .await
                .map_err(|source| Error::storage("insert row", family.as_str(), source))?;
        }

        info!(
            family = %family,
            shard = %shard.label(),
            events = events.len(),
            created,
            "stored log events"
        );
        Ok(IngestSummary {
            family: family.to_string(),
            shard: shard.label().to_string(),
            created,
            events: events.len(),
        })
    }

    /// Resolves the owning shard, provisioning the family under the registry
    /// claim when no shard hosts it yet.
    async fn owning_shard(
        &self,
        family: &FamilyName,
        schema: &SchemaDescriptor,
    ) -> Result<(Arc<Shard>, bool)> {
        if let Some(shard) = self.resolver.resolve(family.as_str()) {
            return Ok((shard, false));
        }

        let registry = self.resolver.registry();
        let _claim = registry.claim().await;
        if let Some(shard) = self.resolver.locate(family.as_str()).await {
            return Ok((shard, false));
        }

        let shard = self
            .placement
            .select(&registry.available_shards())
            .ok_or_else(|| Error::topology("no shard available for placement"))?;
        SchemaBuilder::create_table(&shard, family, schema).await?;
        shard.register_family(family.as_str());
        obs::record_placement(family.as_str(), shard.label(), shard.family_count());
        Ok((shard, true))
    }
}

fn prepare_event<'a>(
    family: &FamilyName,
    schema: &SchemaDescriptor,
    event: &'a LogEvent,
) -> Result<PreparedEvent<'a>> {
    for field in event.keys() {
        if schema.column_type(field).is_none() {
            return Err(Error::unknown_field(family.as_str(), field));
        }
    }
    let values = schema
        .fields()
        .map(|(field, column_type)| match event.get(field) {
            Some(value) => coerce(family, field, column_type, value),
            None => Ok(null_of(column_type)),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(PreparedEvent { event, values })
}

fn null_of(column_type: ColumnType) -> SqlValue {
    match column_type {
        ColumnType::String => SqlValue::Text(None),
        ColumnType::Int => SqlValue::Integer(None),
    }
}

/// Converts a JSON value to the bound value for a column of `column_type`.
fn coerce(
    family: &FamilyName,
    field: &str,
    column_type: ColumnType,
    value: &Value,
) -> Result<SqlValue> {
    let invalid = |message: String| Error::invalid_value(family.as_str(), field, message);
    match (column_type, value) {
        (_, Value::Null) => Ok(null_of(column_type)),
        (ColumnType::String, Value::String(text)) => {
            if text.chars().count() > MAX_STRING_LEN {
                return Err(invalid(format!("longer than {} characters", MAX_STRING_LEN)));
            }
            Ok(SqlValue::Text(Some(text.clone())))
        }
        (ColumnType::String, Value::Number(number)) => Ok(SqlValue::Text(Some(number.to_string()))),
        (ColumnType::String, Value::Bool(flag)) => Ok(SqlValue::Text(Some(flag.to_string()))),
        (ColumnType::Int, Value::Number(number)) => {
            if let Some(value) = number.as_i64() {
                return Ok(SqlValue::Integer(Some(value)));
            }
            number
                .as_f64()
                .and_then(truncate_f64)
                .map(|value| SqlValue::Integer(Some(value)))
                .ok_or_else(|| invalid(format!("{} does not fit a 64-bit integer", number)))
        }
        (ColumnType::Int, Value::String(text)) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(truncate_f64))
                .map(|value| SqlValue::Integer(Some(value)))
                .ok_or_else(|| invalid(format!("'{}' is not an integer", text)))
        }
        (ColumnType::Int, Value::Bool(_)) => Err(invalid("expected a number, found a boolean".into())),
        (_, Value::Array(_)) | (_, Value::Object(_)) => {
            Err(invalid(format!("nested values cannot be stored in a {} column", column_type)))
        }
    }
}

/// Truncates toward zero; `None` for non-finite or out-of-range input.
fn truncate_f64(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Some(truncated as i64)
    } else {
        None
    }
}
