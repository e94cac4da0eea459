//! logshard-core
//!
//! Placement, dynamic schema, ingestion, query routing and retention for log
//! families spread over a pool of relational shards.

#![warn(missing_docs)]

mod clock;
mod error;
mod family;
mod ingest;
mod placement;
mod query;
mod registry;
mod resolver;
mod result;
mod retention;
mod schema;
mod shard;
mod statement;

pub mod mocks;

pub use clock::{Clock, MockClock, SystemClock};
pub use error::{DriverError, Error, ErrorKind, Result};
pub use family::{is_valid_identifier, FamilyName, MAX_IDENTIFIER_LEN, RAW_LOG_TABLE};
pub use ingest::{IngestSummary, IngestionPipeline, LogEvent, MAX_STRING_LEN};
pub use placement::{LeastLoaded, PlacementPolicy};
pub use query::{extract_target_table, QueryRouter};
pub use registry::ShardRegistry;
pub use resolver::FamilyResolver;
pub use result::{Cell, ResultSet, NULL_SENTINEL};
pub use retention::{
    parse_purge_date, PurgeCutoff, PurgeReport, RetentionPurger, DEFAULT_RETENTION,
    DEFAULT_SWEEP_INTERVAL, PURGE_DATE_FORMAT,
};
pub use schema::{ColumnType, SchemaBuilder, SchemaDescriptor, TableDefinition, RESERVED_COLUMNS};
pub use shard::{Shard, ShardConnection};
pub use statement::{Dialect, SqlValue, Statement};
