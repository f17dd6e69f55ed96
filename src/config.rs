use std::time::Duration;

/// Every tunable named in the external-interfaces config table (spec.md
/// §6). Config *loading* (env vars, files) is out of scope; this struct
/// is the typed contract a future loader populates, mirroring the
/// teacher's own split between a full config struct and a narrow
/// `Default` impl (`src/lib.rs`'s `DatabaseConfig`).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Max rows per batch before a synchronous flush (spec.md §4.4, §6).
    pub batch_size: usize,
    /// Idle interval before a time-based flush (spec.md §4.4, §6).
    pub flush_interval: Duration,
    /// Comma-separated bus bootstrap endpoints (spec.md §6 `KAFKA_BROKERS`).
    pub bus_brokers: String,
    pub events_topic: String,
    pub definitions_topic: String,
    pub membership_topic: String,
    pub events_consumer_group: String,
    pub membership_consumer_group: String,
    /// Analytical store connection settings (spec.md §6 `CLICKHOUSE_*`).
    pub analytical_store: AnalyticalStoreConfig,
    /// Half-open interval for per-user streaming aggregation buckets
    /// (spec.md §3). Compile-time in the source system; kept
    /// configurable here since nothing prevents a different deployment
    /// from tuning it.
    pub bucket_size: Duration,
    pub state_retention: Duration,
    pub changelog_retention: Duration,
    pub raw_event_retention: Duration,
    /// Drain budget given to in-flight batchers on shutdown (spec.md §5).
    pub shutdown_drain_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AnalyticalStoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub dial_timeout: Duration,
    pub pool_size: usize,
    /// Per-query ceiling (spec.md §5 "bounded by max_execution_time = 60s").
    pub max_execution_time: Duration,
}

impl Default for AnalyticalStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9000,
            user: "default".to_string(),
            password: String::new(),
            database: "cohort_engine".to_string(),
            dial_timeout: Duration::from_secs(5),
            pool_size: 10,
            max_execution_time: Duration::from_secs(60),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            flush_interval: Duration::from_secs(5),
            bus_brokers: "localhost:9092".to_string(),
            events_topic: "events.raw".to_string(),
            definitions_topic: "cohort.definitions".to_string(),
            membership_topic: "cohort.membership".to_string(),
            events_consumer_group: "cohort-engine-events".to_string(),
            membership_consumer_group: "cohort-engine-membership".to_string(),
            analytical_store: AnalyticalStoreConfig::default(),
            bucket_size: Duration::from_secs(60),
            state_retention: Duration::from_secs(90 * 24 * 3600),
            changelog_retention: Duration::from_secs(90 * 24 * 3600),
            raw_event_retention: Duration::from_secs(365 * 24 * 3600),
            shutdown_drain_timeout: Duration::from_secs(30),
        }
    }
}
