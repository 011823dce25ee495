// Single source of truth for all default values.

// --- Storage ---
pub const DEFAULT_DATA_DIR: &str = "engram-data";
pub const DEFAULT_DB_FILENAME: &str = "engram.db";
pub const DEFAULT_WAL_MODE: bool = true;
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;
pub const DEFAULT_READ_POOL_SIZE: usize = 4;

// --- Embeddings ---
pub const DEFAULT_EMBEDDING_PROVIDER: &str = "http";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding";
pub const DEFAULT_EMBEDDING_API_KEY_ENV: &str = "ENGRAM_EMBEDDING_API_KEY";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 512;
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;
pub const DEFAULT_EMBEDDING_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_EMBEDDING_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_L1_CACHE_SIZE: u64 = 10_000;
pub const DEFAULT_L1_CACHE_TTI_SECS: u64 = 3_600;
pub const DEFAULT_L2_CACHE_ENABLED: bool = true;

// --- Clustering ---
pub const DEFAULT_SOFT_PREDICT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_CENTROID_JOIN_THRESHOLD: f64 = 0.7;
pub const DEFAULT_NOVELTY_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 3;
pub const DEFAULT_MAX_CANDIDATES: usize = 1_000;
pub const DEFAULT_LABEL_TERMS: usize = 3;
pub const DEFAULT_SOFTMAX_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_RECLUSTER_INTERVAL_MS: u64 = 600_000;
pub const DEFAULT_RECLUSTER_CANDIDATES: usize = 64;

// --- Retrieval ---
pub const DEFAULT_INTERACTION_THRESHOLD: f64 = 0.5;
pub const DEFAULT_EPISODE_THRESHOLD: f64 = 0.3;
pub const DEFAULT_CLUSTER_BOOST: f64 = 0.1;
pub const DEFAULT_RRF_K: u32 = 60;
pub const DEFAULT_KEYWORD_BOOST: f64 = 1.5;
pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_LANE_DEPTH: usize = 50;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_BM25_K1: f64 = 1.2;
pub const DEFAULT_BM25_B: f64 = 0.75;
pub const DEFAULT_ANN_ENABLED: bool = true;
pub const DEFAULT_ANN_MIN_EPISODES: usize = 256;
pub const DEFAULT_ANN_LISTS: usize = 16;
pub const DEFAULT_ANN_SEARCH_LISTS: usize = 4;
pub const DEFAULT_ANN_STALE_RATIO: f64 = 0.2;

// --- Fast filter ---
pub const DEFAULT_FILTER_ENABLED: bool = true;
pub const DEFAULT_DEPTH_DELTA_BOUND: f64 = 0.5;
pub const DEFAULT_COMPLEXITY_SPAN: u8 = 1;
pub const DEFAULT_REQUIRE_DOMAIN_MATCH: bool = true;

// --- Ingestion ---
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_FLUSH_COUNT: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_024;
pub const DEFAULT_MAX_ITEM_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 60_000;
pub const DEFAULT_MAX_REASONING_DEPTH: u32 = 3;
pub const DEFAULT_REASONING_PER_MINUTE: u32 = 30;
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 4_096;

// --- Observability ---
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_JSON: bool = false;
