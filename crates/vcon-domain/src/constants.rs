//! Domain constants and defaults.

/// vCon container version produced by this server.
pub const VCON_VERSION: &str = "0.3.0";

/// Attachment type that carries the tag set of a vCon.
pub const TAGS_ATTACHMENT_TYPE: &str = "tags";

/// Default attachment type that carries the tenant identifier.
pub const TENANT_ATTACHMENT_TYPE: &str = "tenant";

/// Default JSON path into the tenant attachment body.
pub const TENANT_JSON_PATH: &str = "id";

/// Postgres session variable consulted by the row-level-security policies.
pub const TENANT_SESSION_VAR: &str = "app.current_tenant";

/// Default result limit for every search mode.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Hard cap on the result limit a caller may request.
pub const MAX_SEARCH_LIMIT: usize = 500;

/// Default cosine-similarity threshold for semantic search.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

/// Default weight of the semantic score in hybrid search.
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.6;

/// Dimensionality of stored embedding vectors.
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Number of queue tasks an embedding worker claims per cycle.
pub const EMBEDDING_BATCH_SIZE: usize = 32;

/// Retries granted to a failed embedding task before it is abandoned.
pub const MAX_EMBEDDING_RETRIES: i32 = 3;

/// Default cache TTL for whole-vCon entries (seconds).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Key prefix for cached vCons.
pub const CACHE_KEY_PREFIX: &str = "vcon:";

/// Retry attempts for retryable storage errors.
pub const STORAGE_RETRY_COUNT: usize = 3;

/// Base backoff between storage retries (milliseconds, jittered).
pub const STORAGE_RETRY_BACKOFF_MS: u64 = 100;
