/// Engram version string.
pub const ENGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// On-disk corpus format version, recorded in the manifest.
pub const CORPUS_FORMAT_VERSION: u32 = 1;

/// Upper bound on `top_k` accepted by the retrieval API.
pub const MAX_TOP_K: usize = 1_000;

/// Separator between prompt and response when a node is treated as one text.
pub const NODE_TEXT_SEPARATOR: &str = "\n";

/// Label used for vectors that carry no cluster.
pub const UNCLUSTERED_LABEL: &str = "unclustered";
