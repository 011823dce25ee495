//! Test fixtures for Engram: deterministic and scripted embedding
//! providers, record builders, and loaders for the golden datasets under
//! `fixtures/`.

pub mod builders;
pub mod providers;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;

pub use builders::*;
pub use providers::{FlakyProvider, TableProvider};

/// Root directory of the fixture files.
pub fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Load and deserialize a JSON fixture file.
///
/// # Panics
/// Panics if the file doesn't exist or can't be deserialized.
pub fn load_fixture<T: DeserializeOwned>(relative_path: &str) -> T {
    let path = fixtures_root().join(relative_path);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

/// One interaction in a golden corpus.
#[derive(Debug, Clone, Deserialize)]
pub struct GoldenInteraction {
    pub id: String,
    pub conversation_id: String,
    pub owner_id: Option<String>,
    pub tenant_id: Option<String>,
    pub prompt: String,
    pub response: String,
}

/// A query and the ids it must (and must not) return.
#[derive(Debug, Clone, Deserialize)]
pub struct GoldenQuery {
    pub query: String,
    pub owner_id: Option<String>,
    pub tenant_id: Option<String>,
    pub expect_top: Option<String>,
    #[serde(default)]
    pub expect_absent: Vec<String>,
}

/// A golden corpus plus queries over it.
#[derive(Debug, Clone, Deserialize)]
pub struct GoldenScenario {
    pub name: String,
    pub interactions: Vec<GoldenInteraction>,
    pub queries: Vec<GoldenQuery>,
}

/// Load `fixtures/golden/<name>.json`.
pub fn load_golden(name: &str) -> GoldenScenario {
    load_fixture(&format!("golden/{name}.json"))
}
