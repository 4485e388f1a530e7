//! Test utilities for handler testing.
//!
//! Builds an [`AppState`] over the checked-in Westeros fixture with an
//! in-process cache.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use atlas_lib::{MemoryCache, MemoryStore, PipelineSettings};

use crate::state::AppState;

/// Path to the test fixture document.
pub const TEST_FIXTURE_PATH: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../docs/fixtures/westeros.json");

static FIXTURE_STORE: OnceLock<Arc<MemoryStore>> = OnceLock::new();

fn fixture_store() -> Arc<MemoryStore> {
    FIXTURE_STORE
        .get_or_init(|| {
            let path = fixture_path();
            let store = MemoryStore::load(&path)
                .unwrap_or_else(|e| panic!("failed to load test fixture from {:?}: {}", path, e));
            Arc::new(store)
        })
        .clone()
}

/// A fresh state over the shared fixture store.
///
/// Each call gets its own empty cache, so tests do not observe each other's
/// cached bodies.
pub fn test_state() -> AppState {
    AppState::from_components(
        fixture_store(),
        Arc::new(MemoryCache::new()),
        PipelineSettings::default(),
    )
}

pub fn fixture_path() -> PathBuf {
    PathBuf::from(TEST_FIXTURE_PATH)
}

/// Known records in the fixture.
pub mod fixture_records {
    /// "The North": 2,000,000 m², three castles, one city, one town.
    pub const NORTH: i32 = 1;

    /// "The Vale": one castle.
    pub const VALE: i32 = 2;

    /// "The Iron Islands": a multipolygon kingdom.
    pub const IRON_ISLANDS: i32 = 3;

    /// Winterfell, a castle in the North.
    pub const WINTERFELL: i32 = 1;

    pub const KINGDOM_COUNT: usize = 3;
}

pub fn test_request_id() -> String {
    format!("test-{}", uuid::Uuid::now_v7())
}
