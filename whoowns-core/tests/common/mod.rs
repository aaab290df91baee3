//! Test helper functions for integration tests
//!
//! Shared across test files using the tests/common/ pattern.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Once;
use tempfile::TempDir;
use whoowns_core::TeamRegistry;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Create a storage root with `packages/<team>` manifests and an optional
/// `teams.properties` link file
pub fn create_owners_root(teams: &[(&str, &str)], links: Option<&str>) -> TempDir {
    let temp_dir = TempDir::new().expect("create temp dir");
    let packages = temp_dir.path().join("packages");
    fs::create_dir(&packages).expect("create packages dir");
    for (name, content) in teams {
        write_manifest(temp_dir.path(), name, content);
    }
    if let Some(links) = links {
        write_links(temp_dir.path(), links);
    }
    temp_dir
}

pub fn write_manifest(root: &Path, team: &str, content: &str) {
    fs::write(root.join("packages").join(team), content).expect("write manifest");
}

pub fn write_links(root: &Path, content: &str) {
    fs::write(root.join("teams.properties"), content).expect("write link file");
}

pub fn registry_for(root: &Path) -> TeamRegistry {
    TeamRegistry::new(root.join("packages"), root.join("teams.properties"))
}
