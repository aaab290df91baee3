//! Team ownership registry.
//!
//! Holds the active [`Snapshot`] behind an [`ArcSwap`]. Lookups load the
//! current pointer and never block; `refresh` builds a complete snapshot off
//! to the side and publishes it with a single store. Old snapshots are freed
//! when the last reader drops its `Arc`.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::config::ServicePaths;
use crate::error::Result;

pub mod source;

/// A team and the package prefixes it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    name: String,
    prefixes: Vec<String>,
}

impl Team {
    pub fn new(name: impl Into<String>, prefixes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            prefixes,
        }
    }

    /// Team name, exactly as the manifest file is named
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefixes in manifest line order, duplicates included
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// True when any prefix is a literal leading substring of `package`.
    ///
    /// Not segment aware: `com.foo` owns `com.foobar`. An empty prefix owns
    /// everything.
    pub fn owns(&self, package: &str) -> bool {
        self.prefixes.iter().any(|p| package.starts_with(p.as_str()))
    }
}

/// One owning team for a looked-up package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamMatch {
    pub team: String,
    pub link: String,
}

/// One immutable generation of the index
#[derive(Debug, Default)]
pub struct Snapshot {
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
    teams: Vec<Team>,
    links: HashMap<String, String>,
}

impl Snapshot {
    /// Build a snapshot directly from parts; keys of `links` must already be lowercase
    pub fn new(generation: u64, teams: Vec<Team>, links: HashMap<String, String>) -> Self {
        Self {
            generation,
            loaded_at: Some(Utc::now()),
            teams,
            links,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When this generation was built, `None` for the initial empty snapshot
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn links(&self) -> &HashMap<String, String> {
        &self.links
    }

    /// Link for a team, matched case-insensitively on the team name
    pub fn link_for(&self, team: &str) -> &str {
        self.links
            .get(&team.to_lowercase())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Every team owning `package`, in snapshot order
    pub fn lookup(&self, package: &str) -> Vec<TeamMatch> {
        self.teams
            .iter()
            .filter(|team| team.owns(package))
            .map(|team| TeamMatch {
                team: team.name.clone(),
                link: self.link_for(&team.name).to_owned(),
            })
            .collect()
    }

    /// Total number of prefixes across all teams
    pub fn prefix_count(&self) -> usize {
        self.teams.iter().map(|t| t.prefixes.len()).sum()
    }
}

/// Counters describing one completed refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub generation: u64,
    pub teams: usize,
    pub prefixes: usize,
    pub links: usize,
    pub skipped_manifests: usize,
    pub links_available: bool,
}

/// Result of a call to [`TeamRegistry::refresh`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was built and published
    Refreshed(RefreshStats),
    /// Another refresh held the guard; nothing changed
    Skipped,
}

/// Releases the refresh flag when dropped, including on early return
struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RefreshGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// The shared registry, passed to request handlers as `Arc<TeamRegistry>`
pub struct TeamRegistry {
    manifest_dir: PathBuf,
    links_file: PathBuf,
    current: ArcSwap<Snapshot>,
    refreshing: AtomicBool,
}

impl TeamRegistry {
    /// Create a registry with an empty snapshot. Call [`refresh`](Self::refresh) to load.
    pub fn new(manifest_dir: impl Into<PathBuf>, links_file: impl Into<PathBuf>) -> Self {
        Self {
            manifest_dir: manifest_dir.into(),
            links_file: links_file.into(),
            current: ArcSwap::from_pointee(Snapshot::default()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn from_paths(paths: &ServicePaths) -> Self {
        Self::new(paths.packages_dir.clone(), paths.teams_file.clone())
    }

    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    pub fn links_file(&self) -> &Path {
        &self.links_file
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Every team owning `package` in the active snapshot
    pub fn lookup(&self, package: &str) -> Vec<TeamMatch> {
        self.current.load().lookup(package)
    }

    /// True while a refresh holds the guard
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Rebuild the snapshot from the manifest directory and link file.
    ///
    /// Returns [`RefreshOutcome::Skipped`] immediately if another refresh is
    /// running. On error the active snapshot is left untouched.
    #[instrument(skip(self), fields(manifest_dir = ?self.manifest_dir))]
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let Some(_guard) = RefreshGuard::try_acquire(&self.refreshing) else {
            debug!("Refresh already in progress, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        let start = Instant::now();
        let manifests = source::read_manifests(&self.manifest_dir).await?;
        let links = source::read_links(&self.links_file).await;

        // Only one refresh runs at a time, so load-then-store cannot race
        let generation = self.current.load().generation + 1;
        let snapshot = Snapshot::new(generation, manifests.teams, links.links);

        let stats = RefreshStats {
            generation,
            teams: snapshot.teams.len(),
            prefixes: snapshot.prefix_count(),
            links: snapshot.links.len(),
            skipped_manifests: manifests.skipped,
            links_available: links.available,
        };

        self.current.store(Arc::new(snapshot));

        info!(
            generation,
            teams = stats.teams,
            links = stats.links,
            skipped = stats.skipped_manifests,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Published ownership snapshot"
        );

        Ok(RefreshOutcome::Refreshed(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio::fs;

    async fn fixture(teams: &[(&str, &str)], links: Option<&str>) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let packages = temp_dir.path().join("packages");
        fs::create_dir(&packages).await.unwrap();
        for (name, content) in teams {
            fs::write(packages.join(name), content).await.unwrap();
        }
        if let Some(links) = links {
            fs::write(temp_dir.path().join("teams.properties"), links)
                .await
                .unwrap();
        }
        temp_dir
    }

    fn registry_for(dir: &TempDir) -> TeamRegistry {
        TeamRegistry::new(
            dir.path().join("packages"),
            dir.path().join("teams.properties"),
        )
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = TeamRegistry::new("/nowhere/packages", "/nowhere/teams.properties");
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.generation(), 0);
        assert!(snapshot.loaded_at().is_none());
        assert!(snapshot.teams().is_empty());
        assert!(registry.lookup("com.acme").is_empty());
    }

    #[test]
    fn test_prefix_match_is_not_segment_aware() {
        let team = Team::new("foo", vec!["com.foo".to_string()]);
        assert!(team.owns("com.foo"));
        assert!(team.owns("com.foobar"));
        assert!(team.owns("com.foo.bar"));
        assert!(!team.owns("com.fo"));
        assert!(!team.owns("org.com.foo"));
    }

    #[test]
    fn test_empty_prefix_owns_everything() {
        let team = Team::new("all", vec![String::new()]);
        assert!(team.owns(""));
        assert!(team.owns("anything"));
        assert!(!Team::new("none", vec![]).owns(""));
    }

    #[test]
    fn test_snapshot_lookup_reports_each_team_once() {
        let snapshot = Snapshot::new(
            1,
            vec![
                Team::new("Payments", vec!["com.acme".into(), "com.acme.billing".into()]),
                Team::new("Search", vec!["com.acme.search".into()]),
                Team::new("Platform", vec!["com".into()]),
            ],
            HashMap::from([("payments".to_string(), "https://wiki/payments".to_string())]),
        );

        assert_eq!(
            snapshot.lookup("com.acme.billing"),
            vec![
                TeamMatch {
                    team: "Payments".into(),
                    link: "https://wiki/payments".into(),
                },
                TeamMatch {
                    team: "Platform".into(),
                    link: String::new(),
                },
            ]
        );
        assert!(snapshot.lookup("org.other").is_empty());
    }

    #[test]
    fn test_link_lookup_is_case_insensitive() {
        let snapshot = Snapshot::new(
            1,
            vec![],
            HashMap::from([("payments".to_string(), "https://wiki/payments".to_string())]),
        );
        assert_eq!(snapshot.link_for("Payments"), "https://wiki/payments");
        assert_eq!(snapshot.link_for("PAYMENTS"), "https://wiki/payments");
        assert_eq!(snapshot.link_for("search"), "");
    }

    #[tokio::test]
    async fn test_refresh_publishes_new_generation() {
        let dir = fixture(
            &[("payments", "com.acme.billing\n")],
            Some("payments=https://wiki/payments\n"),
        )
        .await;
        let registry = registry_for(&dir);

        let outcome = registry.refresh().await.unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed(RefreshStats {
                generation: 1,
                teams: 1,
                prefixes: 1,
                links: 1,
                skipped_manifests: 0,
                links_available: true,
            })
        );
        assert!(!registry.is_refreshing());
        assert_eq!(registry.snapshot().generation(), 1);
        assert!(registry.snapshot().loaded_at().is_some());
    }

    #[tokio::test]
    async fn test_refresh_skips_while_guard_is_held() {
        let dir = fixture(&[("payments", "com.acme")], None).await;
        let registry = registry_for(&dir);

        let guard = RefreshGuard::try_acquire(&registry.refreshing).unwrap();
        assert!(registry.is_refreshing());
        assert_eq!(registry.refresh().await.unwrap(), RefreshOutcome::Skipped);
        assert_eq!(registry.snapshot().generation(), 0);

        drop(guard);
        assert!(matches!(
            registry.refresh().await.unwrap(),
            RefreshOutcome::Refreshed(_)
        ));
        assert_eq!(registry.snapshot().generation(), 1);
    }

    #[tokio::test]
    async fn test_guard_released_after_failed_refresh() {
        let registry = TeamRegistry::new("/nonexistent/packages", "/nonexistent/teams");
        assert!(registry.refresh().await.is_err());
        assert!(!registry.is_refreshing());
        assert!(RefreshGuard::try_acquire(&registry.refreshing).is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let dir = fixture(&[("payments", "com.acme")], None).await;
        let registry = registry_for(&dir);
        registry.refresh().await.unwrap();

        fs::remove_dir_all(dir.path().join("packages")).await.unwrap();
        assert!(registry.refresh().await.is_err());

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(registry.lookup("com.acme.x").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_link_file_still_updates_teams() {
        let dir = fixture(&[("payments", "com.acme")], Some("payments=old\n")).await;
        let registry = registry_for(&dir);
        registry.refresh().await.unwrap();
        assert_eq!(registry.lookup("com.acme")[0].link, "old");

        fs::remove_file(dir.path().join("teams.properties"))
            .await
            .unwrap();
        fs::write(dir.path().join("packages").join("search"), "com.search")
            .await
            .unwrap();

        let RefreshOutcome::Refreshed(stats) = registry.refresh().await.unwrap() else {
            panic!("expected a refresh");
        };
        assert!(!stats.links_available);
        assert_eq!(stats.teams, 2);
        assert_eq!(registry.lookup("com.acme")[0].link, "");
        assert_eq!(registry.lookup("com.search")[0].team, "search");
    }

    #[tokio::test]
    async fn test_old_snapshot_survives_while_held() {
        let dir = fixture(&[("payments", "com.acme")], None).await;
        let registry = registry_for(&dir);
        registry.refresh().await.unwrap();

        let held = registry.snapshot();
        fs::write(dir.path().join("packages").join("payments"), "org.other")
            .await
            .unwrap();
        registry.refresh().await.unwrap();

        // The reader's generation is intact after the swap
        assert_eq!(held.generation(), 1);
        assert_eq!(held.lookup("com.acme").len(), 1);
        assert!(registry.lookup("com.acme").is_empty());
    }
}
