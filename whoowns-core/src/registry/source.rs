//! Ownership source reader.
//!
//! Reads the flat-file source of truth: one manifest per team in the
//! manifest directory, plus a single `key=value` link file. The two halves
//! fail independently: an unreadable directory aborts the load, while a
//! missing link file only empties the link map.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::Team;
use crate::error::{RegistryError, Result};
use crate::text::split_lines;

/// Teams read from the manifest directory
#[derive(Debug, Default)]
pub struct ManifestScan {
    /// Teams in directory-iteration order
    pub teams: Vec<Team>,
    /// Manifests that existed but could not be read
    pub skipped: usize,
}

/// Links read from the link file
#[derive(Debug, Default)]
pub struct LinkScan {
    /// Lowercased team name -> link, verbatim
    pub links: HashMap<String, String>,
    /// False when the link file was missing or unreadable
    pub available: bool,
    /// Lines without a `=` separator
    pub malformed: usize,
}

/// Scan the manifest directory, one team per regular file.
///
/// Fails only when the directory itself cannot be listed. Unreadable
/// manifests are skipped and counted. Invalid UTF-8 in a manifest's content
/// is replaced rather than dropping the team.
pub async fn read_manifests(dir: &Path) -> Result<ManifestScan> {
    let unavailable = |source| RegistryError::ManifestDirUnavailable {
        path: dir.to_path_buf(),
        source,
    };

    info!("Scanning manifests in: {:?}", dir);

    let mut entries = tokio::fs::read_dir(dir).await.map_err(unavailable)?;
    let mut scan = ManifestScan::default();

    while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
        let path = entry.path();

        // Follow symlinks: anything that reads as a regular file is a manifest
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                debug!("Ignoring non-file entry: {:?}", path);
                continue;
            }
            Err(e) => {
                warn!("Skipping manifest {:?}: {}", path, e);
                scan.skipped += 1;
                continue;
            }
        }

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Skipping manifest with non UTF-8 name: {:?}", raw);
                scan.skipped += 1;
                continue;
            }
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                if let Cow::Owned(_) = content {
                    warn!("Manifest {:?} is not valid UTF-8, replacing bad bytes", path);
                }
                let prefixes: Vec<String> = split_lines(&content).map(str::to_owned).collect();
                debug!("Loaded team {:?} with {} prefixes", name, prefixes.len());
                scan.teams.push(Team::new(name, prefixes));
            }
            Err(e) => {
                warn!("Skipping unreadable manifest {:?}: {}", path, e);
                scan.skipped += 1;
            }
        }
    }

    info!(
        "Manifest scan complete: {} teams, {} skipped",
        scan.teams.len(),
        scan.skipped
    );

    Ok(scan)
}

/// Read the link file. Never fails: a missing or unreadable file yields an
/// empty map with `available == false`.
pub async fn read_links(path: &Path) -> LinkScan {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let scan = parse_links(&content);
            info!(
                "Loaded {} links from {:?} ({} malformed lines)",
                scan.links.len(),
                path,
                scan.malformed
            );
            scan
        }
        Err(e) => {
            warn!("Link file {:?} unavailable, serving no links: {}", path, e);
            LinkScan::default()
        }
    }
}

/// Parse link file content.
///
/// Each line splits at the first `=`. The key is lowercased, the value is
/// the untouched remainder of the line. Later duplicates replace earlier
/// ones.
pub fn parse_links(content: &str) -> LinkScan {
    let mut scan = LinkScan {
        available: true,
        ..Default::default()
    };

    for line in split_lines(content) {
        match line.split_once('=') {
            Some((key, value)) => {
                scan.links.insert(key.to_lowercase(), value.to_owned());
            }
            None => {
                debug!("Skipping link line without '=': {:?}", line);
                scan.malformed += 1;
            }
        }
    }

    scan
}
