//! whoowns - find the teams owning the packages in a stack trace
//!
//! Loads team manifests into the ownership registry and serves lookups over
//! HTTP or from the command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, IsTerminal, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use whoowns_core::{query, RefreshOutcome, RefreshStats, ServiceConfig, TeamRegistry};

mod render;
mod server;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "whoowns",
    about = "Map stack-trace identifiers to the teams that own them",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Configuration file (defaults to ./whoowns.yml, then the user config dir)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding packages/ and teams.properties
    #[clap(long, global = true)]
    root: Option<PathBuf>,

    /// Manifest directory, overrides <root>/packages
    #[clap(long, global = true)]
    packages_dir: Option<PathBuf>,

    /// Link file, overrides <root>/teams.properties
    #[clap(long, global = true)]
    teams_file: Option<PathBuf>,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Serve the lookup page, JSON API and refresh endpoint over HTTP
    Serve {
        /// Address to bind, overrides the configured one
        #[clap(long)]
        listen: Option<SocketAddr>,

        /// Rebuild the registry every N seconds
        #[clap(long)]
        refresh_interval: Option<u64>,
    },

    /// Resolve owners for identifiers given as arguments or on stdin
    Lookup {
        /// Identifiers or stack frames, one per argument
        lines: Vec<String>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Load the manifests once and report what was found
    Verify {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },
}

/// Initialize tracing with CLI flags
///
/// `RUST_LOG` directives are layered on top of --log-level. Logs always go to
/// stderr so `lookup --json` output stays clean.
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());
    if let Ok(env) = std::env::var(EnvFilter::DEFAULT_ENV) {
        for directive in env.split(',').filter(|d| !d.is_empty()) {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
    }

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Resolve configuration: file first, then CLI overrides
fn load_config(cli: &Cli) -> Result<ServiceConfig> {
    let config =
        ServiceConfig::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    let config = apply_overrides(cli, config);
    config.validate()?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn apply_overrides(cli: &Cli, mut config: ServiceConfig) -> ServiceConfig {
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(packages_dir) = &cli.packages_dir {
        config.packages_dir = Some(packages_dir.clone());
    }
    if let Some(teams_file) = &cli.teams_file {
        config.teams_file = Some(teams_file.clone());
    }
    if let Command::Serve {
        listen,
        refresh_interval,
    } = &cli.command
    {
        if let Some(listen) = listen {
            config.listen = *listen;
        }
        if refresh_interval.is_some() {
            config.refresh_interval_secs = *refresh_interval;
        }
    }
    config
}

/// Build the registry and load it once
async fn load_registry(config: &ServiceConfig) -> Result<(TeamRegistry, RefreshStats)> {
    let paths = config.paths();
    info!("Manifest directory: {:?}", paths.packages_dir);
    info!("Link file: {:?}", paths.teams_file);

    let registry = TeamRegistry::from_paths(&paths);
    match registry
        .refresh()
        .await
        .context("Failed to load ownership manifests")?
    {
        RefreshOutcome::Refreshed(stats) => Ok((registry, stats)),
        RefreshOutcome::Skipped => bail!("Initial load was unexpectedly skipped"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);

    let config = load_config(&cli)?;

    match cli.command {
        Command::Serve { .. } => serve_command(config).await,
        Command::Lookup { lines, json } => lookup_command(config, lines, json).await,
        Command::Verify { json } => verify_command(config, json).await,
    }
}

async fn serve_command(config: ServiceConfig) -> Result<()> {
    let (registry, stats) = load_registry(&config).await?;
    info!(
        "Loaded {} teams with {} prefixes and {} links",
        stats.teams, stats.prefixes, stats.links
    );

    server::serve(
        Arc::new(registry),
        config.listen,
        config.refresh_interval(),
    )
    .await
}

// Table row structure for lookup display
#[derive(Tabled)]
struct LookupTableRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Team")]
    team: String,
    #[tabled(rename = "Link")]
    link: String,
}

async fn lookup_command(config: ServiceConfig, lines: Vec<String>, json: bool) -> Result<()> {
    let text = if lines.is_empty() {
        if io::stdin().is_terminal() {
            bail!("No identifiers given. Pass them as arguments or pipe them on stdin.");
        }
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read identifiers from stdin")?;
        buffer
    } else {
        lines.join("\n")
    };

    let (registry, _) = load_registry(&config).await?;
    let evaluation = query::evaluate(&registry, &query::Query::Text(text));

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
        return Ok(());
    }

    let mut table_rows = Vec::new();
    for line in evaluation.lines() {
        if line.matches.is_empty() {
            table_rows.push(LookupTableRow {
                package: line.package.clone(),
                team: "-".to_string(),
                link: "-".to_string(),
            });
        }
        for m in &line.matches {
            table_rows.push(LookupTableRow {
                package: line.package.clone(),
                team: m.team.clone(),
                link: if m.link.is_empty() {
                    "-".to_string()
                } else {
                    m.link.clone()
                },
            });
        }
    }

    if table_rows.is_empty() {
        println!("No identifiers to look up.");
    } else {
        let table = Table::new(&table_rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

// Table row structure for team display
#[derive(Tabled)]
struct TeamTableRow {
    #[tabled(rename = "Team")]
    team: String,
    #[tabled(rename = "Prefixes")]
    prefixes: usize,
    #[tabled(rename = "Link")]
    link: String,
}

async fn verify_command(config: ServiceConfig, json: bool) -> Result<()> {
    let (registry, stats) = load_registry(&config).await?;
    let snapshot = registry.snapshot();

    if json {
        let teams: Vec<_> = snapshot
            .teams()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "prefixes": t.prefixes(),
                    "link": snapshot.link_for(t.name()),
                })
            })
            .collect();
        let output = serde_json::json!({
            "stats": stats,
            "teams": teams,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "Loaded {} teams, {} prefixes, {} links",
        stats.teams, stats.prefixes, stats.links
    );
    if stats.skipped_manifests > 0 {
        println!("Skipped {} unreadable manifests", stats.skipped_manifests);
    }
    if !stats.links_available {
        println!("Link file unavailable: {:?}", registry.links_file());
    }

    let mut table_rows: Vec<TeamTableRow> = snapshot
        .teams()
        .iter()
        .map(|t| TeamTableRow {
            team: t.name().to_string(),
            prefixes: t.prefixes().len(),
            link: match snapshot.link_for(t.name()) {
                "" => "-".to_string(),
                link => link.to_string(),
            },
        })
        .collect();
    table_rows.sort_by(|a, b| a.team.cmp(&b.team));

    if !table_rows.is_empty() {
        let table = Table::new(&table_rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string();
        println!("\n{table}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "whoowns",
            "--root",
            "/srv/owners",
            "--teams-file",
            "/etc/links.properties",
            "serve",
            "--listen",
            "0.0.0.0:9000",
            "--refresh-interval",
            "30",
        ]);
        let config = apply_overrides(&cli, ServiceConfig::default());

        let paths = config.paths();
        assert_eq!(paths.packages_dir, PathBuf::from("/srv/owners/packages"));
        assert_eq!(paths.teams_file, PathBuf::from("/etc/links.properties"));
        assert_eq!(config.listen.to_string(), "0.0.0.0:9000");
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_file_values_survive_without_flags() {
        let cli = Cli::parse_from(["whoowns", "verify"]);
        let file = ServiceConfig::from_yaml("root: /data\nrefresh_interval_secs: 10\n").unwrap();
        let config = apply_overrides(&cli, file.clone());
        assert_eq!(config, file);
    }

    #[test]
    fn test_lookup_accepts_positional_lines() {
        let cli = Cli::parse_from(["whoowns", "lookup", "--json", "a.b.C.d()", "x.y"]);
        match cli.command {
            Command::Lookup { lines, json } => {
                assert!(json);
                assert_eq!(lines, vec!["a.b.C.d()", "x.y"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
