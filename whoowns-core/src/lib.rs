//! whoowns core library.
//!
//! Maps stack-frame identifiers to the teams owning their packages, backed
//! by a reloadable directory of ownership manifests.

pub mod config;
pub mod error;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod text;

pub use config::{ServiceConfig, ServicePaths};
pub use error::{RegistryError, Result};
pub use query::{evaluate, Evaluation, LineResult, Query};
pub use registry::{RefreshOutcome, RefreshStats, Snapshot, Team, TeamMatch, TeamRegistry};
pub use resolver::resolve_package;
