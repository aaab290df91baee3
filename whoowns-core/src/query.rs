//! Query evaluation - per-request orchestration.
//!
//! A query is a block of text, one identifier per line. Each line is
//! resolved to a package and looked up against a single snapshot, so all
//! lines of one request see the same registry generation.

use serde::Serialize;

use crate::registry::{Snapshot, TeamMatch, TeamRegistry};
use crate::resolver::resolve_package;
use crate::text::split_lines;

/// Query input as received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// No query parameter at all
    Absent,
    /// A query parameter, possibly empty
    Text(String),
}

impl Query {
    pub fn from_param(param: Option<String>) -> Self {
        match param {
            Some(text) => Query::Text(text),
            None => Query::Absent,
        }
    }
}

/// Owning teams for one input line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineResult {
    /// The line as given
    pub input: String,
    /// Package resolved from the line
    pub package: String,
    /// Owning teams in snapshot order
    pub matches: Vec<TeamMatch>,
}

/// Outcome of evaluating a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evaluation {
    /// No query was supplied
    Greeting,
    /// One entry per input line, in input order
    Results {
        generation: u64,
        lines: Vec<LineResult>,
    },
}

impl Evaluation {
    /// Per-line results; empty for a greeting
    pub fn lines(&self) -> &[LineResult] {
        match self {
            Evaluation::Greeting => &[],
            Evaluation::Results { lines, .. } => lines,
        }
    }

    pub fn is_greeting(&self) -> bool {
        matches!(self, Evaluation::Greeting)
    }
}

/// Evaluate a query against the registry's current snapshot
pub fn evaluate(registry: &TeamRegistry, query: &Query) -> Evaluation {
    match query {
        Query::Absent => Evaluation::Greeting,
        Query::Text(text) => evaluate_text(&registry.snapshot(), text),
    }
}

/// Evaluate query text against one snapshot
pub fn evaluate_text(snapshot: &Snapshot, text: &str) -> Evaluation {
    let lines = split_lines(text)
        .map(|line| {
            let package = resolve_package(line);
            LineResult {
                input: line.to_owned(),
                package: package.to_owned(),
                matches: snapshot.lookup(package),
            }
        })
        .collect();

    Evaluation::Results {
        generation: snapshot.generation(),
        lines,
    }
}
