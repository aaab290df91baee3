//! HTML rendering of query evaluations.
//!
//! Output is a single self-contained page: the query form followed by one
//! section per input line. Values are escaped by handlebars.

use anyhow::Result;
use handlebars::Handlebars;
use serde::Serialize;
use whoowns_core::query::{Evaluation, LineResult};

const TEMPLATE: &str = include_str!("../templates/index.html");

const GREETING: &str = "Paste stack frames or package names, one per line, to find the owning teams.";

#[derive(Debug, Serialize)]
struct PageContext<'a> {
    query: &'a str,
    greeting: bool,
    greeting_text: &'static str,
    generation: Option<u64>,
    lines: &'a [LineResult],
}

/// Render the full page. `query_text` refills the form.
pub fn page(evaluation: &Evaluation, query_text: Option<&str>) -> Result<String> {
    let generation = match evaluation {
        Evaluation::Greeting => None,
        Evaluation::Results { generation, .. } => Some(*generation),
    };
    let context = PageContext {
        query: query_text.unwrap_or(""),
        greeting: evaluation.is_greeting(),
        greeting_text: GREETING,
        generation,
        lines: evaluation.lines(),
    };

    let mut handlebars = Handlebars::new();
    handlebars.register_template_string("index", TEMPLATE)?;
    let html = handlebars.render("index", &context)?;
    Ok(html)
}
