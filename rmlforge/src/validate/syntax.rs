//! Turtle syntax validation backed by the sophia parser.

use crate::types::{ValidationReport, ValidationStage};
use sophia_api::prelude::*;
use sophia_inmem::graph::LightGraph;
use sophia_turtle::parser::turtle::TurtleParser;

/// Syntax validation seam. Production code parses the text as an RDF graph;
/// tests can substitute a stub verdict.
pub trait SyntaxValidator: Send + Sync {
    fn validate(&self, turtle: &str) -> ValidationReport;
}

/// Parses the candidate text as Turtle and reports the parser's own message
/// on failure.
#[derive(Debug, Default)]
pub struct TurtleSyntaxValidator;

impl SyntaxValidator for TurtleSyntaxValidator {
    fn validate(&self, turtle: &str) -> ValidationReport {
        match parse_turtle(turtle) {
            Ok(_) => ValidationReport::passed(ValidationStage::Syntax),
            Err(message) => ValidationReport::failed(
                ValidationStage::Syntax,
                format!("Turtle syntax error: {}", message),
            ),
        }
    }
}

/// Parse Turtle text into an in-memory graph, stringifying the parser error.
pub(crate) fn parse_turtle(turtle: &str) -> Result<LightGraph, String> {
    let parser = TurtleParser { base: None };
    parser
        .parse_str(turtle)
        .collect_triples::<LightGraph>()
        .map_err(|e| e.to_string())
}
