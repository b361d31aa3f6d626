//! Validator chain: payload extraction, Turtle syntax, SHACL conformance.
//!
//! The stages are strictly ordered and each gates the next. Syntax and SHACL
//! are consumed through traits so the retry controller and orchestrator only
//! ever see pass/fail verdicts plus a diagnostic string.

pub mod shacl;
pub mod syntax;

pub use shacl::{ShaclEngine, ShaclValidator};
pub use syntax::{SyntaxValidator, TurtleSyntaxValidator};

use once_cell::sync::Lazy;
use regex::Regex;

static BYTESTRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)^b["'](.*)["']$"#).unwrap());

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)```(?:turtle|ttl)?\s*\n(.*?)```").unwrap());

static TURTLE_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(@prefix|@base|rml:|ql:|ex:|dct:|sosa:)").unwrap());

/// Isolate the Turtle-like payload from surrounding narration.
///
/// Preference order: a fenced ```turtle/```ttl block, then everything from
/// the first recognized prefix or namespace token, then the trimmed input.
/// An empty result is the caller's signal to fail closed as an empty
/// response.
pub fn extract_turtle(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut text = text.trim().to_string();
    // Byte-string artifacts (b'...' wrappers with escaped newlines/quotes)
    // show up when a transport layer stringifies bytes.
    if let Some(caps) = BYTESTRING_RE.captures(&text) {
        text = caps[1].to_string();
    }
    let text = text.replace("\\n", "\n").replace("\\\"", "\"");

    if let Some(caps) = FENCE_RE.captures(&text) {
        return caps[1].trim().to_string();
    }
    if let Some(m) = TURTLE_START_RE.find(&text) {
        return text[m.start()..].trim().to_string();
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TTL: &str = "@prefix ex: <http://example.org/> .\nex:a ex:b ex:c .";

    #[test]
    fn fenced_block_is_preferred() {
        let text = format!("Here is the mapping:\n```turtle\n{}\n```\nDone.", TTL);
        assert_eq!(extract_turtle(&text), TTL);
    }

    #[test]
    fn unlabeled_fence_works_too() {
        let text = format!("```\n{}\n```", TTL);
        assert_eq!(extract_turtle(&text), TTL);
    }

    #[test]
    fn narration_before_prefix_is_stripped() {
        let text = format!("Sure! The corrected mapping is below.\n\n{}", TTL);
        assert_eq!(extract_turtle(&text), TTL);
    }

    #[test]
    fn bytestring_artifacts_are_unwrapped() {
        let wrapped = "b'@prefix ex: <http://example.org/> .\\nex:a ex:b ex:c .'";
        assert_eq!(extract_turtle(wrapped), TTL);
    }

    #[test]
    fn plain_turtle_is_returned_trimmed() {
        let text = format!("  {}  ", TTL);
        assert_eq!(extract_turtle(&text), TTL);
    }

    #[test]
    fn empty_input_yields_empty() {
        assert_eq!(extract_turtle(""), "");
        assert_eq!(extract_turtle("   "), "");
    }
}
