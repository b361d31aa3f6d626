//! Corrective prompt templates for the refinement loop.
//!
//! `build` is a pure function: the same (draft, diagnostic, kind) always
//! yields the same prompt, which keeps the retry loop reproducible. Each
//! template restates the concrete diagnostic verbatim, names the violated
//! rules and closes with an artifact-only output instruction.

use crate::types::{ErrorKind, SemanticErrorKind};

/// Build the next instruction for the generator after a failed attempt.
pub fn build(previous_draft: &str, diagnostic: &str, kind: ErrorKind) -> String {
    let body = match kind {
        ErrorKind::SyntaxError => syntax_template(diagnostic),
        ErrorKind::Semantic(SemanticErrorKind::InvalidJoinUsage) => join_template(diagnostic),
        ErrorKind::Semantic(_) => semantic_template(diagnostic),
        ErrorKind::GenerationException => generation_template(diagnostic),
        _ => default_template(diagnostic),
    };
    if previous_draft.is_empty() {
        body
    } else {
        format!(
            "{}\n\nYOUR PREVIOUS OUTPUT WAS:\n{}\n\nOutput the corrected RML now:\n",
            body.trim_end(),
            previous_draft
        )
    }
}

fn syntax_template(diagnostic: &str) -> String {
    format!(
        r#"Your previous RML output had a Turtle syntax error:

ERROR: {diagnostic}

COMMON CAUSES:
- Using a prefix (like 'schema:', 'xsd:') without declaring it with @prefix
- Missing period (.) at the end of statements
- Unbalanced brackets or quotes

REQUIREMENTS FOR CORRECT OUTPUT:
- You MUST declare ALL prefixes you use (rml, ql, ex, dct, sosa, geo, xsd, schema, qudt)
- The schema prefix is: @prefix schema: <https://schema.org/> .
- The xsd prefix is: @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
- Every statement must end with a period (.)
- Output ONLY valid Turtle. NO explanations.

Fix the error and output the corrected RML now:
"#
    )
}

fn join_template(diagnostic: &str) -> String {
    format!(
        r#"Your previous RML output had a semantic error:

ERROR: {diagnostic}

CRITICAL RML SYNTAX RULES:
- NEVER use rml:parentTriplesMap and rml:childTriplesMap inside rml:objectMap
- rml:parentTriplesMap/rml:childTriplesMap are for JOINING data sources, not for linking subjects
- To link a subject to another resource, use rml:template or rml:constant in rml:objectMap
- Use rml:reference (not rml:column) for CSV column names
- Use angle brackets < > for URIs, not quotes " "
- Each rml:predicateObjectMap must have exactly one rml:objectMap

CORRECT SYNTAX:
# To link to another resource:
rml:objectMap [
    rml:template "uri-template";
    rml:termType rml:IRI
]

# For CSV column values:
rml:objectMap [
    rml:reference "column_name";
    rml:datatype xsd:float
]

# For constant values:
rml:objectMap [
    rml:constant <uri_value>
]

Fix the RML syntax and output the corrected version:
"#
    )
}

fn semantic_template(diagnostic: &str) -> String {
    format!(
        r#"Your RML output violates the mapping rules:

ERROR: {diagnostic}

CRITICAL RML RULES:
- NEVER use rml:iterator for CSV files (only rml:referenceFormulation ql:CSV)
- NEVER use rml:object (always use rml:objectMap with nested properties)
- Use angle brackets < > for URIs in rml:constant
- Use QUDT units: qudt:DEG_C for temperature, qudt:PERCENT for humidity
- Use rml:reference (not rml:column) for CSV column names
- Each TriplesMap must have rml:logicalSource, rml:subjectMap, and rml:predicateObjectMap
- Always declare the subject class with rml:class (never rml:classifier)

CORRECT SYNTAX:
# Valid CSV source:
rml:logicalSource [
    rml:source "file.csv";
    rml:referenceFormulation ql:CSV
]

# Valid object mapping:
rml:objectMap [
    rml:reference "column_name"
]

Fix the RML and output the corrected version:
"#
    )
}

fn generation_template(diagnostic: &str) -> String {
    format!(
        r#"The previous generation attempt failed before producing a usable draft:

ERROR: {diagnostic}

Generate the complete RML mapping again from the analyses you were given.
Output ONLY valid Turtle RML with all prefix declarations. No explanations,
no JSON, no tool calls, no markdown fences.
"#
    )
}

fn default_template(diagnostic: &str) -> String {
    format!(
        r#"Your previous output was invalid:

ERROR: {diagnostic}

Fix this and output ONLY valid Turtle RML with proper prefix declarations.
Do not return JSON, function calls or markdown fences.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn diagnostic_is_embedded_verbatim() {
        let diagnostic = "Turtle syntax error: expected '.' at line 12";
        let prompt = build("draft", diagnostic, ErrorKind::SyntaxError);
        assert!(prompt.contains(diagnostic));
        assert!(prompt.contains("draft"));
    }

    #[test]
    fn prompts_differ_when_diagnostics_differ() {
        let a = build("same draft", "error one", ErrorKind::SyntaxError);
        let b = build("same draft", "error two", ErrorKind::SyntaxError);
        assert_ne!(a, b);
    }

    #[test]
    fn same_inputs_yield_same_prompt() {
        let a = build("d", "e", ErrorKind::Semantic(SemanticErrorKind::InvalidJoinUsage));
        let b = build("d", "e", ErrorKind::Semantic(SemanticErrorKind::InvalidJoinUsage));
        assert_eq!(a, b);
    }

    #[test]
    fn kind_selects_the_template_family() {
        let join = build(
            "",
            "e",
            ErrorKind::Semantic(SemanticErrorKind::InvalidJoinUsage),
        );
        assert!(join.contains("rml:parentTriplesMap"));

        let iterator = build(
            "",
            "e",
            ErrorKind::Semantic(SemanticErrorKind::InvalidIteratorUsage),
        );
        assert!(iterator.contains("rml:iterator"));

        let generation = build("", "timed out", ErrorKind::GenerationException);
        assert!(generation.contains("failed before producing"));

        let empty = build("", "no content", ErrorKind::EmptyResponse);
        assert!(empty.contains("previous output was invalid"));
    }

    #[test]
    fn empty_draft_omits_previous_output_section() {
        let prompt = build("", "e", ErrorKind::SyntaxError);
        assert!(!prompt.contains("YOUR PREVIOUS OUTPUT"));
    }
}
