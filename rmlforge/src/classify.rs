//! Pattern-based pre-checks for known RML anti-patterns.
//!
//! These constructs are cheap to detect by inspection and short-circuit the
//! expensive parse. The rules form a declarative table evaluated in a fixed
//! order; the first match wins, so the same draft always yields the same
//! classification and the same refinement prompt.

use crate::error::RmlForgeError;
use crate::types::{ErrorKind, SemanticErrorKind};
use once_cell::sync::Lazy;
use regex::Regex;

static DOUBLE_OBJECT_RE: Lazy<Regex> = Lazy::new(|| {
    // A textual object alongside a nested objectMap in the same statement.
    Regex::new(r"(?s)rml:predicate\s+[^;]*rml:object\s+[^;]*rml:objectMap").unwrap()
});

static JOIN_IN_OBJECT_MAP_RE: Lazy<Regex> = Lazy::new(|| {
    // parentTriplesMap + childTriplesMap nested inside one objectMap block.
    // Heuristic over a bounded bracket span, not a parser.
    Regex::new(r"(?s)rml:objectMap\s*\[\s*[^\]]*rml:parentTriplesMap\s*[^\]]*rml:childTriplesMap")
        .unwrap()
});

enum Predicate {
    Contains(&'static str),
    Matches(&'static Lazy<Regex>),
}

struct SemanticRule {
    kind: SemanticErrorKind,
    message: &'static str,
    predicate: Predicate,
}

impl SemanticRule {
    fn matches(&self, draft: &str) -> bool {
        match &self.predicate {
            Predicate::Contains(needle) => draft.contains(needle),
            Predicate::Matches(re) => re.is_match(draft),
        }
    }
}

/// Ordered rule table; order is part of the contract.
static RULES: [SemanticRule; 6] = [
    SemanticRule {
        kind: SemanticErrorKind::InvalidClassifierPredicate,
        message: "Invalid RML: rml:classifier should be rml:class",
        predicate: Predicate::Contains("rml:classifier"),
    },
    SemanticRule {
        kind: SemanticErrorKind::DuplicateObjectSpecification,
        message: "Invalid RML: cannot have both rml:object and rml:objectMap in the same predicateObjectMap",
        predicate: Predicate::Matches(&DOUBLE_OBJECT_RE),
    },
    SemanticRule {
        kind: SemanticErrorKind::InvalidUnitUri,
        message: "Invalid unit URI: use qudt:DEG_C instead of http://www.w3.org/2009/08/skos-reference/skos.html#Celsius",
        predicate: Predicate::Contains("skos-reference/skos.html#Celsius"),
    },
    SemanticRule {
        kind: SemanticErrorKind::InvalidUnitUri,
        message: "Invalid unit URI: use qudt:PERCENT instead of http://www.w3.org/2009/08/skos-reference/skos.html#Percent",
        predicate: Predicate::Contains("skos-reference/skos.html#Percent"),
    },
    SemanticRule {
        kind: SemanticErrorKind::InvalidIteratorUsage,
        message: "Invalid RML: use rml:referenceFormulation ql:CSV for CSV files, not rml:iterator",
        predicate: Predicate::Contains("rml:iterator"),
    },
    SemanticRule {
        kind: SemanticErrorKind::InvalidJoinUsage,
        message: "Invalid RML: rml:parentTriplesMap and rml:childTriplesMap used inside rml:objectMap. This is incorrect syntax for linking resources.",
        predicate: Predicate::Matches(&JOIN_IN_OBJECT_MAP_RE),
    },
];

/// Run the rule battery against a draft. At most one kind is reported even
/// when several anti-patterns co-occur.
pub fn classify(draft: &str) -> Option<(SemanticErrorKind, &'static str)> {
    RULES
        .iter()
        .find(|rule| rule.matches(draft))
        .map(|rule| (rule.kind, rule.message))
}

/// Classification for errors raised while calling the generator.
pub fn classify_exception(_error: &RmlForgeError) -> ErrorKind {
    ErrorKind::GenerationException
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_draft_has_no_classification() {
        let draft = r#"
            ex:SensorMap a rml:TriplesMap ;
                rml:predicateObjectMap [
                    rml:predicate ex:temperature ;
                    rml:objectMap [ rml:reference "temperature" ]
                ] .
        "#;
        assert_eq!(classify(draft), None);
    }

    #[test]
    fn classifier_typo_is_flagged() {
        let draft = "rml:subjectMap [ rml:classifier sosa:Sensor ]";
        let (kind, message) = classify(draft).unwrap();
        assert_eq!(kind, SemanticErrorKind::InvalidClassifierPredicate);
        assert!(message.contains("rml:class"));
    }

    #[test]
    fn join_nested_in_object_map_is_flagged_without_parsing() {
        let draft = r#"
            rml:predicateObjectMap [
                rml:predicate sosa:madeBySensor ;
                rml:objectMap [
                    rml:parentTriplesMap ex:SensorMap ;
                    rml:childTriplesMap ex:ObservationMap
                ]
            ] .
        "#;
        let (kind, _) = classify(draft).unwrap();
        assert_eq!(kind, SemanticErrorKind::InvalidJoinUsage);
    }

    #[test]
    fn join_outside_object_map_is_not_flagged() {
        let draft = "rml:joinCondition [ rml:parentTriplesMap ex:A ; rml:childTriplesMap ex:B ]";
        assert_eq!(classify(draft), None);
    }

    #[test]
    fn deprecated_unit_uris_are_flagged() {
        let celsius = "qudt:unit <http://www.w3.org/2009/08/skos-reference/skos.html#Celsius>";
        let (kind, message) = classify(celsius).unwrap();
        assert_eq!(kind, SemanticErrorKind::InvalidUnitUri);
        assert!(message.contains("qudt:DEG_C"));

        let percent = "qudt:unit <http://www.w3.org/2009/08/skos-reference/skos.html#Percent>";
        let (_, message) = classify(percent).unwrap();
        assert!(message.contains("qudt:PERCENT"));
    }

    #[test]
    fn iterator_on_csv_is_flagged() {
        let draft = r#"rml:logicalSource [ rml:source "f.csv" ; rml:iterator "$" ]"#;
        let (kind, _) = classify(draft).unwrap();
        assert_eq!(kind, SemanticErrorKind::InvalidIteratorUsage);
    }

    #[test]
    fn first_matching_rule_wins_when_patterns_co_occur() {
        // Both the classifier typo and the iterator misuse are present; the
        // classifier rule sits earlier in the table and must win every time.
        let draft = "rml:classifier sosa:Sensor . rml:iterator \"$\"";
        for _ in 0..3 {
            let (kind, _) = classify(draft).unwrap();
            assert_eq!(kind, SemanticErrorKind::InvalidClassifierPredicate);
        }
    }

    #[test]
    fn double_object_specification_is_flagged() {
        let draft = r#"
            rml:predicateObjectMap [
                rml:predicate ex:name rml:object "direct" rml:objectMap [ rml:reference "name" ]
            ]
        "#;
        let (kind, _) = classify(draft).unwrap();
        assert_eq!(kind, SemanticErrorKind::DuplicateObjectSpecification);
    }
}
