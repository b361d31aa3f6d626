//! SHACL conformance checking.
//!
//! A deliberately small engine: shapes are compiled once from the configured
//! shape graph, then validated against the data graph with `rdfs:subClassOf`
//! closure applied when selecting targets (a shape targeting `ex:Device`
//! also applies to instances of its subclasses). Covers the constraint
//! components the mapping shapes in this domain actually use: `sh:minCount`,
//! `sh:maxCount`, `sh:datatype`, `sh:nodeKind` and `sh:pattern`.

use crate::error::{Result, RmlForgeError};
use crate::types::{ValidationReport, ValidationStage};
use crate::validate::syntax::parse_turtle;
use regex::Regex;
use sophia_api::prelude::*;
use sophia_api::term::TermKind;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";

const SH_NODE_SHAPE: &str = "http://www.w3.org/ns/shacl#NodeShape";
const SH_TARGET_CLASS: &str = "http://www.w3.org/ns/shacl#targetClass";
const SH_PROPERTY: &str = "http://www.w3.org/ns/shacl#property";
const SH_PATH: &str = "http://www.w3.org/ns/shacl#path";
const SH_MIN_COUNT: &str = "http://www.w3.org/ns/shacl#minCount";
const SH_MAX_COUNT: &str = "http://www.w3.org/ns/shacl#maxCount";
const SH_DATATYPE: &str = "http://www.w3.org/ns/shacl#datatype";
const SH_NODE_KIND: &str = "http://www.w3.org/ns/shacl#nodeKind";
const SH_PATTERN: &str = "http://www.w3.org/ns/shacl#pattern";
const SH_MESSAGE: &str = "http://www.w3.org/ns/shacl#message";
const SH_KIND_IRI: &str = "http://www.w3.org/ns/shacl#IRI";
const SH_KIND_LITERAL: &str = "http://www.w3.org/ns/shacl#Literal";
const SH_KIND_BLANK: &str = "http://www.w3.org/ns/shacl#BlankNode";

/// Schema-conformance seam; consumed by the orchestrator as a final gate,
/// never inside the refinement loop.
pub trait ShaclValidator: Send + Sync {
    fn check(&self, data: &str, shapes_path: &Path) -> Result<ValidationReport>;
}

/// A single RDF node, flattened out of the parser's term representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Node {
    Iri(String),
    Blank(String),
    Literal { lexical: String, datatype: String },
}

impl Node {
    fn iri(&self) -> Option<&str> {
        match self {
            Node::Iri(iri) => Some(iri),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Iri(iri) => write!(f, "<{}>", iri),
            Node::Blank(id) => write!(f, "_:{}", id),
            Node::Literal { lexical, .. } => write!(f, "\"{}\"", lexical),
        }
    }
}

/// Flat triple store over parsed Turtle, just enough graph access for shape
/// compilation and validation.
pub(crate) struct SimpleGraph {
    triples: Vec<[Node; 3]>,
}

impl SimpleGraph {
    pub(crate) fn from_turtle(turtle: &str) -> std::result::Result<Self, String> {
        let graph = parse_turtle(turtle)?;
        let mut triples = Vec::new();
        for triple in graph.triples() {
            let triple = triple.map_err(|e| e.to_string())?;
            triples.push([
                to_node(triple.s()),
                to_node(triple.p()),
                to_node(triple.o()),
            ]);
        }
        Ok(Self { triples })
    }

    // The query nodes are only inspected during the lookup; the returned
    // references borrow from the graph alone.
    fn objects<'s>(&'s self, subject: &Node, predicate: &str) -> Vec<&'s Node> {
        self.triples
            .iter()
            .filter_map(|[s, p, o]| {
                if s == subject && p.iri() == Some(predicate) {
                    Some(o)
                } else {
                    None
                }
            })
            .collect()
    }

    fn subjects_where<'s>(&'s self, predicate: &str, object: &Node) -> Vec<&'s Node> {
        self.triples
            .iter()
            .filter_map(|[s, p, o]| {
                if p.iri() == Some(predicate) && o == object {
                    Some(s)
                } else {
                    None
                }
            })
            .collect()
    }

    fn first_object(&self, subject: &Node, predicate: &str) -> Option<&Node> {
        self.objects(subject, predicate).into_iter().next()
    }

    fn first_lexical(&self, subject: &Node, predicate: &str) -> Option<&str> {
        self.objects(subject, predicate)
            .into_iter()
            .find_map(|o| match o {
                Node::Literal { lexical, .. } => Some(lexical.as_str()),
                _ => None,
            })
    }
}

fn to_node<T: Term>(term: T) -> Node {
    match term.kind() {
        TermKind::Iri => Node::Iri(
            term.iri()
                .map(|iri| iri.as_str().to_string())
                .unwrap_or_default(),
        ),
        TermKind::BlankNode => Node::Blank(
            term.bnode_id()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default(),
        ),
        _ => Node::Literal {
            lexical: term
                .lexical_form()
                .map(|l| l.to_string())
                .unwrap_or_default(),
            datatype: term
                .datatype()
                .map(|d| d.as_str().to_string())
                .unwrap_or_default(),
        },
    }
}

/// One compiled `sh:property` block.
struct PropertyConstraint {
    path: String,
    min_count: Option<usize>,
    max_count: Option<usize>,
    datatype: Option<String>,
    node_kind: Option<String>,
    pattern: Option<Regex>,
    message: Option<String>,
}

/// One compiled node shape with its targets.
struct NodeShape {
    target_classes: Vec<String>,
    properties: Vec<PropertyConstraint>,
}

fn compile_shapes(shapes: &SimpleGraph) -> std::result::Result<Vec<NodeShape>, String> {
    let node_shape_class = Node::Iri(SH_NODE_SHAPE.to_string());
    let mut shape_subjects: Vec<Node> = Vec::new();
    let mut seen = HashSet::new();
    // Declared node shapes plus anything that names a target class.
    for subject in shapes
        .subjects_where(RDF_TYPE, &node_shape_class)
        .into_iter()
        .cloned()
        .chain(shapes.triples.iter().filter_map(|[s, p, _]| {
            if p.iri() == Some(SH_TARGET_CLASS) {
                Some(s.clone())
            } else {
                None
            }
        }))
    {
        if seen.insert(subject.clone()) {
            shape_subjects.push(subject);
        }
    }

    let mut compiled = Vec::new();
    for subject in &shape_subjects {
        let target_classes: Vec<String> = shapes
            .objects(subject, SH_TARGET_CLASS)
            .into_iter()
            .filter_map(|o| o.iri().map(String::from))
            .collect();

        let mut properties = Vec::new();
        for prop in shapes.objects(subject, SH_PROPERTY) {
            // Only simple IRI paths; property-path expressions are out of
            // scope for the mapping shapes this system consumes.
            let Some(path) = shapes
                .first_object(prop, SH_PATH)
                .and_then(|o| o.iri().map(String::from))
            else {
                continue;
            };
            let pattern = match shapes.first_lexical(prop, SH_PATTERN) {
                Some(p) => Some(
                    Regex::new(p).map_err(|e| format!("invalid sh:pattern '{}': {}", p, e))?,
                ),
                None => None,
            };
            properties.push(PropertyConstraint {
                path,
                min_count: shapes
                    .first_lexical(prop, SH_MIN_COUNT)
                    .and_then(|l| l.parse().ok()),
                max_count: shapes
                    .first_lexical(prop, SH_MAX_COUNT)
                    .and_then(|l| l.parse().ok()),
                datatype: shapes
                    .first_object(prop, SH_DATATYPE)
                    .and_then(|o| o.iri().map(String::from)),
                node_kind: shapes
                    .first_object(prop, SH_NODE_KIND)
                    .and_then(|o| o.iri().map(String::from)),
                pattern,
                message: shapes.first_lexical(prop, SH_MESSAGE).map(String::from),
            });
        }

        compiled.push(NodeShape {
            target_classes,
            properties,
        });
    }
    Ok(compiled)
}

/// Transitive `rdfs:subClassOf` ancestors, drawn from both the shape and the
/// data graph (the RDFS-level inference the conformance check runs with).
fn subclass_ancestors(graphs: [&SimpleGraph; 2]) -> HashMap<String, HashSet<String>> {
    let mut direct: HashMap<String, HashSet<String>> = HashMap::new();
    for graph in graphs {
        for [s, p, o] in &graph.triples {
            if p.iri() == Some(RDFS_SUBCLASS_OF) {
                if let (Some(sub), Some(sup)) = (s.iri(), o.iri()) {
                    direct
                        .entry(sub.to_string())
                        .or_default()
                        .insert(sup.to_string());
                }
            }
        }
    }
    // Transitive closure; the hierarchies involved are tiny.
    let mut closure = direct.clone();
    loop {
        let mut grew = false;
        let snapshot: Vec<(String, Vec<String>)> = closure
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
            .collect();
        for (sub, supers) in snapshot {
            for sup in supers {
                if let Some(grand) = direct.get(&sup) {
                    let entry = closure.entry(sub.clone()).or_default();
                    for g in grand {
                        grew |= entry.insert(g.clone());
                    }
                }
            }
        }
        if !grew {
            break;
        }
    }
    closure
}

fn focus_nodes<'a>(
    data: &'a SimpleGraph,
    target_class: &str,
    ancestors: &HashMap<String, HashSet<String>>,
) -> Vec<&'a Node> {
    let mut result = Vec::new();
    let mut seen = HashSet::new();
    for [s, p, o] in &data.triples {
        if p.iri() != Some(RDF_TYPE) {
            continue;
        }
        let Some(class) = o.iri() else { continue };
        let matches = class == target_class
            || ancestors
                .get(class)
                .map(|a| a.contains(target_class))
                .unwrap_or(false);
        if matches && seen.insert(s) {
            result.push(s);
        }
    }
    result
}

fn check_property(
    data: &SimpleGraph,
    focus: &Node,
    constraint: &PropertyConstraint,
    messages: &mut Vec<String>,
) {
    let mut report = |default: String| {
        messages.push(constraint.message.clone().unwrap_or(default));
    };

    let values = data.objects(focus, &constraint.path);

    if let Some(min) = constraint.min_count {
        if values.len() < min {
            report(format!(
                "{}: expected at least {} value(s) for <{}>, found {}",
                focus,
                min,
                constraint.path,
                values.len()
            ));
        }
    }
    if let Some(max) = constraint.max_count {
        if values.len() > max {
            report(format!(
                "{}: expected at most {} value(s) for <{}>, found {}",
                focus,
                max,
                constraint.path,
                values.len()
            ));
        }
    }
    if let Some(expected) = &constraint.datatype {
        for value in &values {
            let ok = matches!(value, Node::Literal { datatype, .. } if datatype == expected);
            if !ok {
                report(format!(
                    "{}: value {} for <{}> does not have datatype <{}>",
                    focus, value, constraint.path, expected
                ));
            }
        }
    }
    if let Some(kind) = &constraint.node_kind {
        for value in &values {
            let ok = match kind.as_str() {
                SH_KIND_IRI => matches!(value, Node::Iri(_)),
                SH_KIND_LITERAL => matches!(value, Node::Literal { .. }),
                SH_KIND_BLANK => matches!(value, Node::Blank(_)),
                _ => true,
            };
            if !ok {
                report(format!(
                    "{}: value {} for <{}> is not of node kind <{}>",
                    focus, value, constraint.path, kind
                ));
            }
        }
    }
    if let Some(pattern) = &constraint.pattern {
        for value in &values {
            let text = match value {
                Node::Literal { lexical, .. } => lexical.as_str(),
                Node::Iri(iri) => iri.as_str(),
                Node::Blank(_) => continue,
            };
            if !pattern.is_match(text) {
                report(format!(
                    "{}: value {} for <{}> does not match pattern",
                    focus, value, constraint.path
                ));
            }
        }
    }
}

/// SHACL validation engine over the configured shape graph.
#[derive(Debug, Default)]
pub struct ShaclEngine;

impl ShaclValidator for ShaclEngine {
    fn check(&self, data: &str, shapes_path: &Path) -> Result<ValidationReport> {
        let shapes_src = std::fs::read_to_string(shapes_path).map_err(|e| {
            RmlForgeError::Shapes(format!("cannot read {}: {}", shapes_path.display(), e))
        })?;
        let shapes_graph = SimpleGraph::from_turtle(&shapes_src)
            .map_err(|e| RmlForgeError::Shapes(format!("cannot parse shape graph: {}", e)))?;
        let shapes = compile_shapes(&shapes_graph).map_err(RmlForgeError::Shapes)?;

        // The data graph was already syntax-checked by the time we run, but a
        // parse failure here must still surface as a non-conforming verdict
        // rather than a crash.
        let data_graph = match SimpleGraph::from_turtle(data) {
            Ok(g) => g,
            Err(e) => {
                return Ok(ValidationReport::failed(
                    ValidationStage::Shacl,
                    format!("SHACL validation failed: {}", e),
                ));
            }
        };

        let ancestors = subclass_ancestors([&shapes_graph, &data_graph]);
        let mut messages = Vec::new();
        for shape in &shapes {
            for target in &shape.target_classes {
                for focus in focus_nodes(&data_graph, target, &ancestors) {
                    for constraint in &shape.properties {
                        check_property(&data_graph, focus, constraint, &mut messages);
                    }
                }
            }
        }

        if messages.is_empty() {
            Ok(ValidationReport::passed(ValidationStage::Shacl))
        } else {
            let report = messages
                .iter()
                .map(|m| format!("- {}", m))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(ValidationReport::failed(ValidationStage::Shacl, report))
        }
    }
}
