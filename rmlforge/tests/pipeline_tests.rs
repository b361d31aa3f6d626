//! End-to-end pipeline tests with a scripted generator and real validators.

use rmlforge::config::{LlmConfig, PipelineConfig, RetryConfig};
use rmlforge::llm::StubLlmProvider;
use rmlforge::{Pipeline, RmlForgeError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const CSV_ANALYSIS_REPLY: &str =
    "The CSV has a workstation_id key column plus temperature and humidity measurements.";
const TD_ANALYSIS_REPLY: &str =
    "The TD describes a factory workstation exposing temperature and humidity properties.";

const VALID_MAPPING: &str = r#"@prefix rml: <http://www.w3.org/ns/rml#> .
@prefix ql: <http://www.w3.org/ns/rml/ql#> .
@prefix ex: <http://example.org/> .
@prefix sosa: <http://www.w3.org/ns/sosa/> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .

ex:SensorMap a rml:TriplesMap ;
    rml:logicalSource [
        rml:source "factory_data.csv" ;
        rml:referenceFormulation ql:CSV
    ] ;
    rml:subjectMap [
        rml:template "http://example.org/sensor/{workstation_id}" ;
        rml:class sosa:Sensor
    ] ;
    rml:predicateObjectMap [
        rml:predicate ex:temperature ;
        rml:objectMap [ rml:reference "temperature" ; rml:datatype xsd:float ]
    ] .
"#;

struct Fixture {
    dir: TempDir,
    data_file: PathBuf,
    td_file: PathBuf,
    shape_file: PathBuf,
    output_file: PathBuf,
}

fn fixture_with_shapes(shapes: &str) -> Fixture {
    let dir = TempDir::new().unwrap();

    let data_file = dir.path().join("factory_data.csv");
    let mut csv = std::fs::File::create(&data_file).unwrap();
    writeln!(csv, "workstation_id,temperature,humidity").unwrap();
    writeln!(csv, "ws1,21.5,40").unwrap();

    let td_file = dir.path().join("td.json");
    std::fs::write(
        &td_file,
        r#"{
            "id": "urn:dev:ws1",
            "title": "Workstation",
            "description": "Factory workstation with ambient sensors",
            "properties": {
                "temperature": {"type": "number", "title": "Temperature"},
                "humidity": {"type": "number", "title": "Humidity"}
            }
        }"#,
    )
    .unwrap();

    let shape_file = dir.path().join("shapes.ttl");
    std::fs::write(&shape_file, shapes).unwrap();

    let output_file = dir.path().join("out").join("mapping.ttl");

    Fixture {
        dir,
        data_file,
        td_file,
        shape_file,
        output_file,
    }
}

fn fixture() -> Fixture {
    // An empty shape graph constrains nothing, so any parseable artifact
    // conforms.
    fixture_with_shapes("")
}

fn pipeline(fixture: &Fixture, stub: Arc<StubLlmProvider>) -> Pipeline {
    let config = PipelineConfig {
        llm: LlmConfig::default(),
        retry: RetryConfig {
            max_attempts: 3,
            backoff_ms: 0,
            send_error_feedback: true,
        },
        output_file: fixture.output_file.clone(),
    };
    Pipeline::new(config, Box::new(stub))
}

#[tokio::test]
async fn happy_path_writes_mapping_in_three_phases() {
    let fx = fixture();
    let stub = Arc::new(StubLlmProvider::with_texts(&[
        CSV_ANALYSIS_REPLY,
        TD_ANALYSIS_REPLY,
        VALID_MAPPING,
    ]));

    let output = pipeline(&fx, stub.clone())
        .run(&fx.data_file, &fx.td_file, &fx.shape_file)
        .await
        .unwrap();

    assert_eq!(output, fx.output_file);
    assert_eq!(stub.call_count(), 3);
    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains("ex:SensorMap a rml:TriplesMap"));
}

#[tokio::test]
async fn classifier_typo_is_refined_and_the_retry_succeeds() {
    // First draft uses rml:classifier; the refinement prompt carries the
    // diagnostic and the second draft passes.
    let bad_draft = VALID_MAPPING.replace("rml:class ", "rml:classifier ");
    let fx = fixture();
    let stub = Arc::new(StubLlmProvider::with_texts(&[
        CSV_ANALYSIS_REPLY,
        TD_ANALYSIS_REPLY,
        &bad_draft,
        VALID_MAPPING,
    ]));

    pipeline(&fx, stub.clone())
        .run(&fx.data_file, &fx.td_file, &fx.shape_file)
        .await
        .unwrap();

    assert_eq!(stub.call_count(), 4);
}

#[tokio::test]
async fn generation_budget_is_exhausted_after_three_attempts() {
    let fx = fixture();
    let stub = Arc::new(StubLlmProvider::with_texts(&[
        CSV_ANALYSIS_REPLY,
        TD_ANALYSIS_REPLY,
        "", // empty response
        "rml:iterator \"$\" appears in this draft",
        "not turtle at all and no prefixes {{{",
        VALID_MAPPING, // never reached
    ]));

    let err = pipeline(&fx, stub.clone())
        .run(&fx.data_file, &fx.td_file, &fx.shape_file)
        .await
        .unwrap_err();

    match err {
        RmlForgeError::Exhausted {
            phase, attempts, ..
        } => {
            assert_eq!(phase, "rml_generation");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
    // 2 analysis calls + exactly 3 generation calls.
    assert_eq!(stub.call_count(), 5);
    assert!(!fx.output_file.exists());
}

#[tokio::test]
async fn shacl_failure_is_terminal_and_does_not_reinvoke_the_generator() {
    let shapes = r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <http://example.org/> .
@prefix rml: <http://www.w3.org/ns/rml#> .

ex:TriplesMapShape a sh:NodeShape ;
    sh:targetClass rml:TriplesMap ;
    sh:property [
        sh:path ex:approvedBy ;
        sh:minCount 1 ;
        sh:message "every triples map must carry an approval marker"
    ] .
"#;
    let fx = fixture_with_shapes(shapes);
    let stub = Arc::new(StubLlmProvider::with_texts(&[
        CSV_ANALYSIS_REPLY,
        TD_ANALYSIS_REPLY,
        VALID_MAPPING,
        VALID_MAPPING, // must never be requested
    ]));

    let err = pipeline(&fx, stub.clone())
        .run(&fx.data_file, &fx.td_file, &fx.shape_file)
        .await
        .unwrap_err();

    match err {
        RmlForgeError::ShaclViolation(diagnostic) => {
            assert!(diagnostic.contains("approval marker"));
        }
        other => panic!("expected ShaclViolation, got {:?}", other),
    }
    assert_eq!(stub.call_count(), 3);
    assert!(!fx.output_file.exists());
}

#[tokio::test]
async fn missing_input_fails_fast_without_calling_the_generator() {
    let fx = fixture();
    let stub = Arc::new(StubLlmProvider::with_texts(&[]));

    let err = pipeline(&fx, stub.clone())
        .run(Path::new("/nonexistent/data.csv"), &fx.td_file, &fx.shape_file)
        .await
        .unwrap_err();

    assert!(matches!(err, RmlForgeError::InputMissing(_)));
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn output_parent_directories_are_created() {
    let mut fx = fixture();
    fx.output_file = fx
        .dir
        .path()
        .join("deeply")
        .join("nested")
        .join("dirs")
        .join("mapping.ttl");
    let stub = Arc::new(StubLlmProvider::with_texts(&[
        CSV_ANALYSIS_REPLY,
        TD_ANALYSIS_REPLY,
        VALID_MAPPING,
    ]));

    let output = pipeline(&fx, stub)
        .run(&fx.data_file, &fx.td_file, &fx.shape_file)
        .await
        .unwrap();

    assert!(output.exists());
    assert_eq!(output, fx.output_file);
}

#[tokio::test]
async fn fenced_draft_is_unwrapped_before_persisting() {
    let fenced = format!("Here is the mapping:\n```turtle\n{}\n```", VALID_MAPPING);
    let fx = fixture();
    let stub = Arc::new(StubLlmProvider::with_texts(&[
        CSV_ANALYSIS_REPLY,
        TD_ANALYSIS_REPLY,
        &fenced,
    ]));

    let output = pipeline(&fx, stub)
        .run(&fx.data_file, &fx.td_file, &fx.shape_file)
        .await
        .unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(!written.contains("```"));
    assert!(!written.contains("Here is the mapping"));
    assert!(written.starts_with("@prefix rml:"));
}

#[tokio::test]
async fn empty_analysis_reply_is_retried() {
    let fx = fixture();
    let stub = Arc::new(StubLlmProvider::with_texts(&[
        "",
        CSV_ANALYSIS_REPLY,
        TD_ANALYSIS_REPLY,
        VALID_MAPPING,
    ]));

    pipeline(&fx, stub.clone())
        .run(&fx.data_file, &fx.td_file, &fx.shape_file)
        .await
        .unwrap();

    assert_eq!(stub.call_count(), 4);
}
