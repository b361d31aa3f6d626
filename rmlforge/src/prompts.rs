//! Initial instruction builders for the three phases.
//!
//! Each builder is a pure function of its file inputs; the retry controller
//! only ever sees their output text.

use crate::error::Result;
use serde_json::Value;
use std::path::Path;

/// Namespace prefixes every generated mapping must declare.
pub const PREFIXES: [(&str, &str); 10] = [
    ("rml", "http://www.w3.org/ns/rml#"),
    ("ql", "http://www.w3.org/ns/rml/ql#"),
    ("ex", "http://example.org/"),
    ("dct", "http://purl.org/dc/terms/"),
    ("sosa", "http://www.w3.org/ns/sosa/"),
    ("geo", "http://www.w3.org/2003/01/geo/wgs84_pos#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("schema", "https://schema.org/"),
    ("qudt", "http://qudt.org/vocab/unit/"),
    ("qudt-quantity", "http://qudt.org/vocab/quantity#"),
];

/// All prefix declarations in Turtle syntax, one per line.
pub fn prefix_declarations() -> String {
    PREFIXES
        .iter()
        .map(|(prefix, uri)| format!("@prefix {}: <{}> .", prefix, uri))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First row of the CSV file.
pub fn read_csv_headers(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?;
    Ok(headers.iter().map(String::from).collect())
}

/// Parse a Thing Description JSON document.
pub fn read_td(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Instruction for the data-structure analysis phase.
pub fn construct_data_prompt(csv_path: &Path) -> Result<String> {
    let headers = read_csv_headers(csv_path)?;
    Ok(format!(
        r#"You are a data structure analyzer. Provide only plain text analysis of the following CSV file. DO NOT return any JSON, function calls, or structured responses. Just plain text.

### CSV File: {file}
### Column Headers: [{headers}]

Analyze the CSV structure and provide:
1. A list of each column with its likely semantic meaning
2. Identification of potential key columns (IDs, names, etc.)
3. Notes on data types and potential mapping candidates
4. Any special data types like geospatial or temporal

Plain text analysis:
"#,
        file = file_name(csv_path),
        headers = headers.join(", "),
    ))
}

/// Instruction for the device-description analysis phase.
pub fn construct_td_prompt(td_path: &Path) -> Result<String> {
    let td = read_td(td_path)?;

    let title = td.get("title").and_then(Value::as_str).unwrap_or("Unknown");
    let description = td
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("No description");
    let id = td
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("urn:example:default");
    let context = td.get("@context").cloned().unwrap_or(Value::Array(vec![]));

    let mut property_lines = Vec::new();
    if let Some(properties) = td.get("properties").and_then(Value::as_object) {
        for (name, details) in properties {
            let prop_title = details.get("title").and_then(Value::as_str).unwrap_or(name);
            let prop_description = details
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("");
            let data_type = details
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            property_lines.push(format!(
                "- {} ({}): '{}' - {}",
                name, data_type, prop_title, prop_description
            ));
        }
    }

    Ok(format!(
        r#"You are a semantic analyzer. Provide only plain text analysis of the following Thing Description (TD). DO NOT return any JSON, function calls, or structured responses. Just plain text.

### Thing Description:
TD ID: {id}
TD Title: {title}
TD Description: {description}
TD Context: {context}

### TD Properties:
{properties}

Provide plain text semantic analysis:
1. Identify RDF predicates that should be used based on TD context
2. Note semantic relationships and classes defined in TD
3. Identify which TD properties represent key identifiers, locations, measurements, etc.
4. List appropriate vocabulary mappings from the context (dct, sosa, geo, etc.)

Plain text analysis:
"#,
        id = id,
        title = title,
        description = description,
        context = serde_json::to_string_pretty(&context)?,
        properties = property_lines.join("\n   "),
    ))
}

/// Instruction for the mapping-generation phase, combining both analyses.
pub fn construct_combined_rml_prompt(
    csv_path: &Path,
    csv_analysis: &str,
    td_analysis: &str,
) -> String {
    format!(
        r#"You are an expert RML (RDF Mapping Language) generator for sensor data in smart factories.
Your task is to generate ONLY valid, syntactically correct, and semantically accurate RML mapping rules using **SOSA (Sensor, Observation, Sample, and Actuator Ontology)** and **QUDT**.

### IMPORTANT INSTRUCTIONS:
- OUTPUT ONLY VALID TURTLE SYNTAX. NOTHING ELSE.
- DO NOT RETURN JSON, FUNCTION CALLS, MARKDOWN, EXPLANATIONS, OR ANY TEXT BEFORE/AFTER THE TURTLE.
- DO NOT USE TOOL CALLS.
- START DIRECTLY WITH @prefix declarations.
- DO NOT WRAP IN CODE BLOCKS.

### REQUIRED PREFIXES (MUST BE DECLARED):
{prefixes}

### RML STRUCTURE RULES (MANDATORY):
1. Use ONE TriplesMap for the SENSOR entity (each row = one sensor).
   - Subject: Use rml:template "http://example.org/sensor/{{workstation_id}}"
   - NEVER use rml:reference inside rml:subjectMap — only rml:template or rml:constant
   - Class: sosa:Sensor

2. Use SEPARATE TriplesMaps for OBSERVATIONS (temperature, humidity).
   - Subject: Use rml:template "http://example.org/obs/temp-{{workstation_id}}" (for temp)
   - Subject: Use rml:template "http://example.org/obs/hum-{{workstation_id}}" (for hum)
   - Class: sosa:Observation

3. For sensor properties (name, floor, lat, long, description):
   - Use schema:name, ex:floor, geo:lat, geo:long, dct:description
   - Do NOT use geo:location for floor — use ex:floor instead

4. For observation values:
   - Use sosa:hasSimpleResult for the measured value (e.g., temperature, humidity)
   - Use sosa:observedProperty to link to the QUDT quantitykind (e.g., qudt-quantity:Temperature)
   - Use sosa:madeBySensor to link the observation to its sensor
   - Use qudt:unit to specify the unit (e.g., qudt:DEG_C, qudt:PERCENT)

5. Data Types:
   - Use rml:datatype ONLY with XSD types: xsd:string, xsd:float, xsd:integer
   - NEVER use qudt:DEG_C or any unit as rml:datatype — that is INVALID

6. Units & Properties:
   - Temperature -> observedProperty: <http://qudt.org/vocab/quantitykind/Temperature>, unit: qudt:DEG_C
   - Humidity -> observedProperty: <http://qudt.org/vocab/quantitykind/DimensionlessRatio>, unit: qudt:PERCENT

7. Do NOT use SAREF, SSN, or WOT-TD prefixes. Use only the prefixes listed above.

8. Every statement MUST end with a period (.).
Every triple map MUST have: rml:logicalSource, rml:subjectMap, and at least one rml:predicateObjectMap.

### CONTEXT:
- CSV File: {file}
- CSV Analysis:
{csv_analysis}

- Thing Description Analysis:
{td_analysis}

### CRITICAL SYNTAX RULES:
- NEVER mix RML mapping syntax with actual RDF data syntax
- NEVER output statements like "<uri> a Class; pred obj." outside of TriplesMaps
- Use rml:reference (not rml:column) for CSV columns
- Use angle brackets < > for URIs in rml:constant
- Each rml:predicateObjectMap must have exactly one rml:objectMap

### TASK:
Generate RML mapping with:
1. One TriplesMap for sensors (sosa:Sensor), using workstation_id as template key.
2. One TriplesMap for temperature observations (sosa:Observation).
3. One TriplesMap for humidity observations (sosa:Observation).
4. All values from CSV columns must be mapped using rml:reference.
5. All units must be expressed as qudt:unit triples.
6. All observed properties must be linked to QUDT quantitykind IRIs.

### OUTPUT THE TURTLE NOW (NOTHING ELSE):
"#,
        prefixes = prefix_declarations(),
        file = file_name(csv_path),
    )
}
