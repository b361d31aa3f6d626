//! rmlforge turns a CSV file plus a W3C Thing Description into a validated
//! RML mapping (Turtle), using an LLM generator inside a
//! generate-validate-refine loop.
//!
//! The flow is: analyze the CSV structure, analyze the Thing Description,
//! generate the mapping with per-attempt validation (normalization, semantic
//! pre-checks, Turtle parse), then gate the final artifact through SHACL and
//! persist it. See [`pipeline::Pipeline`] for the entry point.

pub mod classify;
pub mod config;
pub mod error;
pub mod llm;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod refine;
pub mod retry;
pub mod types;
pub mod validate;

pub use error::{Result, RmlForgeError};
pub use pipeline::Pipeline;
