//! Core data model for the generation-validation-refinement loop.
//!
//! Everything here is plain data: attempts are recorded once and never
//! mutated, and the pipeline state lives only for the duration of one run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sub-kinds of semantic anti-patterns detected before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticErrorKind {
    InvalidJoinUsage,
    InvalidClassifierPredicate,
    InvalidIteratorUsage,
    DuplicateObjectSpecification,
    InvalidUnitUri,
}

/// Classification assigned to a failed attempt; drives which corrective
/// prompt template is used next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    EmptyResponse,
    MalformedFunctionCall,
    SyntaxError,
    Semantic(SemanticErrorKind),
    ShaclViolation,
    GenerationException,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::EmptyResponse => write!(f, "empty response"),
            ErrorKind::MalformedFunctionCall => write!(f, "malformed function call"),
            ErrorKind::SyntaxError => write!(f, "Turtle syntax error"),
            ErrorKind::Semantic(k) => write!(f, "semantic error ({:?})", k),
            ErrorKind::ShaclViolation => write!(f, "SHACL violation"),
            ErrorKind::GenerationException => write!(f, "generation exception"),
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success { artifact: String },
    Failure { kind: ErrorKind, message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// One generator attempt, immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based, contiguous within a phase, bounded by the phase budget.
    pub index: u32,
    pub prompt: String,
    /// SHA-256 of the prompt, for cheap identity checks across attempts.
    pub prompt_sha256: String,
    pub raw_output: Option<String>,
    pub normalized_output: Option<String>,
    pub outcome: Outcome,
}

/// Validation stages, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStage {
    Syntax,
    Semantic,
    Shacl,
}

/// Verdict of one validator stage. `diagnostic` is empty when `ok`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub stage: ValidationStage,
    pub ok: bool,
    pub diagnostic: String,
}

impl ValidationReport {
    pub fn passed(stage: ValidationStage) -> Self {
        Self {
            stage,
            ok: true,
            diagnostic: String::new(),
        }
    }

    pub fn failed(stage: ValidationStage, diagnostic: impl Into<String>) -> Self {
        Self {
            stage,
            ok: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Attempt history for one named stage of the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub attempts: Vec<Attempt>,
}

/// Process-wide state scoped to one pipeline run. Created at run start,
/// discarded at run end; nothing persists across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: String,
    pub current_stage: String,
    stages: Vec<StageRecord>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            current_stage: String::new(),
            stages: Vec::new(),
        }
    }

    pub fn enter_stage(&mut self, stage: &str) {
        self.current_stage = stage.to_string();
        if !self.stages.iter().any(|s| s.stage == stage) {
            self.stages.push(StageRecord {
                stage: stage.to_string(),
                attempts: Vec::new(),
            });
        }
    }

    pub fn record_attempt(&mut self, attempt: Attempt) {
        let current = self.current_stage.clone();
        if let Some(record) = self.stages.iter_mut().find(|s| s.stage == current) {
            record.attempts.push(attempt);
        }
    }

    pub fn attempts_for(&self, stage: &str) -> &[Attempt] {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.attempts.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_render_for_progress_lines() {
        assert_eq!(ErrorKind::EmptyResponse.to_string(), "empty response");
        assert_eq!(
            ErrorKind::Semantic(SemanticErrorKind::InvalidJoinUsage).to_string(),
            "semantic error (InvalidJoinUsage)"
        );
        assert_eq!(
            ErrorKind::GenerationException.to_string(),
            "generation exception"
        );
    }

    #[test]
    fn attempts_are_recorded_per_stage() {
        let mut state = PipelineState::new();
        state.enter_stage("csv_analysis");
        state.record_attempt(Attempt {
            index: 1,
            prompt: "p".to_string(),
            prompt_sha256: String::new(),
            raw_output: None,
            normalized_output: None,
            outcome: Outcome::Failure {
                kind: ErrorKind::EmptyResponse,
                message: "empty".to_string(),
            },
        });
        state.enter_stage("rml_generation");
        assert_eq!(state.attempts_for("csv_analysis").len(), 1);
        assert_eq!(state.attempts_for("rml_generation").len(), 0);
        assert!(!state.attempts_for("csv_analysis")[0].outcome.is_success());
    }
}
