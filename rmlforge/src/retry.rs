//! Retry controller: drives the generate/validate/refine loop for one phase.
//!
//! Every generator call, including one that raises a transport error, consumes
//! an attempt from the phase budget. Between attempts the controller mutates
//! the prompt through the corrective templates, so no prompt is ever re-sent
//! verbatim.

use crate::classify;
use crate::config::RetryConfig;
use crate::error::{Result, RmlForgeError};
use crate::llm::LlmProvider;
use crate::normalize;
use crate::refine;
use crate::types::{Attempt, ErrorKind, Outcome, PipelineState};
use crate::validate::{self, SyntaxValidator};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters across all phases of a run.
#[derive(Debug, Default)]
pub struct RetryMetrics {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl RetryMetrics {
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> String {
        format!(
            "attempts={} succeeded={} failed={}",
            self.attempts.load(Ordering::Relaxed),
            self.successes.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }
}

fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Retried analysis attempts re-send the original instruction with the
/// diagnostic appended; the Turtle-oriented corrective templates of
/// [`refine::build`] apply to the generation loop only.
fn next_analysis_prompt(initial: &str, failure: &Failure) -> String {
    format!(
        "{}\n\nNOTE: your previous reply was not usable ({}). Reply with the plain text analysis only.\n",
        initial.trim_end(),
        failure.message
    )
}

/// One failed attempt, distilled to what the next prompt needs.
struct Failure {
    kind: ErrorKind,
    message: String,
    draft: String,
}

pub struct RetryController<'a> {
    provider: &'a dyn LlmProvider,
    syntax: &'a dyn SyntaxValidator,
    config: &'a RetryConfig,
    pub metrics: RetryMetrics,
}

impl<'a> RetryController<'a> {
    pub fn new(
        provider: &'a dyn LlmProvider,
        syntax: &'a dyn SyntaxValidator,
        config: &'a RetryConfig,
    ) -> Self {
        Self {
            provider,
            syntax,
            config,
            metrics: RetryMetrics::default(),
        }
    }

    /// Run an analysis phase: the reply only has to be non-empty plain text.
    pub async fn run_analysis(
        &self,
        phase: &str,
        initial_prompt: &str,
        state: &mut PipelineState,
    ) -> Result<String> {
        state.enter_stage(phase);
        let mut prompt = initial_prompt.to_string();
        let mut last: Option<Failure> = None;

        for attempt in 1..=self.config.max_attempts {
            log::info!("{} - attempt {}/{}", phase, attempt, self.config.max_attempts);
            self.metrics.record_attempt();

            match self.provider.ask(&prompt).await {
                Ok(raw) => {
                    let normalized = normalize::normalize(&raw);
                    if normalized.trim().is_empty() {
                        let failure = Failure {
                            kind: ErrorKind::EmptyResponse,
                            message: "generator returned an empty analysis".to_string(),
                            draft: String::new(),
                        };
                        self.record(state, attempt, &prompt, Some(&raw), Some(&normalized), &failure);
                        last = Some(failure);
                    } else {
                        state.record_attempt(Attempt {
                            index: attempt,
                            prompt_sha256: sha256_hex(&prompt),
                            prompt,
                            raw_output: Some(raw),
                            normalized_output: Some(normalized.clone()),
                            outcome: Outcome::Success {
                                artifact: normalized.clone(),
                            },
                        });
                        self.metrics.record_success();
                        log::info!("{} - attempt {} succeeded", phase, attempt);
                        return Ok(normalized);
                    }
                }
                Err(error) => {
                    let failure = Failure {
                        kind: classify::classify_exception(&error),
                        message: error.to_string(),
                        draft: String::new(),
                    };
                    self.record(state, attempt, &prompt, None, None, &failure);
                    last = Some(failure);
                }
            }

            if let Some(failure) = last.as_ref() {
                log::warn!(
                    "{} - attempt {} failed ({}): {}",
                    phase,
                    attempt,
                    failure.kind,
                    failure.message
                );
                if attempt < self.config.max_attempts {
                    prompt = next_analysis_prompt(initial_prompt, failure);
                    tokio::time::sleep(std::time::Duration::from_millis(self.config.backoff_ms))
                        .await;
                }
            }
        }

        self.metrics.record_failure();
        Err(self.exhausted(phase, last))
    }

    /// Run the mapping-generation phase with the full validation battery:
    /// reply shape, emptiness, semantic pre-checks, payload extraction and
    /// Turtle syntax. Conformance checking is deliberately not part of this
    /// loop.
    pub async fn run_generation(
        &self,
        phase: &str,
        initial_prompt: &str,
        state: &mut PipelineState,
    ) -> Result<String> {
        state.enter_stage(phase);
        let mut prompt = initial_prompt.to_string();
        let mut last: Option<Failure> = None;

        for attempt in 1..=self.config.max_attempts {
            log::info!("{} - attempt {}/{}", phase, attempt, self.config.max_attempts);
            self.metrics.record_attempt();

            match self.provider.ask(&prompt).await {
                Ok(raw) => {
                    let normalized = normalize::normalize(&raw);
                    match self.validate_draft(&normalized) {
                        Ok(()) => {
                            state.record_attempt(Attempt {
                                index: attempt,
                                prompt_sha256: sha256_hex(&prompt),
                                prompt,
                                raw_output: Some(raw),
                                normalized_output: Some(normalized.clone()),
                                outcome: Outcome::Success {
                                    artifact: normalized.clone(),
                                },
                            });
                            self.metrics.record_success();
                            log::info!("{} - attempt {} succeeded", phase, attempt);
                            return Ok(normalized);
                        }
                        Err(failure) => {
                            self.record(
                                state,
                                attempt,
                                &prompt,
                                Some(&raw),
                                Some(&normalized),
                                &failure,
                            );
                            last = Some(failure);
                        }
                    }
                }
                Err(error) => {
                    let failure = Failure {
                        kind: classify::classify_exception(&error),
                        message: error.to_string(),
                        draft: String::new(),
                    };
                    self.record(state, attempt, &prompt, None, None, &failure);
                    last = Some(failure);
                }
            }

            if let Some(failure) = last.as_ref() {
                log::warn!(
                    "{} - attempt {} failed ({}): {}",
                    phase,
                    attempt,
                    failure.kind,
                    failure.message
                );
                if attempt < self.config.max_attempts {
                    prompt = self.next_prompt(failure);
                    tokio::time::sleep(std::time::Duration::from_millis(self.config.backoff_ms))
                        .await;
                }
            }
        }

        self.metrics.record_failure();
        Err(self.exhausted(phase, last))
    }

    /// Cheap-to-expensive validation order; the first failure wins.
    ///
    /// A recognized tool call has already been summarized to plain text by
    /// the normalizer, so only a reply that is still a function call after
    /// normalization counts as malformed.
    fn validate_draft(&self, normalized: &str) -> std::result::Result<(), Failure> {
        if normalize::is_function_call(normalized) {
            return Err(Failure {
                kind: ErrorKind::MalformedFunctionCall,
                message: "generator returned a function call instead of Turtle".to_string(),
                draft: String::new(),
            });
        }
        if normalized.trim().is_empty() {
            return Err(Failure {
                kind: ErrorKind::EmptyResponse,
                message: "generator returned empty content".to_string(),
                draft: String::new(),
            });
        }
        if let Some((kind, message)) = classify::classify(normalized) {
            return Err(Failure {
                kind: ErrorKind::Semantic(kind),
                message: message.to_string(),
                draft: normalized.to_string(),
            });
        }
        let turtle = validate::extract_turtle(normalized);
        if turtle.is_empty() {
            return Err(Failure {
                kind: ErrorKind::EmptyResponse,
                message: "no Turtle payload found in generator output".to_string(),
                draft: String::new(),
            });
        }
        let report = self.syntax.validate(&turtle);
        if !report.ok {
            return Err(Failure {
                kind: ErrorKind::SyntaxError,
                message: report.diagnostic,
                draft: turtle,
            });
        }
        Ok(())
    }

    fn next_prompt(&self, failure: &Failure) -> String {
        let draft = if self.config.send_error_feedback {
            failure.draft.as_str()
        } else {
            ""
        };
        refine::build(draft, &failure.message, failure.kind)
    }

    fn record(
        &self,
        state: &mut PipelineState,
        index: u32,
        prompt: &str,
        raw: Option<&str>,
        normalized: Option<&str>,
        failure: &Failure,
    ) {
        state.record_attempt(Attempt {
            index,
            prompt: prompt.to_string(),
            prompt_sha256: sha256_hex(prompt),
            raw_output: raw.map(String::from),
            normalized_output: normalized.map(String::from),
            outcome: Outcome::Failure {
                kind: failure.kind,
                message: failure.message.clone(),
            },
        });
    }

    fn exhausted(&self, phase: &str, last: Option<Failure>) -> RmlForgeError {
        let last_diagnostic = last
            .map(|f| f.message)
            .unwrap_or_else(|| "no attempts were made".to_string());
        RmlForgeError::Exhausted {
            phase: phase.to_string(),
            attempts: self.config.max_attempts,
            last_diagnostic,
        }
    }
}
