//! Pipeline orchestrator: analysis phases, mapping generation, final
//! conformance gate and persistence.
//!
//! The run is a straight line: CSV analysis, TD analysis, mapping generation
//! (each phase retried within its own budget), then one SHACL check on the
//! final artifact. A SHACL failure is terminal; the generator is never
//! re-invoked for it.

use crate::config::PipelineConfig;
use crate::error::{Result, RmlForgeError};
use crate::llm::LlmProvider;
use crate::prompts;
use crate::retry::RetryController;
use crate::types::PipelineState;
use crate::validate::{self, ShaclEngine, ShaclValidator, SyntaxValidator, TurtleSyntaxValidator};
use std::path::{Path, PathBuf};

pub const CSV_ANALYSIS_STAGE: &str = "csv_analysis";
pub const TD_ANALYSIS_STAGE: &str = "td_analysis";
pub const RML_GENERATION_STAGE: &str = "rml_generation";

pub struct Pipeline {
    config: PipelineConfig,
    provider: Box<dyn LlmProvider>,
    syntax: Box<dyn SyntaxValidator>,
    shacl: Box<dyn ShaclValidator>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, provider: Box<dyn LlmProvider>) -> Self {
        Self {
            config,
            provider,
            syntax: Box::new(TurtleSyntaxValidator),
            shacl: Box::new(ShaclEngine),
        }
    }

    /// Substitute validator implementations (used by tests).
    pub fn with_validators(
        mut self,
        syntax: Box<dyn SyntaxValidator>,
        shacl: Box<dyn ShaclValidator>,
    ) -> Self {
        self.syntax = syntax;
        self.shacl = shacl;
        self
    }

    /// Run the full pipeline and return the path of the persisted mapping.
    pub async fn run(
        &self,
        data_file: &Path,
        td_file: &Path,
        shape_file: &Path,
    ) -> Result<PathBuf> {
        for path in [data_file, td_file, shape_file] {
            if !path.exists() {
                return Err(RmlForgeError::InputMissing(path.to_path_buf()));
            }
        }

        let mut state = PipelineState::new();
        let info = self.provider.info();
        log::info!(
            "run {} starting (provider={}, model={})",
            state.run_id,
            info.name,
            info.model
        );

        let controller = RetryController::new(
            self.provider.as_ref(),
            self.syntax.as_ref(),
            &self.config.retry,
        );

        let csv_prompt = prompts::construct_data_prompt(data_file)?;
        let csv_analysis = controller
            .run_analysis(CSV_ANALYSIS_STAGE, &csv_prompt, &mut state)
            .await?;

        let td_prompt = prompts::construct_td_prompt(td_file)?;
        let td_analysis = controller
            .run_analysis(TD_ANALYSIS_STAGE, &td_prompt, &mut state)
            .await?;

        let rml_prompt =
            prompts::construct_combined_rml_prompt(data_file, &csv_analysis, &td_analysis);
        let draft = controller
            .run_generation(RML_GENERATION_STAGE, &rml_prompt, &mut state)
            .await?;

        let artifact = validate::extract_turtle(&draft);
        if artifact.is_empty() {
            return Err(RmlForgeError::Exhausted {
                phase: RML_GENERATION_STAGE.to_string(),
                attempts: self.config.retry.max_attempts,
                last_diagnostic: "accepted draft contained no Turtle payload".to_string(),
            });
        }

        log::info!("running SHACL conformance gate against {}", shape_file.display());
        let report = self.shacl.check(&artifact, shape_file)?;
        if !report.ok {
            return Err(RmlForgeError::ShaclViolation(report.diagnostic));
        }

        self.persist(&artifact).await?;
        log::info!(
            "run {} finished ({}); mapping written to {}",
            state.run_id,
            controller.metrics.summary(),
            self.config.output_file.display()
        );
        Ok(self.config.output_file.clone())
    }

    /// Write the artifact, creating missing parent directories first.
    async fn persist(&self, artifact: &str) -> Result<()> {
        if let Some(parent) = self.config.output_file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.config.output_file, artifact).await?;
        Ok(())
    }
}
