//! Command-line entry point for the RML mapping pipeline.

use clap::Parser;
use colored::Colorize;
use rmlforge::config::{LlmConfig, PipelineConfig, RetryConfig};
use rmlforge::llm::OpenAiLlmProvider;
use rmlforge::Pipeline;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rmlforge",
    about = "Generate a SHACL-validated RML mapping from a CSV file and a Thing Description"
)]
struct Args {
    /// CSV data file to map
    #[arg(long, env = "DATA_FILE")]
    data_file: PathBuf,

    /// Thing Description (JSON) describing the device
    #[arg(long, env = "TD_FILE")]
    td_file: PathBuf,

    /// SHACL shape graph (Turtle) used as the final conformance gate
    #[arg(long, env = "SHACL_SHAPE_PATH")]
    shape_file: PathBuf,

    /// Where to write the generated mapping
    #[arg(long, env = "OUTPUT_MAPPING_FILE", default_value = "output/mapping.ttl")]
    output_file: PathBuf,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// API key for the generator endpoint
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Model name
    #[arg(long, env = "RMLFORGE_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Generator call budget per phase
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// HTTP timeout for generator calls, in seconds
    #[arg(long, default_value_t = 300)]
    timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = PipelineConfig {
        llm: LlmConfig {
            base_url: args.base_url,
            api_key: args.api_key,
            model: args.model,
            timeout_seconds: args.timeout_seconds,
            ..LlmConfig::default()
        },
        retry: RetryConfig {
            max_attempts: args.max_attempts,
            ..RetryConfig::default()
        },
        output_file: args.output_file,
    };

    println!("{}", "rmlforge - RML mapping generator".bold());
    println!("  data file : {}", args.data_file.display());
    println!("  TD file   : {}", args.td_file.display());
    println!("  shapes    : {}", args.shape_file.display());

    let provider = OpenAiLlmProvider::new(config.llm.clone())?;
    let pipeline = Pipeline::new(config, Box::new(provider));

    match pipeline
        .run(&args.data_file, &args.td_file, &args.shape_file)
        .await
    {
        Ok(output) => {
            println!(
                "{} mapping written to {}",
                "success:".green().bold(),
                output.display()
            );
            Ok(())
        }
        Err(error) => {
            eprintln!("{} {}", "pipeline failed:".red().bold(), error);
            std::process::exit(1);
        }
    }
}
