//! `ctxweave assemble`: run the context pipeline over a snapshot.

use ctxweave_config::PipelineConfig;
use ctxweave_core::InitialState;
use ctxweave_pipeline::{HeuristicTokenCounter, PipelineResult, build_pipeline};
use std::path::PathBuf;
use std::sync::Arc;

use super::input::load_state;

pub struct AssembleArgs {
    pub input: PathBuf,
    pub config: Option<PathBuf>,
    pub model: Option<String>,
    pub max_tokens: Option<usize>,
    pub pretty: bool,
}

pub async fn run(args: AssembleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => PipelineConfig::load_from(path),
        None => PipelineConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    let state = load_state(&args.input)?;
    let result = assemble(state, &config, args.model, args.max_tokens).await?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");
    Ok(())
}

/// Build the pipeline from `config` and run it once.
///
/// Model precedence: explicit override, then the agent's model, then the
/// config. The budget falls back to the config's `max_tokens`.
pub async fn assemble(
    state: InitialState,
    config: &PipelineConfig,
    model: Option<String>,
    max_tokens: Option<usize>,
) -> Result<PipelineResult, Box<dyn std::error::Error>> {
    let model = model
        .or_else(|| state.agent.model.clone())
        .unwrap_or_else(|| config.model.clone());
    let max_tokens = max_tokens.unwrap_or(config.max_tokens);
    if max_tokens == 0 {
        return Err("max_tokens must be greater than 0".into());
    }

    let pipeline = build_pipeline(config, Arc::new(HeuristicTokenCounter))?;
    tracing::debug!(%model, max_tokens, stages = pipeline.len(), "Assembling context");

    let result = pipeline
        .process(Arc::new(state), &model, max_tokens, None)
        .await?;
    Ok(result)
}
