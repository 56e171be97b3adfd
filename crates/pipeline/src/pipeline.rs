//! The context pipeline orchestrator.
//!
//! Owns an ordered list of stages and runs them strictly in sequence over a
//! freshly built [`PipelineContext`]. Each stage sees only the previous
//! stage's output.
//!
//! # Run semantics
//!
//! | Outcome | Trigger | Result |
//! |---------|---------|--------|
//! | Completed | every stage ran | `Ok(PipelineResult)` |
//! | Aborted | a stage returned `is_aborted = true` | `Ok(PipelineResult)` with the reason, later stages skipped |
//! | Failed | a stage returned an error | `Err(PipelineError::StageFailed)` with the execution info, no partial messages |

use ctxweave_core::{
    InitialState, Message, Metadata, PipelineContext, PipelineError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::processor::{Processor, run_processor};

// ── Types ─────────────────────────────────────────────────────────────────

/// Pipeline-level options.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Name used in log records
    pub name: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            name: "context-pipeline".into(),
        }
    }
}

/// Wall-clock duration of one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub name: String,
    pub duration_ms: f64,
}

/// Execution statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_duration_ms: f64,
    /// Stages actually executed
    pub processor_count: usize,
    /// Per-stage durations in execution order
    pub stage_durations: Vec<StageTiming>,
}

impl PipelineStats {
    /// Duration of the first executed stage named `name`.
    pub fn duration_of(&self, name: &str) -> Option<f64> {
        self.stage_durations
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.duration_ms)
    }
}

/// Terminal snapshot of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub messages: Vec<Message>,
    pub metadata: Metadata,
    pub is_aborted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    pub stats: PipelineStats,
}

/// Outcome of a static configuration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

// ── Pipeline ──────────────────────────────────────────────────────────────

/// The context pipeline. Cloning shares stage instances but not the list.
#[derive(Clone, Default)]
pub struct ContextPipeline {
    processors: Vec<Arc<dyn Processor>>,
    options: PipelineOptions,
}

impl ContextPipeline {
    pub fn new(processors: Vec<Arc<dyn Processor>>) -> Self {
        Self {
            processors,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Append a stage.
    pub fn add_processor(&mut self, processor: Arc<dyn Processor>) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Remove every stage named `name`. Returns how many were removed.
    pub fn remove_processor(&mut self, name: &str) -> usize {
        let before = self.processors.len();
        self.processors.retain(|p| p.name() != name);
        before - self.processors.len()
    }

    pub fn clear(&mut self) {
        self.processors.clear();
    }

    pub fn processors(&self) -> &[Arc<dyn Processor>] {
        &self.processors
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Static configuration checks. Runs nothing.
    pub fn validate(&self) -> PipelineValidation {
        let mut errors = Vec::new();

        if self.processors.is_empty() {
            errors.push("Pipeline has no processors".to_string());
        }

        let mut seen = HashSet::new();
        for (index, processor) in self.processors.iter().enumerate() {
            let name = processor.name();
            if name.trim().is_empty() {
                errors.push(format!("Processor at index {index} has no name"));
                continue;
            }
            if !seen.insert(name) {
                errors.push(format!("Duplicate processor name: {name}"));
            }
        }

        PipelineValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Run every stage over a fresh context built from `initial_state`.
    pub async fn process(
        &self,
        initial_state: Arc<InitialState>,
        model: &str,
        max_tokens: usize,
        metadata: Option<Metadata>,
    ) -> Result<PipelineResult, PipelineError> {
        let started = Instant::now();
        let mut context = PipelineContext::new(
            initial_state,
            model,
            max_tokens,
            metadata.unwrap_or_default(),
        );
        let mut timings = Vec::with_capacity(self.processors.len());

        for processor in &self.processors {
            if context.is_aborted {
                break;
            }

            let stage_started = Instant::now();
            let outcome = run_processor(processor.as_ref(), &context).await;
            let duration_ms = stage_started.elapsed().as_secs_f64() * 1000.0;
            timings.push(StageTiming {
                name: processor.name().to_string(),
                duration_ms,
            });

            context = match outcome {
                Ok(next) => next,
                Err(source) => {
                    error!(
                        pipeline = %self.options.name,
                        stage = processor.name(),
                        error = %source,
                        "Pipeline stage failed"
                    );
                    let mut execution = context.execution_info;
                    execution.errors.push(source.to_string());
                    return Err(PipelineError::StageFailed {
                        stage: processor.name().to_string(),
                        source,
                        execution,
                    });
                }
            };

            debug!(
                pipeline = %self.options.name,
                stage = processor.name(),
                duration_ms,
                messages = context.messages.len(),
                "Stage finished"
            );

            if context.is_aborted {
                warn!(
                    pipeline = %self.options.name,
                    stage = processor.name(),
                    reason = context.abort_reason.as_deref().unwrap_or(""),
                    "Pipeline aborted by stage"
                );
                break;
            }
        }

        let stats = PipelineStats {
            total_duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            processor_count: timings.len(),
            stage_durations: timings,
        };

        info!(
            pipeline = %self.options.name,
            stages = stats.processor_count,
            messages = context.messages.len(),
            aborted = context.is_aborted,
            total_ms = stats.total_duration_ms,
            "Pipeline run complete"
        );

        Ok(PipelineResult {
            messages: context.messages,
            metadata: context.metadata,
            is_aborted: context.is_aborted,
            abort_reason: context.abort_reason,
            stats,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
