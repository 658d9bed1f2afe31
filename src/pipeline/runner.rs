//! Drives one hold-pipeline run through its stages
//!
//! The run is a small state machine over [`Stage`]. Each stage maps to one
//! step, executed in order against a single [`PipelineState`]. The only
//! branch is the [`HoldGate`] check before `RecordHold`.

use super::error::PipelineError;
use super::gate::{GateDecision, HoldGate};
use super::stage::{Stage, StepReport};
use super::state::{PipelineState, PRODUCT_HOLD_KEY, PRODUCT_KEY};
use super::steps::{
    DocumentComparator, HoldDecider, HoldRecorder, ModelSettings, PipelineStep,
    ProductNumberExtractor,
};
use crate::config::{AgentConfig, ConfigError};
use crate::ledger::HoldLedger;
use crate::llm::provider::LlmProvider;
use crate::storage::{bucket_of, ObjectLocation, ObjectStore};
use std::sync::Arc;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

/// Everything a run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: ModelSettings,
    /// Normalized `gs://bucket` holding spec sheets and the ledger
    pub base_location: String,
    pub ledger_object: String,
}

impl PipelineSettings {
    pub fn from_config(config: &AgentConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            model: ModelSettings {
                model: config.llm.model.clone(),
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
            },
            base_location: config.base_location()?.to_string(),
            ledger_object: config.storage.ledger_object.clone(),
        })
    }

    /// Ledger object in the base bucket; the configured name is used verbatim
    pub fn ledger_location(&self) -> ObjectLocation {
        ObjectLocation::new(bucket_of(&self.base_location), self.ledger_object.as_str())
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub state: PipelineState,
    pub reports: Vec<StepReport>,
    pub hold_recorded: bool,
}

impl PipelineRun {
    pub fn product(&self) -> Option<&str> {
        self.state.get(PRODUCT_KEY)
    }

    pub fn decision(&self) -> Option<&str> {
        self.state.get(PRODUCT_HOLD_KEY)
    }
}

pub struct HoldPipeline {
    extractor: ProductNumberExtractor,
    comparator: DocumentComparator,
    decider: HoldDecider,
    recorder: HoldRecorder,
}

impl HoldPipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn ObjectStore>,
        settings: PipelineSettings,
    ) -> Self {
        let ledger = HoldLedger::new(store, settings.ledger_location());

        Self {
            extractor: ProductNumberExtractor::new(llm.clone(), settings.model.clone()),
            comparator: DocumentComparator::new(
                llm.clone(),
                settings.model.clone(),
                settings.base_location.clone(),
            ),
            decider: HoldDecider::new(llm, settings.model),
            recorder: HoldRecorder::new(ledger),
        }
    }

    pub fn ledger_location(&self) -> &ObjectLocation {
        self.recorder.ledger_location()
    }

    fn step_for(&self, stage: Stage) -> Option<&dyn PipelineStep> {
        match stage {
            Stage::ExtractProduct => Some(&self.extractor),
            Stage::CompareDocuments => Some(&self.comparator),
            Stage::DecideHold => Some(&self.decider),
            Stage::RecordHold => Some(&self.recorder),
            Stage::Done => None,
        }
    }

    /// Run all stages for a `gs://` document URI
    pub async fn run_uri(&self, uri: &str) -> Result<PipelineRun, PipelineError> {
        let document =
            ObjectLocation::parse(uri.trim()).map_err(PipelineError::InvalidDocument)?;
        self.run(document).await
    }

    /// Run all stages for one document; the first failing step ends the run
    pub async fn run(&self, document: ObjectLocation) -> Result<PipelineRun, PipelineError> {
        let mut state = PipelineState::new(document);
        let span = crate::pipeline_span!(
            run_id = %state.run_id(),
            document = %state.document()
        );

        async move {
            info!("Starting hold pipeline run");

            let mut reports = Vec::new();
            let mut hold_recorded = false;
            let mut stage = Stage::START;

            while let Some(step) = self.step_for(stage) {
                if stage == Stage::RecordHold {
                    if let GateDecision::Skip { message } = HoldGate::evaluate(&state) {
                        info!(stage = %stage, "Hold gate skipped the recorder");
                        reports.push(StepReport::skipped(stage, message));
                        stage = stage.next();
                        continue;
                    }
                }

                debug!(stage = %stage, "Executing step");
                let report = step.execute(&mut state).await?;
                info!(stage = %stage, summary = %report.summary, "Step completed");

                if stage == Stage::RecordHold {
                    hold_recorded = true;
                }
                reports.push(report);
                stage = stage.next();
            }

            info!(
                hold_recorded,
                decision = state.get(PRODUCT_HOLD_KEY).unwrap_or_default(),
                "Hold pipeline run finished"
            );

            Ok(PipelineRun {
                run_id: state.run_id(),
                state,
                reports,
                hold_recorded,
            })
        }
        .instrument(span)
        .await
    }
}
