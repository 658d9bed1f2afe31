//! The four hold-pipeline steps
//!
//! Each step makes at most one collaborator call and writes its result into
//! [`PipelineState`]. Errors are never caught here; they fail the run.

use super::error::PipelineError;
use super::stage::{Stage, StepReport};
use super::state::{PipelineState, ANALYSIS_KEY, PRODUCT_HOLD_KEY, PRODUCT_KEY};
use crate::ledger::HoldLedger;
use crate::llm::provider::{CompletionRequest, ContentPart, LlmProvider};
use crate::storage::ObjectLocation;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub const EXTRACT_PROMPT: &str =
    "Extract the product number from the document. Return only the product number.";

pub const COMPARE_PROMPT: &str = "Analyze the provided COA against the requirements presented in the Spec Sheet. Summarize your findings.";

const DECIDE_PROMPT: &str = "Review the provided analysis. If any metrics do not conform, or are out of range, return True. \
If all metrics conform to specifications, and all required metrics are provided, return False.";

pub const HOLD_SUMMARY: &str = "The product does not conform and should be put on hold.";
pub const CONFORMS_SUMMARY: &str = "The product conforms to all specs.";
pub const RECORDED_SUMMARY: &str = "The product has been put on hold.";

/// Model parameters shared by every step
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Decision prompt with the analysis appended
pub fn decide_prompt(analysis: &str) -> String {
    format!("{DECIDE_PROMPT}\nAnalysis: {analysis}")
}

/// `<base>/<product> Spec Sheet.pdf`
pub fn spec_sheet_uri(base_location: &str, product: &str) -> String {
    format!(
        "{}/{} Spec Sheet.pdf",
        base_location.trim_end_matches('/'),
        product
    )
}

/// Trim and lower-case a classification response
pub fn normalize_decision(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A single stage of the pipeline
#[async_trait]
pub trait PipelineStep: Send + Sync {
    fn stage(&self) -> Stage;

    async fn execute(&self, state: &mut PipelineState) -> Result<StepReport, PipelineError>;
}

/// One model call; `None` content is reported as an empty response
async fn ask_model(
    llm: &dyn LlmProvider,
    settings: &ModelSettings,
    stage: Stage,
    parts: Vec<ContentPart>,
) -> Result<String, PipelineError> {
    let mut request = CompletionRequest::single_turn(settings.model.clone(), parts);
    request.temperature = settings.temperature;
    request.max_tokens = settings.max_tokens;
    request
        .metadata
        .insert("stage".to_string(), stage.as_str().to_string());

    let response = llm
        .complete(request)
        .await
        .map_err(|source| PipelineError::Llm { stage, source })?;

    debug!(
        stage = %stage,
        total_tokens = response.usage.total_tokens,
        "Model call complete"
    );

    response.content.ok_or(PipelineError::EmptyResponse { stage })
}

/// Reads the COA and asks the model for its bare product number
pub struct ProductNumberExtractor {
    llm: Arc<dyn LlmProvider>,
    settings: ModelSettings,
}

impl ProductNumberExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: ModelSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl PipelineStep for ProductNumberExtractor {
    fn stage(&self) -> Stage {
        Stage::ExtractProduct
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<StepReport, PipelineError> {
        let parts = vec![
            ContentPart::pdf(state.document().to_uri()),
            ContentPart::text(EXTRACT_PROMPT),
        ];
        let text = ask_model(self.llm.as_ref(), &self.settings, self.stage(), parts).await?;

        let product = text.trim();
        // Blank output fails the run instead of storing an empty product
        if product.is_empty() {
            return Err(PipelineError::EmptyResponse {
                stage: self.stage(),
            });
        }

        state.set(PRODUCT_KEY, product);
        Ok(StepReport::success(self.stage(), product))
    }
}

/// Compares the COA against the product's spec sheet
pub struct DocumentComparator {
    llm: Arc<dyn LlmProvider>,
    settings: ModelSettings,
    base_location: String,
}

impl DocumentComparator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        settings: ModelSettings,
        base_location: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            settings,
            base_location: base_location.into(),
        }
    }
}

#[async_trait]
impl PipelineStep for DocumentComparator {
    fn stage(&self) -> Stage {
        Stage::CompareDocuments
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<StepReport, PipelineError> {
        let product = state.require(self.stage(), PRODUCT_KEY)?;
        let spec_uri = spec_sheet_uri(&self.base_location, product);
        debug!(spec_sheet = %spec_uri, "Comparing against spec sheet");

        let parts = vec![
            ContentPart::pdf(state.document().to_uri()),
            ContentPart::pdf(spec_uri),
            ContentPart::text(COMPARE_PROMPT),
        ];
        let analysis = ask_model(self.llm.as_ref(), &self.settings, self.stage(), parts).await?;

        state.set(ANALYSIS_KEY, analysis.clone());
        Ok(StepReport::success(self.stage(), analysis))
    }
}

/// Classifies the analysis as conforming or not
pub struct HoldDecider {
    llm: Arc<dyn LlmProvider>,
    settings: ModelSettings,
}

impl HoldDecider {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: ModelSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl PipelineStep for HoldDecider {
    fn stage(&self) -> Stage {
        Stage::DecideHold
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<StepReport, PipelineError> {
        let analysis = state.require(self.stage(), ANALYSIS_KEY)?;
        let parts = vec![ContentPart::text(decide_prompt(analysis))];
        let raw = ask_model(self.llm.as_ref(), &self.settings, self.stage(), parts).await?;

        // Stored as-is even when it is neither "true" nor "false"
        let decision = normalize_decision(&raw);
        let summary = if decision == "true" {
            HOLD_SUMMARY
        } else {
            CONFORMS_SUMMARY
        };

        state.set(PRODUCT_HOLD_KEY, decision);
        Ok(StepReport::success(self.stage(), summary))
    }
}

/// Appends the product to the hold ledger
pub struct HoldRecorder {
    ledger: HoldLedger,
}

impl HoldRecorder {
    pub fn new(ledger: HoldLedger) -> Self {
        Self { ledger }
    }

    pub fn ledger_location(&self) -> &ObjectLocation {
        self.ledger.location()
    }
}

#[async_trait]
impl PipelineStep for HoldRecorder {
    fn stage(&self) -> Stage {
        Stage::RecordHold
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<StepReport, PipelineError> {
        let product = state.require(self.stage(), PRODUCT_KEY)?;
        self.ledger
            .append(product)
            .await
            .map_err(|source| PipelineError::Storage {
                stage: self.stage(),
                source,
            })?;

        Ok(StepReport::success(self.stage(), RECORDED_SUMMARY))
    }
}
