//! Pipeline Orchestrator
//!
//! Runs one identification request through the dedup gate and the strategy
//! cascade, then persists the result.
//!
//! # Error Handling
//! - Collaborator failures and timeouts are strategy misses; the cascade moves on
//! - Unexpected strategy errors route through FAIL to the emergency fallback
//! - Only unusable input (no signals at all) or cancellation fails a request
//! - Storage problems are logged and never fail a request
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(PipelineConfig::default(), collaborators, store);
//! let record = pipeline
//!     .identify(IdentifyRequest::from_image(bytes, Vertical::Supermarket))
//!     .await?;
//! ```

use super::finalize::finalize;
use super::{DedupGate, IdentificationReport, IdentifyRequest, Stage, StageTracker};
use crate::clients::{Collaborators, SearchHit, SignalExtractor, WebSearch};
use crate::db::ProductStore;
use crate::error::IdentifyError;
use crate::fusion::{fuse_all, FieldConflict};
use crate::strategies::rag_enrichment::DEFAULT_RESULT_LIMIT;
use crate::strategies::visual_lookup::DEFAULT_SIMILARITY_THRESHOLD;
use crate::strategies::{
    emergency_outcome, Attempt, AttemptResult, CodeLookupStrategy, InferenceStrategy, MissReason,
    RagEnrichmentStrategy, VisualLookupStrategy,
};
use crate::types::{
    CollaboratorError, ProcessingOutcome, ProductRecord, StrategyOutcome, Vertical, VisionSignals,
};
use crate::utils::text::DEFAULT_PLACEHOLDER_TITLE;
use crate::utils::{placeholder_title, round2};
use crate::validators::{find_code_in_text, is_sufficient, normalize_code, ConfidenceScorer};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Budget for OCR signal extraction
    pub ocr_timeout: Duration,
    /// Budget for the catalog lookup stage
    pub catalog_timeout: Duration,
    /// Budget for embedding + nearest-neighbor search
    pub visual_timeout: Duration,
    /// Budget for the inference call
    pub inference_timeout: Duration,
    /// Budget for the whole enrichment stage (search, generation, catalog)
    pub rag_timeout: Duration,
    /// Budget for the optional search feeding inference
    pub search_timeout: Duration,
    /// Visual matches must be strictly above this similarity (0.0-1.0)
    pub visual_similarity_threshold: f64,
    /// Search results used by enrichment and inference context
    pub search_result_limit: usize,
    /// Ground inference prompts with web search results
    pub search_context_for_inference: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_timeout: Duration::from_secs(20),
            catalog_timeout: Duration::from_secs(15),
            visual_timeout: Duration::from_secs(20),
            inference_timeout: Duration::from_secs(30),
            rag_timeout: Duration::from_secs(45),
            search_timeout: Duration::from_secs(10),
            visual_similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            search_result_limit: DEFAULT_RESULT_LIMIT,
            search_context_for_inference: false,
        }
    }
}

/// Per-request cascade inputs
struct CascadeInput<'a> {
    signals: &'a VisionSignals,
    image: Option<&'a [u8]>,
    vertical: Vertical,
    image_hash: &'a str,
    /// Validated code from the signals or found in the OCR text
    code: Option<String>,
}

/// Identification pipeline
pub struct Pipeline {
    config: PipelineConfig,
    signal_extractor: Option<Arc<dyn SignalExtractor>>,
    web_search: Option<Arc<dyn WebSearch>>,
    code_lookup: Arc<CodeLookupStrategy>,
    visual_lookup: VisualLookupStrategy,
    inference: InferenceStrategy,
    rag: RagEnrichmentStrategy,
    gate: DedupGate,
    scorer: ConfidenceScorer,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        collaborators: Collaborators,
        store: Arc<dyn ProductStore>,
    ) -> Self {
        let code_lookup = Arc::new(CodeLookupStrategy::new(collaborators.catalog.clone()));

        Self {
            visual_lookup: VisualLookupStrategy::new(
                collaborators.embedder.clone(),
                collaborators.vector_index.clone(),
                store.clone(),
                config.visual_similarity_threshold,
            ),
            inference: InferenceStrategy::new(collaborators.generator.clone()),
            rag: RagEnrichmentStrategy::new(
                collaborators.web_search.clone(),
                collaborators.generator.clone(),
                code_lookup.clone(),
                config.search_result_limit,
            ),
            code_lookup,
            signal_extractor: collaborators.signal_extractor,
            web_search: collaborators.web_search,
            gate: DedupGate::new(store),
            scorer: ConfidenceScorer::new(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Identify a product
    pub async fn identify(&self, request: IdentifyRequest) -> Result<ProductRecord, IdentifyError> {
        Ok(self.identify_traced(request).await?.record)
    }

    /// Identify a product, reporting the stages visited
    pub async fn identify_traced(
        &self,
        request: IdentifyRequest,
    ) -> Result<IdentificationReport, IdentifyError> {
        self.identify_with_cancel(request, CancellationToken::new()).await
    }

    /// Identify a product unless `token` is cancelled first
    ///
    /// Cancellation is honored up to the end of the cascade and a cancelled
    /// request writes nothing. Once the record is being stored the request
    /// runs to completion.
    pub async fn identify_with_cancel(
        &self,
        request: IdentifyRequest,
        token: CancellationToken,
    ) -> Result<IdentificationReport, IdentifyError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("identify", %request_id, vertical = %request.vertical);
        self.run(request, &token).instrument(span).await
    }

    async fn run(
        &self,
        request: IdentifyRequest,
        token: &CancellationToken,
    ) -> Result<IdentificationReport, IdentifyError> {
        let started = Instant::now();
        let IdentifyRequest {
            vertical,
            image,
            signals,
        } = request;
        let image = image.filter(|bytes| !bytes.is_empty());
        let signals = signals.filter(|s| !s.is_empty());

        let image_hash = match (&image, &signals) {
            (Some(bytes), _) => DedupGate::hash_image(bytes),
            (None, Some(signals)) => DedupGate::hash_signals(signals, vertical),
            (None, None) => {
                return Err(IdentifyError::NoSignals(
                    "request carries neither an image nor signals".to_string(),
                ))
            }
        };

        let mut tracker = StageTracker::new();
        tracker.transition_to(Stage::CacheCheck);

        if let Some(record) = until_cancelled(token, self.gate.check(&image_hash)).await? {
            tracker.transition_to(Stage::Done);
            let elapsed_seconds = round2(started.elapsed().as_secs_f64());
            info!(image_hash = %image_hash, "Dedup cache hit");

            self.gate
                .log(&ProcessingOutcome {
                    image_hash: image_hash.clone(),
                    elapsed_seconds,
                    success: true,
                    confidence: Some(record.confidence),
                    error: None,
                })
                .await;

            return Ok(IdentificationReport {
                record,
                stages: tracker.into_visited(),
                cache_hit: true,
                conflicts: Vec::new(),
                elapsed_seconds,
            });
        }

        let acquired = self.acquire_signals(image.as_deref(), signals, vertical);
        let signals = match until_cancelled(token, acquired).await? {
            Ok(signals) => signals,
            Err(err) => {
                self.gate
                    .log(&ProcessingOutcome {
                        image_hash: image_hash.clone(),
                        elapsed_seconds: round2(started.elapsed().as_secs_f64()),
                        success: false,
                        confidence: None,
                        error: Some(err.to_string()),
                    })
                    .await;
                return Err(err);
            }
        };

        let input = CascadeInput {
            signals: &signals,
            image: image.as_deref(),
            vertical,
            image_hash: &image_hash,
            code: signals
                .candidate_code
                .as_deref()
                .and_then(normalize_code)
                .or_else(|| find_code_in_text(&signals.raw_text)),
        };
        let (record, conflicts) =
            until_cancelled(token, self.run_cascade(&input, &mut tracker)).await?;
        tracker.transition_to(Stage::Done);

        let record = self.gate.commit(record).await;
        let elapsed_seconds = round2(started.elapsed().as_secs_f64());

        self.gate
            .log(&ProcessingOutcome {
                image_hash: image_hash.clone(),
                elapsed_seconds,
                success: true,
                confidence: Some(record.confidence),
                error: None,
            })
            .await;

        info!(
            image_hash = %image_hash,
            source = %record.source_strategy,
            confidence = record.confidence,
            category = %record.category,
            elapsed_seconds,
            "Identification complete"
        );

        Ok(IdentificationReport {
            record,
            stages: tracker.into_visited(),
            cache_hit: false,
            conflicts,
            elapsed_seconds,
        })
    }

    /// Signals from the request, else from OCR
    ///
    /// Apparel requests with an image may continue without signals since
    /// visual lookup needs only the image.
    async fn acquire_signals(
        &self,
        image: Option<&[u8]>,
        provided: Option<VisionSignals>,
        vertical: Vertical,
    ) -> Result<VisionSignals, IdentifyError> {
        if let Some(signals) = provided {
            return Ok(signals);
        }
        let Some(image) = image else {
            return Err(IdentifyError::NoSignals("no image to extract signals from".to_string()));
        };
        let image_only_ok = vertical == Vertical::Apparel;

        let extracted = match &self.signal_extractor {
            None => Err(CollaboratorError::NotConfigured(
                "no signal extractor configured".to_string(),
            )),
            Some(extractor) => {
                match tokio::time::timeout(self.config.ocr_timeout, extractor.extract(image)).await {
                    Ok(result) => result,
                    Err(_) => Err(CollaboratorError::Timeout(format!(
                        "OCR exceeded {} ms",
                        self.config.ocr_timeout.as_millis()
                    ))),
                }
            }
        };

        match extracted {
            Ok(signals) if !signals.is_empty() => Ok(signals),
            Ok(_) if image_only_ok => Ok(VisionSignals::default()),
            Ok(_) => Err(IdentifyError::NoSignals(
                "no text, logos or labels found in the image".to_string(),
            )),
            Err(err) if image_only_ok => {
                warn!(error = %err, "Signal extraction failed, continuing with image only");
                Ok(VisionSignals::default())
            }
            Err(err) => Err(IdentifyError::Extraction(err.to_string())),
        }
    }

    /// Drive the cascade from the first strategy stage to FINALIZE
    async fn run_cascade(
        &self,
        input: &CascadeInput<'_>,
        tracker: &mut StageTracker,
    ) -> (ProductRecord, Vec<FieldConflict>) {
        let mut contributions: Vec<StrategyOutcome> = Vec::new();
        let mut chosen: Option<StrategyOutcome> = None;
        let mut conflicts = Vec::new();
        let mut next = self.first_strategy_stage(input);

        loop {
            tracker.transition_to(next);

            next = match next {
                Stage::CodeLookup => {
                    let code = input.code.as_deref().unwrap_or_default();
                    let result = self
                        .run_stage(
                            Stage::CodeLookup,
                            self.config.catalog_timeout,
                            self.code_lookup.attempt(code),
                        )
                        .await;
                    self.after_lookup(Stage::CodeLookup, result, input, &mut contributions)
                }

                Stage::VisualLookup => {
                    let image = input.image.unwrap_or_default();
                    let result = self
                        .run_stage(
                            Stage::VisualLookup,
                            self.config.visual_timeout,
                            self.visual_lookup.attempt(image),
                        )
                        .await;
                    self.after_lookup(Stage::VisualLookup, result, input, &mut contributions)
                }

                Stage::Inference => {
                    let context = self.search_context(input.signals).await;
                    let result = self
                        .run_stage(
                            Stage::Inference,
                            self.config.inference_timeout,
                            self.inference.attempt(
                                input.signals,
                                input.vertical,
                                input.code.as_deref(),
                                &context,
                            ),
                        )
                        .await;

                    match result {
                        Ok(Attempt::Hit(outcome)) if outcome.is_informative() => {
                            contributions.push(outcome);
                            self.after_inference(&contributions)
                        }
                        Ok(Attempt::Hit(_)) => {
                            debug!("Inference produced only a placeholder, treating as miss");
                            after_empty_inference(&contributions)
                        }
                        Ok(Attempt::Miss(_)) => after_empty_inference(&contributions),
                        Err(_) => Stage::Fail,
                    }
                }

                Stage::RagEnrichment => {
                    let result = match fuse_all(contributions.clone()) {
                        Some(best) => {
                            self.run_stage(
                                Stage::RagEnrichment,
                                self.config.rag_timeout,
                                self.rag.attempt(&best.outcome),
                            )
                            .await
                        }
                        None => Ok(Attempt::Miss(MissReason::PreconditionUnmet)),
                    };

                    match result {
                        Ok(Attempt::Hit(outcome))
                            if is_sufficient(Some(&outcome)) && outcome.source.is_authoritative() =>
                        {
                            contributions.push(outcome);
                            Stage::Fuse
                        }
                        Ok(_) if contributions.len() >= 2 => Stage::Fuse,
                        Ok(_) => Stage::Finalize,
                        Err(_) => Stage::Fail,
                    }
                }

                Stage::Fuse => {
                    if let Some(fused) = fuse_all(std::mem::take(&mut contributions)) {
                        conflicts = fused.conflicts;
                        chosen = Some(fused.outcome);
                    }
                    Stage::Finalize
                }

                Stage::Fail => {
                    warn!("Cascade aborted by an unexpected strategy error, using emergency fallback");
                    Stage::EmergencyFallback
                }

                Stage::EmergencyFallback => {
                    contributions.clear();
                    chosen = Some(emergency_outcome(input.signals));
                    Stage::Finalize
                }

                Stage::Finalize => {
                    let outcome = chosen
                        .take()
                        .or_else(|| contributions.pop())
                        .unwrap_or_else(|| emergency_outcome(input.signals));
                    let record = finalize(
                        outcome,
                        input.signals,
                        input.vertical,
                        input.image_hash,
                        &self.scorer,
                    );
                    return (record, conflicts);
                }

                // Never produced by the cascade itself
                Stage::Start | Stage::CacheCheck | Stage::Done => {
                    let record = finalize(
                        emergency_outcome(input.signals),
                        input.signals,
                        input.vertical,
                        input.image_hash,
                        &self.scorer,
                    );
                    return (record, conflicts);
                }
            };
        }
    }

    /// First strategy stage whose preconditions hold
    fn first_strategy_stage(&self, input: &CascadeInput<'_>) -> Stage {
        if input.code.is_some() && self.code_lookup.is_configured() {
            Stage::CodeLookup
        } else if self.visual_applies(input) {
            Stage::VisualLookup
        } else {
            Stage::Inference
        }
    }

    fn visual_applies(&self, input: &CascadeInput<'_>) -> bool {
        input.vertical == Vertical::Apparel
            && input.image.map_or(false, |bytes| !bytes.is_empty())
            && self.visual_lookup.is_configured()
    }

    /// Next stage after code or visual lookup
    fn after_lookup(
        &self,
        stage: Stage,
        result: AttemptResult,
        input: &CascadeInput<'_>,
        contributions: &mut Vec<StrategyOutcome>,
    ) -> Stage {
        match result {
            Ok(Attempt::Hit(outcome)) => {
                let done = is_sufficient(Some(&outcome)) && outcome.source.is_authoritative();
                contributions.push(outcome);
                if done {
                    return Stage::Finalize;
                }
            }
            Ok(Attempt::Miss(_)) => {}
            Err(_) => return Stage::Fail,
        }

        if stage == Stage::CodeLookup && self.visual_applies(input) {
            Stage::VisualLookup
        } else {
            Stage::Inference
        }
    }

    /// Next stage after inference contributed
    fn after_inference(&self, contributions: &[StrategyOutcome]) -> Stage {
        let enrich = self.rag.is_configured()
            && fuse_all(contributions.to_vec())
                .map_or(false, |best| RagEnrichmentStrategy::applies_to(&best.outcome));

        if enrich {
            Stage::RagEnrichment
        } else if contributions.len() >= 2 {
            Stage::Fuse
        } else {
            Stage::Finalize
        }
    }

    /// Optional web search results to ground the inference prompt
    async fn search_context(&self, signals: &VisionSignals) -> Vec<SearchHit> {
        if !self.config.search_context_for_inference {
            return Vec::new();
        }
        let Some(search) = &self.web_search else {
            return Vec::new();
        };
        let Some(query) = context_query(signals) else {
            return Vec::new();
        };

        let call = search.search(&query, self.config.search_result_limit);
        match tokio::time::timeout(self.config.search_timeout, call).await {
            Ok(Ok(hits)) => {
                debug!(query = %query, hits = hits.len(), "Search context for inference");
                hits
            }
            Ok(Err(err)) => {
                debug!(query = %query, error = %err, "Search context unavailable");
                Vec::new()
            }
            Err(_) => {
                debug!(query = %query, "Search context timed out");
                Vec::new()
            }
        }
    }

    /// Run one strategy under its time budget, logging the result
    async fn run_stage<F>(&self, stage: Stage, budget: Duration, attempt: F) -> AttemptResult
    where
        F: Future<Output = AttemptResult>,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(budget, attempt).await {
            Ok(result) => result,
            Err(_) => Ok(Attempt::Miss(MissReason::Timeout)),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(Attempt::Hit(outcome)) => info!(
                stage = ?stage,
                source = %outcome.source,
                confidence = outcome.confidence,
                elapsed_ms,
                "Strategy hit"
            ),
            Ok(Attempt::Miss(reason)) => info!(
                stage = ?stage,
                reason = %reason,
                elapsed_ms,
                "Strategy miss"
            ),
            Err(err) => warn!(
                stage = ?stage,
                error = %err,
                elapsed_ms,
                "Strategy failed unexpectedly"
            ),
        }

        result
    }
}

/// Run `work` unless `token` fires first
async fn until_cancelled<T>(
    token: &CancellationToken,
    work: impl Future<Output = T>,
) -> Result<T, IdentifyError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            info!("Identification cancelled");
            Err(IdentifyError::Cancelled)
        }
        output = work => Ok(output),
    }
}

/// Next stage when inference added nothing
fn after_empty_inference(contributions: &[StrategyOutcome]) -> Stage {
    match contributions.len() {
        0 => Stage::EmergencyFallback,
        1 => Stage::Finalize,
        _ => Stage::Fuse,
    }
}

/// "{logo} {ocr words}" or `None` when the signals say nothing useful
fn context_query(signals: &VisionSignals) -> Option<String> {
    let words = placeholder_title(&signals.raw_text);
    let words = (words != DEFAULT_PLACEHOLDER_TITLE).then_some(words);

    let query = [signals.primary_logo().map(str::to_string), words]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    (!query.is_empty()).then_some(query)
}
