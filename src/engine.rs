//! The generation orchestrator: one analysis call, then one synthesis call
//! per concept with per-concept failure isolation, plus targeted re-editing
//! of individual results. Owns the only mutable state in the crate.

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::credentials::CredentialGate;
use crate::error::GenerationError;
use crate::llm::ThumbnailModel;
use crate::types::{AnalysisResult, EncodedImage, GenerationSettings, ResolutionTier, WorkingImageSet};

/// Current stage of a run. `Editing` is only reachable from `Ready` and
/// returns there on completion; `reset` reaches `Idle` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Analyzing,
    Generating,
    Ready,
    Editing,
}

/// Incremental progress notifications, published as results arrive so a
/// caller can render partial output without waiting for the whole batch.
#[derive(Debug, Clone)]
pub enum RunEvent {
    AnalysisReady(AnalysisResult),
    ThumbnailReady { style: String, image: EncodedImage },
    ConceptFailed { style: String, detail: String },
    RunReady { attempted: usize, succeeded: usize },
    RunFailed { detail: String },
    EditApplied { style: String, image: EncodedImage },
    EditFailed { style: String, detail: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// Set when a reset (or newer run) superseded this one mid-flight; the
    /// remaining concepts were not attempted and late results were discarded.
    pub superseded: bool,
}

/// Outcome of an edit request that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// Nothing was done: no source image for the style, empty instruction,
    /// the engine was not `Ready`, or the run was superseded before the
    /// result arrived. No call is issued in the first three cases.
    Skipped,
}

#[derive(Debug, Default)]
struct RunState {
    run_id: u64,
    phase: RunPhase,
    analysis: Option<AnalysisResult>,
    thumbnails: WorkingImageSet,
    settings: Option<GenerationSettings>,
}

pub struct ThumbnailEngine<M, C> {
    model: M,
    credentials: C,
    state: Mutex<RunState>,
    events: UnboundedSender<RunEvent>,
}

impl<M, C> ThumbnailEngine<M, C>
where
    M: ThumbnailModel,
    C: CredentialGate,
{
    pub fn new(model: M, credentials: C) -> (Self, UnboundedReceiver<RunEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let engine = ThumbnailEngine {
            model,
            credentials,
            state: Mutex::new(RunState::default()),
            events,
        };
        (engine, receiver)
    }

    pub fn phase(&self) -> RunPhase {
        self.state.lock().phase
    }

    pub fn analysis(&self) -> Option<AnalysisResult> {
        self.state.lock().analysis.clone()
    }

    /// Snapshot of the working set: latest image per concept style.
    pub fn thumbnails(&self) -> WorkingImageSet {
        self.state.lock().thumbnails.clone()
    }

    fn emit(&self, event: RunEvent) {
        // A dropped receiver just means nobody is watching progress.
        let _ = self.events.send(event);
    }

    /// One end-to-end run: analysis, then one synthesis call per concept in
    /// order, one in-flight call at a time. An analysis failure aborts the
    /// run; a synthesis failure is isolated to its concept and the batch
    /// continues. Entitlement-denied failures additionally trigger the
    /// credential-reselection action, once per failing call.
    pub async fn start_run(
        &self,
        context: &str,
        intent: Option<&str>,
        author_image: &EncodedImage,
        settings: GenerationSettings,
    ) -> Result<RunSummary, GenerationError> {
        if context.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "context must not be empty".to_string(),
            ));
        }

        if settings.resolution_tier == ResolutionTier::High
            && !self.credentials.has_credential().await
        {
            self.credentials.request_credential().await;
        }

        let run_id = {
            let mut state = self.state.lock();
            state.run_id += 1;
            state.phase = RunPhase::Analyzing;
            state.analysis = None;
            state.thumbnails.clear();
            state.settings = Some(settings);
            state.run_id
        };

        let analysis = match self.model.analyze(context, intent).await {
            Ok(analysis) => analysis,
            Err(err) => {
                {
                    let mut state = self.state.lock();
                    if state.run_id == run_id {
                        state.phase = RunPhase::Idle;
                    }
                }
                warn!("Analysis failed, aborting run: {err}");
                self.emit(RunEvent::RunFailed {
                    detail: err.to_string(),
                });
                return Err(err);
            }
        };

        let concepts = {
            let mut state = self.state.lock();
            if state.run_id != run_id {
                info!("Discarding analysis for superseded run {run_id}");
                return Ok(RunSummary {
                    superseded: true,
                    ..RunSummary::default()
                });
            }
            state.analysis = Some(analysis.clone());
            state.phase = RunPhase::Generating;
            analysis.concepts.clone()
        };
        self.emit(RunEvent::AnalysisReady(analysis));

        let mut summary = RunSummary::default();
        for concept in &concepts {
            if self.state.lock().run_id != run_id {
                summary.superseded = true;
                break;
            }

            summary.attempted += 1;
            match self
                .model
                .synthesize(concept, author_image, &settings)
                .await
            {
                Ok(image) => {
                    let mut state = self.state.lock();
                    if state.run_id != run_id {
                        info!("Discarding late thumbnail for superseded run {run_id}");
                        summary.superseded = true;
                        break;
                    }
                    state.thumbnails.insert(concept.style.clone(), image.clone());
                    drop(state);
                    summary.succeeded += 1;
                    self.emit(RunEvent::ThumbnailReady {
                        style: concept.style.clone(),
                        image,
                    });
                }
                Err(err) => {
                    warn!("Thumbnail generation failed for '{}': {err}", concept.style);
                    let entitlement = err.is_entitlement_denied();
                    self.emit(RunEvent::ConceptFailed {
                        style: concept.style.clone(),
                        detail: err.to_string(),
                    });
                    if entitlement {
                        self.credentials.request_credential().await;
                    }
                }
            }
        }

        if !summary.superseded {
            let mut state = self.state.lock();
            if state.run_id == run_id {
                state.phase = RunPhase::Ready;
                drop(state);
                self.emit(RunEvent::RunReady {
                    attempted: summary.attempted,
                    succeeded: summary.succeeded,
                });
            } else {
                summary.superseded = true;
            }
        }

        Ok(summary)
    }

    /// Re-edit the current image for one concept style. A missing source
    /// image or blank instruction is a no-op; a failed edit keeps the prior
    /// entry; a reset racing the call discards the result.
    pub async fn edit_thumbnail(
        &self,
        style: &str,
        instruction: &str,
    ) -> Result<EditOutcome, GenerationError> {
        let (run_id, source, settings) = {
            let mut state = self.state.lock();
            if state.phase != RunPhase::Ready || instruction.trim().is_empty() {
                return Ok(EditOutcome::Skipped);
            }
            let Some(source) = state.thumbnails.get(style).cloned() else {
                return Ok(EditOutcome::Skipped);
            };
            let Some(settings) = state.settings else {
                return Ok(EditOutcome::Skipped);
            };
            state.phase = RunPhase::Editing;
            (state.run_id, source, settings)
        };

        match self.model.edit(&source, instruction, &settings).await {
            Ok(image) => {
                let mut state = self.state.lock();
                if state.run_id != run_id {
                    info!("Discarding late edit result for superseded run {run_id}");
                    return Ok(EditOutcome::Skipped);
                }
                state.thumbnails.insert(style.to_string(), image.clone());
                state.phase = RunPhase::Ready;
                drop(state);
                self.emit(RunEvent::EditApplied {
                    style: style.to_string(),
                    image,
                });
                Ok(EditOutcome::Applied)
            }
            Err(err) => {
                {
                    let mut state = self.state.lock();
                    if state.run_id == run_id {
                        state.phase = RunPhase::Ready;
                    }
                }
                warn!("Edit failed for '{style}': {err}");
                let entitlement = err.is_entitlement_denied();
                self.emit(RunEvent::EditFailed {
                    style: style.to_string(),
                    detail: err.to_string(),
                });
                if entitlement {
                    self.credentials.request_credential().await;
                }
                Err(err)
            }
        }
    }

    /// Unconditional return to `Idle` from any state. Does not interrupt an
    /// in-flight call; bumping the run id makes its eventual result stale so
    /// it can never merge into a newer run's working set.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.run_id += 1;
        state.phase = RunPhase::Idle;
        state.analysis = None;
        state.thumbnails.clear();
        state.settings = None;
    }
}
