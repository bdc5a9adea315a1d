use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use log::{debug, info, warn};

use crate::app_config::PacingConfig;
use crate::checkpoint::CheckpointState;
use crate::subtitle_processor::SubtitleRecord;
use crate::translation_service::{Sleeper, TranslationService, TranslationUnit};

// @module: Chunk orchestration - resume, pacing, failure budget

/// What the pacing state decides after a chunk failure
#[derive(Debug, PartialEq)]
pub enum FailureAction {
    /// Keep going with the (doubled) adaptive delay
    Continue,
    /// The consecutive-failure budget is exhausted: take the long cooldown,
    /// then resume with counter and delay reset
    Cooldown(Duration),
}

/// Adaptive inter-chunk pacing state.
///
/// Explicit fields owned by the orchestrator loop rather than ambient
/// process state, so the escalation rules are testable without timers.
#[derive(Debug)]
pub struct PacingState {
    /// Current inter-chunk delay
    delay: Duration,

    /// Consecutive failed chunks since the last success or cooldown
    consecutive_failures: u32,

    config: PacingConfig,
}

impl PacingState {
    /// Create pacing state at the minimum delay
    pub fn new(config: PacingConfig) -> Self {
        Self {
            delay: Duration::from_secs(config.min_delay_secs),
            consecutive_failures: 0,
            config,
        }
    }

    /// Current inter-chunk delay
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Current consecutive-failure count
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// A chunk succeeded: reset the delay to its minimum and clear the
    /// failure counter
    pub fn record_success(&mut self) {
        self.delay = Duration::from_secs(self.config.min_delay_secs);
        self.consecutive_failures = 0;
    }

    /// A chunk failed after all retries and fallback: double the delay up to
    /// the cap, and report whether the global failure budget is exhausted
    pub fn record_failure(&mut self) -> FailureAction {
        self.consecutive_failures += 1;
        self.delay = (self.delay * 2).min(Duration::from_secs(self.config.max_delay_secs));

        if self.consecutive_failures >= self.config.failure_threshold {
            FailureAction::Cooldown(Duration::from_secs(self.config.cooldown_secs))
        } else {
            FailureAction::Continue
        }
    }

    /// The cooldown was taken: reset both the counter and the delay
    pub fn reset_after_cooldown(&mut self) {
        self.consecutive_failures = 0;
        self.delay = Duration::from_secs(self.config.min_delay_secs);
    }
}

/// Outcome of one orchestrator run
#[derive(Debug)]
pub struct RunOutcome {
    /// All accumulated translation units, including prior runs' results
    pub units: Vec<TranslationUnit>,

    /// Chunks still missing after this run
    pub skipped_chunks: usize,

    /// Total chunk count for this input and chunk size
    pub total_chunks: usize,
}

/// Drives the chunk list to completion exactly once per chunk, durably.
///
/// Strictly sequential: one chunk's call (and optional review) completes
/// fully before the next begins. The checkpoint is flushed after every
/// successful chunk and before the next sleep or call, which makes external
/// interruption between chunks safe by construction.
pub struct ChunkOrchestrator {
    service: TranslationService,
    sleeper: Arc<dyn Sleeper>,
    pacing: PacingConfig,
    checkpoint_path: PathBuf,
}

impl ChunkOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        service: TranslationService,
        sleeper: Arc<dyn Sleeper>,
        pacing: PacingConfig,
        checkpoint_path: PathBuf,
    ) -> Self {
        Self {
            service,
            sleeper,
            pacing,
            checkpoint_path,
        }
    }

    /// Process every not-yet-completed chunk, updating `state` as chunks
    /// finish. Completed chunks from prior runs are idempotent no-ops. A
    /// failed chunk is skipped, not aborting the run; re-running the same
    /// command later retries only the missing chunks.
    pub async fn run(
        &self,
        chunks: &[Vec<SubtitleRecord>],
        glossary: &str,
        state: &mut CheckpointState,
        progress: impl Fn(usize, usize),
    ) -> Result<RunOutcome> {
        let total_chunks = chunks.len();
        let mut pacing = PacingState::new(self.pacing.clone());
        let mut calls_made = 0usize;

        for (index, chunk) in chunks.iter().enumerate() {
            if state.completed_chunks.contains(&index) {
                debug!("Chunk {}/{} already completed, skipping", index + 1, total_chunks);
                progress(state.completed_chunks.len(), total_chunks);
                continue;
            }

            // Pace between remote calls, never before the first one and
            // never on behalf of chunks satisfied by a prior run
            if calls_made > 0 {
                self.sleeper.sleep(pacing.delay()).await;
            }
            calls_made += 1;

            info!(
                "Processing chunk {}/{} ({} records)",
                index + 1,
                total_chunks,
                chunk.len()
            );

            match self
                .service
                .translate_chunk(chunk, glossary, index, total_chunks)
                .await
            {
                Ok(units) => {
                    state.subtitles.extend(units);
                    state.completed_chunks.insert(index);
                    // Write-before-continue: a crash from here on loses
                    // nothing that was finished
                    state.save(&self.checkpoint_path)?;
                    pacing.record_success();
                    debug!("Chunk {} saved to checkpoint", index + 1);
                }
                Err(e) => {
                    warn!(
                        "Chunk {}/{} failed after all retries and fallback, skipped: {}",
                        index + 1,
                        total_chunks,
                        e
                    );
                    if let FailureAction::Cooldown(cooldown) = pacing.record_failure() {
                        warn!(
                            "{} consecutive chunk failures, pausing pipeline for {}s",
                            pacing.consecutive_failures(),
                            cooldown.as_secs()
                        );
                        self.sleeper.sleep(cooldown).await;
                        pacing.reset_after_cooldown();
                    }
                }
            }

            progress(state.completed_chunks.len(), total_chunks);
        }

        let skipped_chunks = total_chunks - state.completed_chunks.len();
        if skipped_chunks == 0 {
            CheckpointState::delete(&self.checkpoint_path)?;
            info!("All {} chunks completed, checkpoint removed", total_chunks);
        }

        Ok(RunOutcome {
            units: state.subtitles.clone(),
            skipped_chunks,
            total_chunks,
        })
    }
}
