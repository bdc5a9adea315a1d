use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use crate::app_config::Config;
use crate::checkpoint::CheckpointState;
use crate::keywords::{apply_user_terms, KeywordExtractor};
use crate::merger;
use crate::orchestrator::ChunkOrchestrator;
use crate::providers::gemini::Gemini;
use crate::providers::TextGenerator;
use crate::subtitle_processor::SubtitleCollection;
use crate::translation_service::{Sleeper, TokioSleeper, TranslationService};

// @module: Application controller wiring the whole pipeline

/// Output paths for one job, each defaulting to a derived sibling of the input
#[derive(Debug, Clone)]
pub struct OutputPaths {
    /// Bilingual subtitle-file export
    pub srt: PathBuf,

    /// Structured JSON export
    pub json: PathBuf,
}

impl OutputPaths {
    /// Resolve output paths, deriving defaults next to the input file
    pub fn resolve(input: &Path, srt: Option<PathBuf>, json: Option<PathBuf>) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());

        let sibling = |suffix: &str| input.with_file_name(format!("{}_bilingual.{}", stem, suffix));

        Self {
            srt: srt.unwrap_or_else(|| sibling("srt")),
            json: json.unwrap_or_else(|| sibling("json")),
        }
    }
}

/// Main application controller for bilingual subtitle generation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Generator implementation
    generator: Arc<dyn TextGenerator>,

    // @field: Timed-wait implementation
    sleeper: Arc<dyn Sleeper>,
}

impl Controller {
    /// Create a controller talking to the real Gemini API
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let generator: Arc<dyn TextGenerator> = Arc::new(Gemini::new(
            config.api_key.clone(),
            config.endpoint.clone(),
            config.timeout_secs,
        ));

        Ok(Self {
            generator,
            sleeper: Arc::new(TokioSleeper),
            config,
        })
    }

    /// Create a controller with injected generator and sleeper - used by tests
    pub fn with_parts(
        config: Config,
        generator: Arc<dyn TextGenerator>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            sleeper,
        })
    }

    /// Run the full pipeline: parse, prime terminology, orchestrate chunks,
    /// merge with original timing and write both artifacts.
    ///
    /// Partial completion is not fatal: the run writes whatever accumulated,
    /// warns with the skipped-chunk count, and leaves the checkpoint in place
    /// so an identical re-invocation resumes from the missing chunks.
    pub async fn run(&self, input: &Path, outputs: OutputPaths) -> Result<()> {
        let collection = SubtitleCollection::parse_srt_file(input)?;
        if collection.records.is_empty() {
            return Err(anyhow!("Input file is empty: {}", input.display()));
        }

        let chunks = collection.split_into_chunks(self.config.chunk_size);
        let total_chunks = chunks.len();
        info!(
            "Input: {} records, {} chunks of up to {}",
            collection.records.len(),
            total_chunks,
            self.config.chunk_size
        );

        let checkpoint_path = CheckpointState::derive_path(&outputs.json);
        let mut state = CheckpointState::load(&checkpoint_path);
        state.align_to(total_chunks, self.config.chunk_size);

        let glossary = self.prime_terminology(&collection, &mut state, &checkpoint_path).await?;

        let progress_bar = ProgressBar::new(total_chunks as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        progress_bar.set_position(state.completed_chunks.len() as u64);

        let orchestrator = ChunkOrchestrator::new(
            TranslationService::new(self.generator.clone(), self.sleeper.clone(), self.config.clone()),
            self.sleeper.clone(),
            self.config.pacing.clone(),
            checkpoint_path,
        );

        let bar = progress_bar.clone();
        let outcome = orchestrator
            .run(&chunks, &glossary, &mut state, move |done, _total| {
                bar.set_position(done as u64);
            })
            .await?;
        progress_bar.finish_and_clear();

        let entries = merger::merge(&collection.records, &outcome.units);
        merger::write_json(&outputs.json, &entries)?;
        merger::write_srt(&outputs.srt, &entries)?;

        info!("JSON export: {}", outputs.json.display());
        info!("SRT export:  {}", outputs.srt.display());

        if outcome.skipped_chunks > 0 {
            warn!(
                "{} of {} chunks permanently failed this run; their records are untranslated in the output. \
                 Re-run the identical command to retry only the missing chunks.",
                outcome.skipped_chunks, outcome.total_chunks
            );
        }

        Ok(())
    }

    /// Produce the terminology context: reuse the checkpoint-cached glossary
    /// when present, otherwise extract (and validate) one and cache the
    /// successful result. A failed extraction yields an empty context and is
    /// not cached, so a later run retries it.
    /// User-supplied terms are concatenated afterwards in either case.
    async fn prime_terminology(
        &self,
        collection: &SubtitleCollection,
        state: &mut CheckpointState,
        checkpoint_path: &Path,
    ) -> Result<String> {
        let cached = match &state.keywords {
            Some(keywords) => {
                info!("Reusing cached terminology context");
                keywords.clone()
            }
            None => {
                let extractor = KeywordExtractor::new(
                    self.generator.clone(),
                    self.sleeper.clone(),
                    self.config.clone(),
                );
                match extractor.extract(&collection.records).await {
                    Some(glossary) => {
                        state.keywords = Some(glossary.clone());
                        // Cache before the first chunk call so an interrupted
                        // run skips re-extraction
                        state.save(checkpoint_path)?;
                        glossary
                    }
                    // A failed extraction is not cached: the next run
                    // retries it
                    None => String::new(),
                }
            }
        };

        Ok(apply_user_terms(&cached, self.config.user_terms.as_deref()))
    }
}
