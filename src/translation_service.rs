use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app_config::Config;
use crate::errors::PipelineError;
use crate::providers::{GenerationRequest, TextGenerator};
use crate::subtitle_processor::SubtitleRecord;

// @module: Per-chunk remote call wrapper with retry, fallback and review

/// Escalating wait times between retry attempts, in seconds.
/// The schedule length bounds the number of attempts per model.
pub const BACKOFF_SCHEDULE: [u64; 5] = [5, 15, 45, 90, 180];

/// Minimum wait after a rate-limit class error, in seconds.
/// Applied as a floor over the schedule's own slot.
pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 60;

/// Timed-wait abstraction.
///
/// Every suspension point in the pipeline goes through this trait so tests
/// can observe pacing decisions without real timers.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for the given duration
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// @struct: The remote service's output for one subtitle record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationUnit {
    // @field: Id of the originating record
    pub id: usize,

    // @field: Source text, possibly ASR-corrected by the service
    #[serde(rename = "en", default)]
    pub source: String,

    // @field: Target-language text
    #[serde(rename = "cn", default)]
    pub target: String,

    // @field: Source sub-lines when the record was split
    #[serde(rename = "en_segments", default, skip_serializing_if = "Option::is_none")]
    pub source_segments: Option<Vec<String>>,

    // @field: Target sub-lines, parallel to source_segments
    #[serde(rename = "cn_segments", default, skip_serializing_if = "Option::is_none")]
    pub target_segments: Option<Vec<String>>,

    // @field: Optional correction note from the review stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TranslationUnit {
    /// Return the segment arrays when both are present, non-empty and of
    /// equal length. A length mismatch is a recoverable anomaly handled by
    /// the merger, never an error here.
    pub fn matched_segments(&self) -> Option<(&[String], &[String])> {
        match (&self.source_segments, &self.target_segments) {
            (Some(src), Some(tgt)) if !src.is_empty() && src.len() == tgt.len() => {
                Some((src.as_slice(), tgt.as_slice()))
            }
            _ => None,
        }
    }
}

/// One record of the payload sent to the service
#[derive(Debug, Serialize)]
struct PayloadRecord<'a> {
    id: usize,
    text: &'a str,
}

/// Translation service wrapping single-chunk calls against the generator
pub struct TranslationService {
    // @field: Generator implementation
    generator: Arc<dyn TextGenerator>,

    // @field: Timed-wait implementation
    sleeper: Arc<dyn Sleeper>,

    // @field: Configuration
    config: Config,
}

impl TranslationService {
    /// Create a new translation service
    pub fn new(generator: Arc<dyn TextGenerator>, sleeper: Arc<dyn Sleeper>, config: Config) -> Self {
        Self {
            generator,
            sleeper,
            config,
        }
    }

    /// Translate one chunk of subtitle records.
    ///
    /// Retries the primary model through the backoff schedule, classifying
    /// rate-limit errors for a longer wait. If the schedule is exhausted the
    /// same chunk gets a single extra attempt on the fallback model before
    /// the chunk is declared failed. A successful translation optionally goes
    /// through the review stage, whose failures never fail the chunk.
    pub async fn translate_chunk(
        &self,
        chunk: &[SubtitleRecord],
        glossary: &str,
        chunk_index: usize,
        total_chunks: usize,
    ) -> Result<Vec<TranslationUnit>, PipelineError> {
        let system = build_translation_prompt(glossary, self.config.split_segments);
        let payload = render_chunk_payload(chunk, chunk_index, total_chunks);

        let attempts = BACKOFF_SCHEDULE.len();
        for (attempt, wait_secs) in BACKOFF_SCHEDULE.iter().enumerate() {
            match self
                .attempt_model(&self.config.primary_model, &system, &payload, chunk)
                .await
            {
                Ok(units) => return Ok(self.maybe_review(chunk, units, glossary).await),
                Err(e) => {
                    warn!(
                        "Chunk {}: attempt {}/{} on {} failed: {}",
                        chunk_index + 1,
                        attempt + 1,
                        attempts,
                        self.config.primary_model,
                        e
                    );
                    if attempt + 1 < attempts {
                        let wait = if e.is_rate_limit() {
                            (*wait_secs).max(RATE_LIMIT_COOLDOWN_SECS)
                        } else {
                            *wait_secs
                        };
                        self.sleeper.sleep(Duration::from_secs(wait)).await;
                    }
                }
            }
        }

        // One extra attempt on the secondary model, no further backoff cycle
        info!(
            "Chunk {}: primary model exhausted, retrying once on {}",
            chunk_index + 1,
            self.config.fallback_model
        );
        let units = self
            .attempt_model(&self.config.fallback_model, &system, &payload, chunk)
            .await?;
        Ok(self.maybe_review(chunk, units, glossary).await)
    }

    /// One call attempt against one model: generate, parse, validate
    async fn attempt_model(
        &self,
        model: &str,
        system: &str,
        payload: &str,
        chunk: &[SubtitleRecord],
    ) -> Result<Vec<TranslationUnit>, PipelineError> {
        let request = GenerationRequest::new(model, payload)
            .system(system)
            .temperature(self.config.temperature);

        let response = self.generator.generate(request).await?;
        let units = parse_units(&response)?;
        validate_units(chunk, &units)?;
        Ok(units)
    }

    /// Run the review stage when enabled, keeping the pre-review result on
    /// any structural mismatch
    async fn maybe_review(
        &self,
        chunk: &[SubtitleRecord],
        units: Vec<TranslationUnit>,
        glossary: &str,
    ) -> Vec<TranslationUnit> {
        if !self.config.review {
            return units;
        }

        match self.review_chunk(chunk, &units, glossary).await {
            Ok(reviewed) => {
                for unit in &reviewed {
                    if let Some(note) = &unit.note {
                        debug!("Review note for record {}: {}", unit.id, note);
                    }
                }
                reviewed
            }
            Err(e) => {
                warn!("Review stage discarded, keeping pre-review result: {}", e);
                units
            }
        }
    }

    /// Second-pass review call. Must return the same count and id set as the
    /// input; anything else is an error the caller folds into a fallback.
    async fn review_chunk(
        &self,
        chunk: &[SubtitleRecord],
        units: &[TranslationUnit],
        glossary: &str,
    ) -> Result<Vec<TranslationUnit>, PipelineError> {
        let system = build_review_prompt(glossary);
        let payload = serde_json::json!({ "subtitles": units }).to_string();

        let request = GenerationRequest::new(&self.config.primary_model, payload)
            .system(&system)
            .temperature(self.config.temperature);

        let response = self.generator.generate(request).await?;
        let reviewed = parse_units(&response)?;
        validate_units(chunk, &reviewed)?;
        Ok(reviewed)
    }
}

/// Render a chunk as the JSON payload the service receives
fn render_chunk_payload(chunk: &[SubtitleRecord], chunk_index: usize, total_chunks: usize) -> String {
    let records: Vec<PayloadRecord> = chunk
        .iter()
        .map(|r| PayloadRecord {
            id: r.id,
            text: &r.text,
        })
        .collect();

    format!(
        "Raw transcript chunk ({}/{}):\n{}",
        chunk_index + 1,
        total_chunks,
        serde_json::to_string(&records).unwrap_or_default()
    )
}

/// Parse the service response into translation units.
///
/// Accepts either `{"subtitles": [...]}` or a bare top-level array, with or
/// without markdown code fences around the JSON.
pub fn parse_units(response: &str) -> Result<Vec<TranslationUnit>, PipelineError> {
    let trimmed = strip_code_fences(response);

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| PipelineError::Validation(format!("Response is not valid JSON: {}", e)))?;

    let list = match &value {
        Value::Object(map) => map
            .get("subtitles")
            .cloned()
            .ok_or_else(|| PipelineError::Validation("Response object has no \"subtitles\" key".to_string()))?,
        Value::Array(_) => value,
        other => {
            return Err(PipelineError::Validation(format!(
                "Unexpected response shape: {}",
                other
            )));
        }
    };

    serde_json::from_value(list)
        .map_err(|e| PipelineError::Validation(format!("Response entries are malformed: {}", e)))
}

/// Strip a surrounding markdown code fence, if any
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(inner) = rest.trim_start().strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}

/// Validate that the units exactly cover the chunk: same count, same id set
pub fn validate_units(chunk: &[SubtitleRecord], units: &[TranslationUnit]) -> Result<(), PipelineError> {
    if units.len() != chunk.len() {
        return Err(PipelineError::Validation(format!(
            "Entry count mismatch: expected {}, got {}",
            chunk.len(),
            units.len()
        )));
    }

    let expected: BTreeSet<usize> = chunk.iter().map(|r| r.id).collect();
    let received: BTreeSet<usize> = units.iter().map(|u| u.id).collect();
    if expected != received {
        return Err(PipelineError::Validation(format!(
            "Id set mismatch: expected {:?}, got {:?}",
            expected, received
        )));
    }

    Ok(())
}

/// Build the translation system prompt with the terminology section
pub fn build_translation_prompt(glossary: &str, split_segments: bool) -> String {
    let keyword_section = if glossary.trim().is_empty() {
        String::new()
    } else {
        format!(
            "\n### Global Context & Terminology (CRITICAL)\n\
             Use the following keywords to correct ASR errors and ensure consistent translation:\n{}\n",
            glossary
        )
    };

    let segmentation_rule = if split_segments {
        "3. **Segmentation (Netflix standard)**:\n\
         - If an entry is too long for one display line (over 42 characters for English), split it into sub-lines.\n\
         - Return the sub-lines as parallel arrays \"en_segments\" and \"cn_segments\" with the SAME number of elements.\n\
         - NEVER break a line inside a grammatical unit.\n\
         - Entries that fit on one line must omit the segment arrays.\n"
    } else {
        "3. **Segmentation**: Do NOT split entries; never emit segment arrays.\n"
    };

    format!(
        "You are a Netflix-level Subtitle Specialist and Linguistic Expert.\n\
         Your task is to process raw ASR (speech-to-text) transcripts. The transcripts may contain phonetic errors.\n\
         {keyword_section}\
         ### Processing Rules\n\
         1. **ASR Correction**: If a phrase sounds like a keyword in the context but is spelled wrong, CORRECT the source first. \
         Do NOT hallucinate new meanings.\n\
         2. **Cleaning**: Remove filler words (uh, um, you know, like) and source tags.\n\
         {segmentation_rule}\
         4. **Translation**: Translate into Simplified Chinese. Style: professional, natural, concise.\n\
         5. **Output Format**: Return strictly valid JSON:\n\
         {{\"subtitles\": [{{\"id\": 12, \"en\": \"...\", \"cn\": \"...\"}}]}}\n\
         Every input entry must appear exactly once in the output with its original \"id\"."
    )
}

/// Build the review-stage system prompt
fn build_review_prompt(glossary: &str) -> String {
    let keyword_section = if glossary.trim().is_empty() {
        String::new()
    } else {
        format!("\n### Terminology\n{}\n", glossary)
    };

    format!(
        "You are a senior subtitle reviewer.\n\
         You receive a JSON list of translated subtitles under the key \"subtitles\".\n\
         {keyword_section}\
         Check each entry for translation accuracy, terminology consistency and natural phrasing, \
         and correct entries in place where needed. You may add a short \"note\" field to an entry \
         describing the correction.\n\
         Return the FULL corrected list as {{\"subtitles\": [...]}} with the same number of entries \
         and the same \"id\" values as the input."
    )
}
