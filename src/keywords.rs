use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use log::{info, warn};
use serde::Deserialize;

use crate::app_config::Config;
use crate::providers::{GenerationRequest, TextGenerator};
use crate::subtitle_processor::SubtitleRecord;
use crate::translation_service::{BACKOFF_SCHEDULE, RATE_LIMIT_COOLDOWN_SECS, Sleeper};

// @module: One-shot terminology extraction priming the translation calls

/// Maximum transcript lines fed to the extraction call
pub const KEYWORD_SAMPLE_LINES: usize = 200;

/// One extracted keyword
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordEntry {
    /// The term itself
    pub term: String,

    /// What the term is
    #[serde(default)]
    pub description: String,

    /// Common ASR misspellings to avoid
    #[serde(default)]
    pub correction: String,
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    #[serde(default)]
    keywords: Vec<KeywordEntry>,
}

/// Terminology extractor: runs at most once per logical job, result is
/// cached in the checkpoint and reused verbatim on resume.
pub struct KeywordExtractor {
    generator: Arc<dyn TextGenerator>,
    sleeper: Arc<dyn Sleeper>,
    config: Config,
}

impl KeywordExtractor {
    /// Create a new extractor
    pub fn new(generator: Arc<dyn TextGenerator>, sleeper: Arc<dyn Sleeper>, config: Config) -> Self {
        Self {
            generator,
            sleeper,
            config,
        }
    }

    /// Extract a glossary from the transcript, then run the validation pass.
    ///
    /// Extraction failure is never fatal, but it is distinct from success:
    /// `None` means the retry schedule was exhausted and the job proceeds
    /// without a keyword table, while `Some("")` means the service answered
    /// and found nothing. Callers must only cache the `Some` case so a
    /// resumed run retries a failed extraction. The validation pass may
    /// revise the glossary; its failure keeps the unvalidated one.
    pub async fn extract(&self, records: &[SubtitleRecord]) -> Option<String> {
        let sample = sample_lines(records, KEYWORD_SAMPLE_LINES).join("\n");

        info!("Extracting keywords from transcript sample");
        let glossary = match self
            .call_with_backoff(EXTRACTION_PROMPT, &format!("Transcript sample:\n{}", sample))
            .await
        {
            Some(entries) if entries.is_empty() => {
                info!("No keywords extracted, proceeding without keyword table");
                return Some(String::new());
            }
            Some(entries) => {
                info!("Extracted {} keywords", entries.len());
                format_keyword_table(&entries)
            }
            None => {
                warn!("Keyword extraction failed after all retries, proceeding without keywords");
                return None;
            }
        };

        Some(self.validate_glossary(&glossary, &sample).await)
    }

    /// Independent second pass that lets the model correct its own
    /// misrecognitions before the glossary is cached
    async fn validate_glossary(&self, glossary: &str, sample: &str) -> String {
        let payload = format!(
            "Extracted keyword table:\n{}\n\nTranscript sample:\n{}",
            glossary, sample
        );

        let request = GenerationRequest::new(&self.config.primary_model, payload)
            .system(VALIDATION_PROMPT)
            .temperature(self.config.temperature);

        match self.generator.generate(request).await {
            Ok(response) => match parse_keywords(&response) {
                Ok(entries) if !entries.is_empty() => {
                    info!("Keyword validation pass kept {} entries", entries.len());
                    format_keyword_table(&entries)
                }
                _ => {
                    warn!("Keyword validation returned no usable table, keeping unvalidated glossary");
                    glossary.to_string()
                }
            },
            Err(e) => {
                warn!("Keyword validation failed, keeping unvalidated glossary: {}", e);
                glossary.to_string()
            }
        }
    }

    /// Retry the extraction call through the backoff schedule.
    /// Returns None when all attempts fail.
    async fn call_with_backoff(&self, system: &str, payload: &str) -> Option<Vec<KeywordEntry>> {
        let attempts = BACKOFF_SCHEDULE.len();
        for (attempt, wait_secs) in BACKOFF_SCHEDULE.iter().enumerate() {
            let request = GenerationRequest::new(&self.config.primary_model, payload)
                .system(system)
                .temperature(self.config.temperature);

            match self.generator.generate(request).await {
                Ok(response) => match parse_keywords(&response) {
                    Ok(entries) => return Some(entries),
                    Err(e) => warn!(
                        "Keyword extraction attempt {}/{} returned malformed output: {}",
                        attempt + 1,
                        attempts,
                        e
                    ),
                },
                Err(e) => {
                    warn!(
                        "Keyword extraction attempt {}/{} failed: {}",
                        attempt + 1,
                        attempts,
                        e
                    );
                    if attempt + 1 < attempts {
                        let wait = if e.is_rate_limit() {
                            (*wait_secs).max(RATE_LIMIT_COOLDOWN_SECS)
                        } else {
                            *wait_secs
                        };
                        self.sleeper.sleep(Duration::from_secs(wait)).await;
                        continue;
                    }
                }
            }

            if attempt + 1 < attempts {
                self.sleeper.sleep(Duration::from_secs(*wait_secs)).await;
            }
        }
        None
    }
}

/// Deterministic sample of record texts for very long inputs: beginning,
/// middle and end slices, deduplicated, order preserved. A pure input
/// reduction; it never changes pipeline correctness.
pub fn sample_lines(records: &[SubtitleRecord], max_lines: usize) -> Vec<String> {
    if records.len() <= max_lines {
        return records.iter().map(|r| r.text.clone()).collect();
    }

    let slice_len = (max_lines / 3).max(1);
    let middle_start = records.len() / 2 - slice_len / 2;
    let end_start = records.len() - slice_len;

    let mut seen = std::collections::HashSet::new();
    let mut lines = Vec::with_capacity(slice_len * 3);

    let ranges = [
        0..slice_len,
        middle_start..middle_start + slice_len,
        end_start..records.len(),
    ];
    for range in ranges {
        for record in &records[range] {
            if seen.insert(record.text.clone()) {
                lines.push(record.text.clone());
            }
        }
    }

    lines
}

/// Render keyword entries as the human-readable table injected into prompts
pub fn format_keyword_table(entries: &[KeywordEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut line = format!("- {}", entry.term);
        match (entry.description.is_empty(), entry.correction.is_empty()) {
            (false, false) => line.push_str(&format!(" ({}, {})", entry.description, entry.correction)),
            (false, true) => line.push_str(&format!(" ({})", entry.description)),
            (true, false) => line.push_str(&format!(" ({})", entry.correction)),
            (true, true) => {}
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Append user-supplied "term:description" pairs after the extracted
/// glossary. Always applied, regardless of cache state.
pub fn apply_user_terms(glossary: &str, user_terms: Option<&str>) -> String {
    let Some(terms) = user_terms.filter(|t| !t.trim().is_empty()) else {
        return glossary.to_string();
    };

    let mut lines: Vec<String> = Vec::new();
    if !glossary.trim().is_empty() {
        lines.push(glossary.trim_end().to_string());
    }

    for pair in terms.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        match pair.split_once(':') {
            Some((term, description)) => {
                lines.push(format!("- {} ({})", term.trim(), description.trim()));
            }
            None => lines.push(format!("- {}", pair)),
        }
    }

    lines.join("\n")
}

fn parse_keywords(response: &str) -> Result<Vec<KeywordEntry>> {
    let trimmed = response.trim();
    let parsed: KeywordResponse = serde_json::from_str(trimmed)?;
    Ok(parsed.keywords)
}

const EXTRACTION_PROMPT: &str = "Analyze this subtitle transcript sample. Extract all important keywords that need \
special attention during translation, including:\n\
- Person names (speakers, people mentioned)\n\
- Organization/company names\n\
- Product/brand names\n\
- Technical terms and jargon\n\
- Words that ASR (speech-to-text) commonly misspells\n\n\
Return a strictly valid JSON object with this format:\n\
{\"keywords\": [{\"term\": \"AlphaFold\", \"description\": \"AI system for protein structure prediction\", \
\"correction\": \"NOT 'alpha fold' or 'alpha-fold'\"}]}\n\n\
Only include terms that genuinely appear or are referenced in the transcript. Do not hallucinate terms.";

const VALIDATION_PROMPT: &str = "You are validating a keyword table extracted from a subtitle transcript.\n\
Check each entry against the transcript sample: remove hallucinated terms, fix misrecognized spellings, \
and keep descriptions short.\n\
Return the corrected table as a strictly valid JSON object: {\"keywords\": [{\"term\": \"...\", \
\"description\": \"...\", \"correction\": \"...\"}]}";
