use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use regex::Regex;
use once_cell::sync::Lazy;
use anyhow::{Result, anyhow};
use log::warn;

// @module: Subtitle record parsing and chunking

// @const: SRT timing-line regex, accepts "," or "." before the optional millisecond part
static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{1,2}):(\d{2}):(\d{2})(?:[,.](\d{1,3}))?\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})(?:[,.](\d{1,3}))?",
    )
    .unwrap()
});

// @struct: One parsed subtitle record, immutable once parsed
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleRecord {
    // @field: Stable id from source ordering (1-based)
    pub id: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Cleaned source-language text
    pub text: String,
}

impl SubtitleRecord {
    /// Creates a new subtitle record - used by tests and external consumers
    #[allow(dead_code)]
    pub fn new(id: usize, start_ms: u64, end_ms: u64, text: String) -> Self {
        SubtitleRecord {
            id,
            start_ms,
            end_ms,
            text,
        }
    }

    /// Parse an SRT timestamp ("HH:MM:SS,mmm" or "HH:MM:SS.mmm", fraction
    /// optional) to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        static SINGLE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})(?:[,.](\d{1,3}))?$").unwrap()
        });

        let caps = SINGLE
            .captures(timestamp.trim())
            .ok_or_else(|| anyhow!("Invalid timestamp format: {}", timestamp))?;

        let hours: u64 = caps[1].parse()?;
        let minutes: u64 = caps[2].parse()?;
        let seconds: u64 = caps[3].parse()?;
        let millis = caps.get(4).map_or(0, |m| parse_millis(m.as_str()));

        if minutes >= 60 || seconds >= 60 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.id)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_ms),
            Self::format_timestamp(self.end_ms)
        )?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

// A fractional part like ".5" means 500 ms, not 5 ms
fn parse_millis(fraction: &str) -> u64 {
    let mut padded = fraction.to_string();
    while padded.len() < 3 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

/// Collection of subtitle records parsed from one input file
#[derive(Debug)]
pub struct SubtitleCollection {
    /// Source filename
    pub source_file: PathBuf,

    /// Ordered list of records
    pub records: Vec<SubtitleRecord>,
}

impl SubtitleCollection {
    /// Parse an SRT file into a collection
    pub fn parse_srt_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(anyhow!("Input file not found: {}", path.display()));
        }

        let content = fs::read_to_string(path)?;
        let records = Self::parse_srt_string(&content)?;

        Ok(SubtitleCollection {
            source_file: path.to_path_buf(),
            records,
        })
    }

    /// Parse SRT format content into subtitle records.
    ///
    /// Input is a sequence of blocks separated by blank lines. Each block is
    /// an optional numeric index line, a timing line, and one or more text
    /// lines joined into a single string. Records are re-numbered 1..n in
    /// source order; the original index line is only used to recognize the
    /// block shape.
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleRecord>> {
        // CRLF-terminated files are the common case for subtitles; normalize
        // before block splitting so "\r\n\r\n" separators are recognized
        let content = content.replace("\r\n", "\n");
        let mut records = Vec::new();

        for block in content.split("\n\n").map(str::trim) {
            if block.is_empty() {
                continue;
            }

            let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
            if lines.is_empty() {
                continue;
            }

            // Find the timing line: first line, or second if the first is a bare index
            let (timing_idx, caps) = match lines
                .iter()
                .take(2)
                .enumerate()
                .find_map(|(i, l)| TIMING_REGEX.captures(l).map(|c| (i, c)))
            {
                Some(found) => found,
                None => {
                    warn!("Skipping block without a timing line: {:?}", lines.first());
                    continue;
                }
            };

            let start_ms = timestamp_from_captures(&caps, 1);
            let end_ms = timestamp_from_captures(&caps, 5);

            let text = lines[timing_idx + 1..].join(" ");
            if text.trim().is_empty() {
                warn!("Skipping subtitle block with empty text at {}", SubtitleRecord::format_timestamp(start_ms));
                continue;
            }

            records.push(SubtitleRecord {
                id: records.len() + 1,
                start_ms,
                end_ms,
                text: text.trim().to_string(),
            });
        }

        if records.is_empty() {
            return Err(anyhow!("No valid subtitle records were found in the input"));
        }

        Ok(records)
    }

    /// Split records into fixed-size, order-preserving chunks.
    ///
    /// Chunk membership is a deterministic function of (record order, chunk
    /// size); the same input with the same size always yields the same
    /// chunks, which is what makes checkpoint indices meaningful across runs.
    pub fn split_into_chunks(&self, chunk_size: usize) -> Vec<Vec<SubtitleRecord>> {
        if self.records.is_empty() {
            warn!("No subtitle records to split into chunks");
            return Vec::new();
        }

        let effective_size = chunk_size.max(1);
        self.records
            .chunks(effective_size)
            .map(|c| c.to_vec())
            .collect()
    }

    /// Number of chunks a record count yields under a chunk size
    pub fn chunk_count(record_count: usize, chunk_size: usize) -> usize {
        let effective_size = chunk_size.max(1);
        record_count.div_ceil(effective_size)
    }
}

fn timestamp_from_captures(caps: &regex::Captures, start_idx: usize) -> u64 {
    let hours: u64 = caps
        .get(start_idx)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let minutes: u64 = caps
        .get(start_idx + 1)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let seconds: u64 = caps
        .get(start_idx + 2)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let millis = caps
        .get(start_idx + 3)
        .map_or(0, |m| parse_millis(m.as_str()));

    (hours * 3600 + minutes * 60 + seconds) * 1000 + millis
}

impl fmt::Display for SubtitleCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Collection")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Records: {}", self.records.len())?;
        Ok(())
    }
}
