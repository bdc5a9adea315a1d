use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::subtitle_processor::SubtitleRecord;
use crate::translation_service::TranslationUnit;

// @module: Timing reassembly and output serialization

// @struct: Final reassembled output unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedEntry {
    // @field: Originating record id, suffixed ".1", ".2" for split entries
    pub id: String,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Source text
    pub source: String,

    // @field: Target text, empty when the record's chunk was never translated
    pub target: String,
}

/// Reassemble translation units with original record timing.
///
/// Every input record emits at least one entry: untranslated records keep
/// their original text with an empty target, so nothing is silently dropped.
pub fn merge(records: &[SubtitleRecord], units: &[TranslationUnit]) -> Vec<MergedEntry> {
    // Units are keyed by source-record id; append order across chunks is
    // irrelevant here
    let by_id: HashMap<usize, &TranslationUnit> = units.iter().map(|u| (u.id, u)).collect();

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        match by_id.get(&record.id) {
            None => entries.push(MergedEntry {
                id: record.id.to_string(),
                start_ms: record.start_ms,
                end_ms: record.end_ms,
                source: record.text.clone(),
                target: String::new(),
            }),
            Some(unit) => match unit.matched_segments() {
                Some((src_segments, tgt_segments)) => {
                    let ranges = split_time_range(record.start_ms, record.end_ms, src_segments.len());
                    for (i, ((start_ms, end_ms), (src, tgt))) in ranges
                        .into_iter()
                        .zip(src_segments.iter().zip(tgt_segments.iter()))
                        .enumerate()
                    {
                        entries.push(MergedEntry {
                            id: format!("{}.{}", record.id, i + 1),
                            start_ms,
                            end_ms,
                            source: src.clone(),
                            target: tgt.clone(),
                        });
                    }
                }
                None => {
                    if unit.source_segments.is_some() || unit.target_segments.is_some() {
                        warn!(
                            "Record {}: segment arrays do not match, emitting unsplit entry",
                            record.id
                        );
                    }
                    entries.push(MergedEntry {
                        id: record.id.to_string(),
                        start_ms: record.start_ms,
                        end_ms: record.end_ms,
                        source: flatten_text(&unit.source, unit.source_segments.as_deref()),
                        target: flatten_text(&unit.target, unit.target_segments.as_deref()),
                    });
                }
            },
        }
    }

    entries
}

// Mismatched segments fall back to one concatenated string
fn flatten_text(text: &str, segments: Option<&[String]>) -> String {
    match segments {
        Some(parts) if !parts.is_empty() => parts.join(" "),
        _ => text.to_string(),
    }
}

/// Divide [start, end) into `n` contiguous, non-overlapping sub-ranges of
/// equal duration. The final sub-range absorbs the rounding remainder so the
/// last end time equals `end` exactly.
pub fn split_time_range(start_ms: u64, end_ms: u64, n: usize) -> Vec<(u64, u64)> {
    let n = n.max(1) as u64;
    let width = end_ms.saturating_sub(start_ms) / n;

    (0..n)
        .map(|i| {
            let sub_start = start_ms + i * width;
            let sub_end = if i + 1 == n { end_ms } else { start_ms + (i + 1) * width };
            (sub_start, sub_end)
        })
        .collect()
}

/// Write the structured export: a JSON array of merged entries
pub fn write_json<P: AsRef<Path>>(path: P, entries: &[MergedEntry]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(entries).context("Failed to serialize merged entries")?;
    fs::write(path, json).with_context(|| format!("Failed to write JSON export: {}", path.display()))?;
    Ok(())
}

/// Write the bilingual subtitle-file export.
///
/// Sequence numbers are contiguous from 1 and only assigned to entries with
/// non-empty source text; the target line is omitted when empty.
pub fn write_srt<P: AsRef<Path>>(path: P, entries: &[MergedEntry]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file =
        File::create(path).with_context(|| format!("Failed to create subtitle file: {}", path.display()))?;

    let mut counter = 1usize;
    for entry in entries {
        if entry.source.trim().is_empty() {
            continue;
        }

        writeln!(file, "{}", counter)?;
        writeln!(
            file,
            "{} --> {}",
            SubtitleRecord::format_timestamp(entry.start_ms),
            SubtitleRecord::format_timestamp(entry.end_ms)
        )?;
        writeln!(file, "{}", entry.source)?;
        if !entry.target.trim().is_empty() {
            writeln!(file, "{}", entry.target)?;
        }
        writeln!(file)?;
        counter += 1;
    }

    Ok(())
}
