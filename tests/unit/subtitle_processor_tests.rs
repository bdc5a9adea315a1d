/*!
 * Tests for subtitle parsing and chunking
 */

use std::fmt::Write;
use anyhow::Result;
use bisub::subtitle_processor::{SubtitleCollection, SubtitleRecord};

/// Test timestamp parsing and formatting
#[test]
fn test_timestamp_parsing_withValidTimestamp_shouldParseAndFormat() {
    let ts = "01:23:45,678";
    let ms = SubtitleRecord::parse_timestamp(ts).unwrap();
    assert_eq!(ms, 5_025_678);

    let formatted = SubtitleRecord::format_timestamp(ms);
    assert_eq!(formatted, ts);
}

/// Test timestamp parsing with a dot separator and short fraction
#[test]
fn test_timestamp_parsing_withDotSeparator_shouldParse() {
    assert_eq!(SubtitleRecord::parse_timestamp("00:00:01.500").unwrap(), 1_500);
    // ".5" means 500 ms, not 5 ms
    assert_eq!(SubtitleRecord::parse_timestamp("00:00:01.5").unwrap(), 1_500);
    // Fraction is optional
    assert_eq!(SubtitleRecord::parse_timestamp("00:00:01").unwrap(), 1_000);
}

/// Test timestamp parsing rejects malformed input
#[test]
fn test_timestamp_parsing_withInvalidInput_shouldFail() {
    assert!(SubtitleRecord::parse_timestamp("not a time").is_err());
    assert!(SubtitleRecord::parse_timestamp("00:99:00,000").is_err());
}

/// Test record display formatting
#[test]
fn test_record_display_withValidRecord_shouldFormatCorrectly() {
    let record = SubtitleRecord::new(1, 5000, 10000, "Test subtitle".to_string());
    let mut output = String::new();
    write!(output, "{}", record).unwrap();

    assert!(output.contains('1'));
    assert!(output.contains("00:00:05,000 --> 00:00:10,000"));
    assert!(output.contains("Test subtitle"));
}

/// Test SRT parsing of standard blocks
#[test]
fn test_parse_srt_string_withStandardBlocks_shouldParseAll() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:03,000\nHello there\n\n\
                   2\n00:00:04,000 --> 00:00:06,500\nSecond line\nwraps here\n\n";

    let records = SubtitleCollection::parse_srt_string(content)?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, 1);
    assert_eq!(records[0].start_ms, 1_000);
    assert_eq!(records[0].end_ms, 3_000);
    assert_eq!(records[0].text, "Hello there");

    // Multiple text lines are joined into a single string
    assert_eq!(records[1].text, "Second line wraps here");
    assert_eq!(records[1].end_ms, 6_500);

    Ok(())
}

/// Test SRT parsing of CRLF-terminated files
#[test]
fn test_parse_srt_string_withCrlfLineEndings_shouldParseBlocks() -> Result<()> {
    let content = "1\r\n00:00:01,000 --> 00:00:03,000\r\nHello there\r\n\r\n\
                   2\r\n00:00:04,000 --> 00:00:06,500\r\nSecond line\r\n\r\n";

    let records = SubtitleCollection::parse_srt_string(content)?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].text, "Hello there");
    assert_eq!(records[0].end_ms, 3_000);
    assert_eq!(records[1].start_ms, 4_000);
    assert_eq!(records[1].text, "Second line");

    Ok(())
}

/// Test SRT parsing without index lines
#[test]
fn test_parse_srt_string_withoutIndexLines_shouldParse() -> Result<()> {
    let content = "00:00:01,000 --> 00:00:03,000\nNo index here\n\n\
                   00:00:04.000 --> 00:00:06.000\nDot separator\n\n";

    let records = SubtitleCollection::parse_srt_string(content)?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].text, "No index here");
    assert_eq!(records[1].start_ms, 4_000);

    Ok(())
}

/// Test SRT parsing assigns ids from source ordering
#[test]
fn test_parse_srt_string_withGappyIndexes_shouldRenumber() -> Result<()> {
    let content = "7\n00:00:01,000 --> 00:00:02,000\nFirst\n\n\
                   99\n00:00:03,000 --> 00:00:04,000\nSecond\n\n";

    let records = SubtitleCollection::parse_srt_string(content)?;
    let ids: Vec<usize> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2]);

    Ok(())
}

/// Test SRT parsing rejects content with no usable blocks
#[test]
fn test_parse_srt_string_withNoValidBlocks_shouldFail() {
    assert!(SubtitleCollection::parse_srt_string("").is_err());
    assert!(SubtitleCollection::parse_srt_string("just some prose\nwith no timing").is_err());
}

/// Test fixed-size chunking is deterministic and order-preserving
#[test]
fn test_split_into_chunks_with301RecordsAndSize150_shouldYieldThreeChunks() {
    let collection = SubtitleCollection {
        source_file: "test.srt".into(),
        records: crate::common::make_records(301),
    };

    let chunks = collection.split_into_chunks(150);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].len(), 150);
    assert_eq!(chunks[1].len(), 150);
    assert_eq!(chunks[2].len(), 1);

    // Order preserved across chunk boundaries
    assert_eq!(chunks[0][0].id, 1);
    assert_eq!(chunks[1][0].id, 151);
    assert_eq!(chunks[2][0].id, 301);
}

/// Test chunk count calculation
#[test]
fn test_chunk_count_withVariousSizes_shouldRoundUp() {
    assert_eq!(SubtitleCollection::chunk_count(301, 150), 3);
    assert_eq!(SubtitleCollection::chunk_count(300, 150), 2);
    assert_eq!(SubtitleCollection::chunk_count(1, 150), 1);
    assert_eq!(SubtitleCollection::chunk_count(0, 150), 0);
    // A zero chunk size is clamped rather than dividing by zero
    assert_eq!(SubtitleCollection::chunk_count(5, 0), 5);
}
