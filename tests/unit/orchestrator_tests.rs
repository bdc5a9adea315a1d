/*!
 * Tests for the chunk orchestrator: pacing state machine, resume,
 * skip-on-failure and the global failure budget
 */

use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tempfile::tempdir;

use bisub::app_config::{Config, PacingConfig};
use bisub::checkpoint::CheckpointState;
use bisub::orchestrator::{ChunkOrchestrator, FailureAction, PacingState};
use bisub::providers::mock::{MockGenerator, MockOutcome};
use bisub::subtitle_processor::SubtitleRecord;
use bisub::translation_service::{TranslationService, BACKOFF_SCHEDULE};

use crate::common::{make_records, units_response, RecordingSleeper};

fn orchestrator_with(
    script: Vec<MockOutcome>,
    checkpoint_path: std::path::PathBuf,
) -> (Arc<MockGenerator>, Arc<RecordingSleeper>, ChunkOrchestrator) {
    let config = Config::default();
    let generator = Arc::new(MockGenerator::with_script(script));
    let sleeper = Arc::new(RecordingSleeper::new());
    let service = TranslationService::new(generator.clone(), sleeper.clone(), config.clone());
    let orchestrator = ChunkOrchestrator::new(service, sleeper.clone(), config.pacing, checkpoint_path);
    (generator, sleeper, orchestrator)
}

fn chunk_records(records: &[SubtitleRecord], size: usize) -> Vec<Vec<SubtitleRecord>> {
    records.chunks(size).map(|c| c.to_vec()).collect()
}

/// A chunk failure costs one attempt per backoff slot plus the fallback
fn failing_chunk_script() -> Vec<MockOutcome> {
    (0..=BACKOFF_SCHEDULE.len()).map(|_| MockOutcome::Error).collect()
}

/// Test success resets the adaptive delay and the failure counter
#[test]
fn test_pacing_state_withSuccess_shouldResetDelay() {
    let mut pacing = PacingState::new(PacingConfig::default());
    assert_eq!(pacing.delay(), Duration::from_secs(2));

    pacing.record_failure();
    pacing.record_failure();
    assert_eq!(pacing.delay(), Duration::from_secs(8));
    assert_eq!(pacing.consecutive_failures(), 2);

    pacing.record_success();
    assert_eq!(pacing.delay(), Duration::from_secs(2));
    assert_eq!(pacing.consecutive_failures(), 0);
}

/// Test the adaptive delay doubles and is capped at the maximum
#[test]
fn test_pacing_state_withRepeatedFailures_shouldCapDelay() {
    let config = PacingConfig {
        min_delay_secs: 2,
        max_delay_secs: 10,
        failure_threshold: 100,
        cooldown_secs: 300,
    };
    let mut pacing = PacingState::new(config);

    pacing.record_failure();
    assert_eq!(pacing.delay(), Duration::from_secs(4));
    pacing.record_failure();
    assert_eq!(pacing.delay(), Duration::from_secs(8));
    pacing.record_failure();
    assert_eq!(pacing.delay(), Duration::from_secs(10));
    pacing.record_failure();
    assert_eq!(pacing.delay(), Duration::from_secs(10));
}

/// Test the failure budget triggers the cooldown exactly at the threshold
#[test]
fn test_pacing_state_withThresholdReached_shouldRequestCooldown() {
    let mut pacing = PacingState::new(PacingConfig::default());

    assert_eq!(pacing.record_failure(), FailureAction::Continue);
    assert_eq!(pacing.record_failure(), FailureAction::Continue);
    assert_eq!(
        pacing.record_failure(),
        FailureAction::Cooldown(Duration::from_secs(300))
    );

    pacing.reset_after_cooldown();
    assert_eq!(pacing.consecutive_failures(), 0);
    assert_eq!(pacing.delay(), Duration::from_secs(2));
    // The budget starts over after the cooldown
    assert_eq!(pacing.record_failure(), FailureAction::Continue);
}

/// Test a clean run completes every chunk and removes the checkpoint
#[tokio::test]
async fn test_run_withAllChunksSucceeding_shouldDeleteCheckpoint() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("ckpt.json");

    let records = make_records(6);
    let chunks = chunk_records(&records, 2);
    let script = chunks.iter().map(|c| MockOutcome::Text(units_response(c))).collect();

    let (generator, sleeper, orchestrator) = orchestrator_with(script, path.clone());
    let mut state = CheckpointState::load(&path);
    state.align_to(chunks.len(), 2);

    let outcome = orchestrator.run(&chunks, "", &mut state, |_, _| {}).await?;

    assert_eq!(outcome.total_chunks, 3);
    assert_eq!(outcome.skipped_chunks, 0);
    assert_eq!(outcome.units.len(), 6);
    assert_eq!(generator.call_count(), 3);
    assert!(!path.exists());

    // Paced between calls at the minimum delay, never before the first
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(2), Duration::from_secs(2)]);

    Ok(())
}

/// Test a permanently failed chunk is skipped, not aborting the run
#[tokio::test]
async fn test_run_withFailedChunk_shouldSkipAndKeepCheckpoint() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("ckpt.json");

    let records = make_records(6);
    let chunks = chunk_records(&records, 2);

    let mut script = vec![MockOutcome::Text(units_response(&chunks[0]))];
    script.extend(failing_chunk_script());
    script.push(MockOutcome::Text(units_response(&chunks[2])));

    let (_, _, orchestrator) = orchestrator_with(script, path.clone());
    let mut state = CheckpointState::load(&path);
    state.align_to(chunks.len(), 2);

    let outcome = orchestrator.run(&chunks, "", &mut state, |_, _| {}).await?;

    assert_eq!(outcome.skipped_chunks, 1);
    assert_eq!(outcome.units.len(), 4);
    assert!(path.exists());

    let saved = CheckpointState::load(&path);
    assert_eq!(saved.completed_chunks, [0, 2].into_iter().collect());

    Ok(())
}

/// Test idempotent resume: the second run only touches the missing chunk
#[tokio::test]
async fn test_run_withPriorProgress_shouldOnlyProcessMissingChunks() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("ckpt.json");

    let records = make_records(6);
    let chunks = chunk_records(&records, 2);

    // First run: middle chunk fails permanently
    let mut script = vec![MockOutcome::Text(units_response(&chunks[0]))];
    script.extend(failing_chunk_script());
    script.push(MockOutcome::Text(units_response(&chunks[2])));
    let (_, _, first) = orchestrator_with(script, path.clone());
    let mut state = CheckpointState::load(&path);
    state.align_to(chunks.len(), 2);
    first.run(&chunks, "", &mut state, |_, _| {}).await?;

    // Second run: only the missing chunk gets a remote call
    let (generator, sleeper, second) =
        orchestrator_with(vec![MockOutcome::Text(units_response(&chunks[1]))], path.clone());
    let mut state = CheckpointState::load(&path);
    state.align_to(chunks.len(), 2);
    let outcome = second.run(&chunks, "", &mut state, |_, _| {}).await?;

    assert_eq!(generator.call_count(), 1);
    assert_eq!(outcome.skipped_chunks, 0);
    assert_eq!(outcome.units.len(), 6);
    assert!(!path.exists());

    // Chunks satisfied by the prior run trigger no pacing sleeps
    assert!(sleeper.sleeps().is_empty());

    // Every record id is present exactly once
    let mut ids: Vec<usize> = outcome.units.iter().map(|u| u.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=6).collect::<Vec<_>>());

    Ok(())
}

/// Test sustained failures trigger the global pause exactly once and reset
/// the adaptive delay afterwards
#[tokio::test]
async fn test_run_withConsecutiveFailures_shouldPauseOnceAndResetDelay() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("ckpt.json");

    let records = make_records(4);
    let chunks = chunk_records(&records, 1);

    // Three failing chunks hit the budget, the fourth succeeds
    let mut script = Vec::new();
    for _ in 0..3 {
        script.extend(failing_chunk_script());
    }
    script.push(MockOutcome::Text(units_response(&chunks[3])));

    let (_, sleeper, orchestrator) = orchestrator_with(script, path.clone());
    let mut state = CheckpointState::load(&path);
    state.align_to(chunks.len(), 1);

    let outcome = orchestrator.run(&chunks, "", &mut state, |_, _| {}).await?;
    assert_eq!(outcome.skipped_chunks, 3);

    // The long pipeline-wide pause happened exactly once
    assert_eq!(sleeper.count_of_secs(300), 1);

    // Inter-chunk delays doubled while failing (4s, 8s), then the
    // post-cooldown chunk was paced at the reset minimum (2s)
    assert_eq!(sleeper.count_of_secs(4), 1);
    assert_eq!(sleeper.count_of_secs(8), 1);
    assert_eq!(sleeper.count_of_secs(2), 1);

    Ok(())
}
