/*!
 * # bisub - Bilingual Subtitle Generator
 *
 * A Rust library that turns a monolingual SRT transcript into a reviewed,
 * timing-accurate bilingual subtitle track using an external text-generation
 * service, with durable, resumable progress.
 *
 * ## Features
 *
 * - SRT parsing into structured, timed records
 * - One-shot terminology extraction, cached across runs
 * - Fixed-size chunking with checkpoint resume: completed chunks are never
 *   re-sent, failed chunks are skipped and retried on the next run
 * - Adaptive inter-chunk pacing, rate-limit aware retries, model fallback
 *   and a global failure budget with a pipeline-wide cooldown
 * - Optional second-pass review of each translated chunk
 * - Timing-preserving reassembly with proportional sub-splitting of long
 *   records, exported as JSON and bilingual SRT
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: SRT parsing, timestamps and chunking
 * - `keywords`: Terminology extraction and user-term handling
 * - `translation_service`: Per-chunk remote call wrapper (retry, fallback,
 *   review)
 * - `checkpoint`: Durable progress state with atomic writes
 * - `orchestrator`: The resumable chunk-processing state machine
 * - `merger`: Timing reassembly and output serialization
 * - `providers`: Text-generation clients:
 *   - `providers::gemini`: Google Gemini API client
 *   - `providers::mock`: Scriptable generator for tests
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod checkpoint;
pub mod errors;
pub mod keywords;
pub mod merger;
pub mod orchestrator;
pub mod providers;
pub mod subtitle_processor;
pub mod translation_service;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, OutputPaths};
pub use checkpoint::CheckpointState;
pub use merger::MergedEntry;
pub use orchestrator::{ChunkOrchestrator, RunOutcome};
pub use subtitle_processor::{SubtitleCollection, SubtitleRecord};
pub use translation_service::{TranslationService, TranslationUnit};
pub use errors::{AppError, PipelineError, ProviderError};
