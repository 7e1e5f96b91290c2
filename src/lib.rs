//! Storyboard - shot list to image sequence
//!
//! Storyboard takes a list of prompts (one per shot), sends each one to a
//! remote image model together with shared style settings, and collects the
//! results as an ordered storyboard that can be exported as a zip archive.
//!
//! # Architecture
//!
//! - **Sequencer**: drives frames through the generator strictly one at a
//!   time, with cooperative cancellation checked before and after each call
//! - **Generator**: pluggable remote backends (server proxy or direct Gemini)
//! - **Frames**: per-shot records whose status only moves forward
//! - **Export**: zip archive of completed frames, or single-frame files
//!
//! # Main Modules
//!
//! - [`sequencer`] - run state machine and events
//! - [`generator`] - `ImageGenerator` trait and backends
//! - [`frame`] - frame records and image payloads
//! - [`settings`] - model, aspect ratio, theme, genre, palette
//! - [`export`] - archive writing
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storyboard::{create_generator, AppConfig, Sequencer};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::load(None)?;
//! let sequencer = Sequencer::new(Arc::from(create_generator(&config)?));
//! let prompts = storyboard::prompt::parse_prompt_list("A red cube\nA blue sphere");
//! let summary = sequencer.start_run(prompts, config.defaults.clone()).await?;
//!
//! let frames = sequencer.frames();
//! storyboard::export::export_archive(&frames, &config.output_dir, chrono::Utc::now())?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod export;
pub mod frame;
pub mod generator;
pub mod logging;
pub mod presentation;
pub mod prompt;
pub mod sequencer;
pub mod settings;

pub use config::AppConfig;
pub use frame::{FrameRecord, FrameStatus, ImagePayload};
pub use generator::{create_generator, GenerationError, ImageGenerator};
pub use sequencer::{RunEvent, RunSummary, Sequencer, SequencerError};
pub use settings::{AspectRatio, GenerationSettings, ModelType, SettingsStore};
