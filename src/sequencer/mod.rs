//! Frame generation sequencer
//!
//! Drives a shot list through the image generator one frame at a time, in
//! submission order. Cancellation is cooperative: the flag is read before a
//! frame starts and again after its remote call returns. An in-flight call is
//! never interrupted, so a long call can only have its result discarded.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storyboard::config::AppConfig;
//! use storyboard::generator::create_generator;
//! use storyboard::sequencer::Sequencer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None)?;
//! let sequencer = Arc::new(Sequencer::new(Arc::from(create_generator(&config)?)));
//!
//! let prompts = vec!["A red cube".to_string(), "A blue sphere".to_string()];
//! let summary = sequencer.start_run(prompts, config.defaults.clone()).await?;
//! println!("{} of {} frames completed", summary.completed, summary.total);
//! # Ok(())
//! # }
//! ```

pub mod events;

pub use events::{RunEvent, RunSummary};

use crate::frame::{FrameError, FrameRecord, FrameStatus};
use crate::generator::ImageGenerator;
use crate::settings::GenerationSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sequencer errors. Per-frame generation failures are never reported here;
/// they end up on the frame itself.
#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("A generation run is already in progress")]
    RunInProgress,

    #[error("Invalid prompt list: {0}")]
    InvalidPrompts(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Owner of the run state: frame records, cancellation flag, running flag.
///
/// Wrap it in an `Arc` to cancel or observe from other tasks while
/// `start_run` is awaited.
pub struct Sequencer {
    generator: Arc<dyn ImageGenerator>,
    frames: RwLock<Vec<FrameRecord>>,
    cancel: Mutex<CancellationToken>,
    running: AtomicBool,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RunEvent>>>,
}

/// Clears the running flag on every exit path of a run.
///
/// Once the records are installed (`started` is set) and the run future is
/// dropped before finishing, every non-terminal frame is skipped and the run
/// is reported as finished and cancelled.
struct RunningGuard<'a> {
    sequencer: &'a Sequencer,
    started: Option<Instant>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let abandoned = self.started.take().map(|started| {
            tracing::warn!("run dropped before finishing");
            self.sequencer.skip_unfinished();
            self.sequencer.summarize(true, started)
        });
        self.sequencer.running.store(false, Ordering::SeqCst);
        if let Some(summary) = abandoned {
            self.sequencer.emit(RunEvent::RunFinished { summary });
        }
    }
}

impl Sequencer {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            generator,
            frames: RwLock::new(Vec::new()),
            cancel: Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Receive every event of subsequent runs
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RunEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the current (or last) run's frames
    pub fn frames(&self) -> Vec<FrameRecord> {
        self.frames
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Ask the active run to stop at its next checkpoint.
    ///
    /// Idempotent. Without an active run this does nothing; the flag is
    /// reset when the next run starts anyway.
    pub fn request_cancel(&self) {
        let token = self
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !self.is_running() {
            tracing::debug!("cancel requested with no active run");
            return;
        }
        if !token.is_cancelled() {
            tracing::info!("cancellation requested");
            token.cancel();
        }
    }

    /// Run the whole shot list to completion.
    ///
    /// Returns once every frame is terminal. Rejected without touching any
    /// state when a run is already active, when the prompt list is empty or
    /// holds a blank prompt, or when the generator is misconfigured.
    pub async fn start_run(
        &self,
        prompts: Vec<String>,
        settings: GenerationSettings,
    ) -> Result<RunSummary, SequencerError> {
        if prompts.is_empty() {
            return Err(SequencerError::InvalidPrompts(
                "at least one prompt is required".to_string(),
            ));
        }
        if let Some(index) = prompts.iter().position(|p| p.trim().is_empty()) {
            return Err(SequencerError::InvalidPrompts(format!(
                "prompt {} is empty",
                index + 1
            )));
        }

        // Claiming the run and resetting the flag happen under the cancel
        // lock, so a request_cancel can never land on the previous token.
        let token = {
            let mut cancel = self
                .cancel
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if self
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Err(SequencerError::RunInProgress);
            }
            *cancel = CancellationToken::new();
            cancel.clone()
        };
        let mut guard = RunningGuard {
            sequencer: self,
            started: None,
        };

        self.generator
            .check_configuration(&settings)
            .map_err(|e| SequencerError::Configuration(e.to_string()))?;

        let started = Instant::now();
        let total = prompts.len();
        let records: Vec<FrameRecord> = prompts
            .into_iter()
            .enumerate()
            .map(|(index, prompt)| FrameRecord::new(prompt, index))
            .collect();
        *self.write_frames() = records.clone();
        guard.started = Some(started);

        tracing::info!(
            frames = total,
            generator = self.generator.name(),
            model = %settings.model,
            aspect_ratio = %settings.aspect_ratio,
            "run started"
        );
        self.emit(RunEvent::RunStarted { frames: records });
        // Observers get a turn with the all-Pending board before the first call
        tokio::task::yield_now().await;

        let mut cancelled = false;
        for index in 0..total {
            if token.is_cancelled() {
                self.skip_from(index)?;
                cancelled = true;
                break;
            }

            let frame = self.update_frame(index, |f| f.begin())?;
            self.emit(RunEvent::FrameUpdated {
                frame: frame.clone(),
            });

            let result = self.generator.generate(frame.prompt(), &settings).await;

            if token.is_cancelled() {
                // The result of the in-flight call is dropped unseen
                self.skip_from(index)?;
                cancelled = true;
                break;
            }

            let frame = match result {
                Ok(image) => self.update_frame(index, |f| f.complete(image))?,
                Err(e) => {
                    tracing::warn!(frame = index, error = %e, "frame generation failed");
                    self.update_frame(index, |f| f.fail(e.to_string()))?
                }
            };
            self.emit(RunEvent::FrameUpdated { frame });
        }

        let summary = self.summarize(cancelled, started);
        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed_ms,
            "run finished"
        );

        guard.started = None;
        drop(guard);
        self.emit(RunEvent::RunFinished {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    fn write_frames(&self) -> RwLockWriteGuard<'_, Vec<FrameRecord>> {
        self.frames
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_frame<F>(&self, index: usize, f: F) -> Result<FrameRecord, SequencerError>
    where
        F: FnOnce(&mut FrameRecord) -> Result<(), FrameError>,
    {
        let mut frames = self.write_frames();
        let frame = &mut frames[index];
        f(frame)?;
        Ok(frame.clone())
    }

    /// Skip `index` and every later frame in a single write
    fn skip_from(&self, index: usize) -> Result<(), SequencerError> {
        let skipped = {
            let mut frames = self.write_frames();
            let mut skipped = Vec::with_capacity(frames.len() - index);
            for frame in frames[index..].iter_mut() {
                frame.skip()?;
                skipped.push(frame.clone());
            }
            skipped
        };
        tracing::info!(from = index, count = skipped.len(), "frames skipped after cancellation");
        self.emit(RunEvent::FramesSkipped { frames: skipped });
        Ok(())
    }

    /// Skip whatever is still Pending or Generating. Used when a run is
    /// dropped mid-flight, so it cannot return an error.
    fn skip_unfinished(&self) {
        let skipped: Vec<FrameRecord> = {
            let mut frames = self.write_frames();
            frames
                .iter_mut()
                .filter(|f| !f.status().is_terminal())
                .filter_map(|f| f.skip().ok().map(|_| f.clone()))
                .collect()
        };
        if !skipped.is_empty() {
            tracing::info!(count = skipped.len(), "unfinished frames skipped");
            self.emit(RunEvent::FramesSkipped { frames: skipped });
        }
    }

    fn summarize(&self, cancelled: bool, started: Instant) -> RunSummary {
        let frames = self.frames();
        let count = |status: FrameStatus| frames.iter().filter(|f| f.status() == status).count();
        RunSummary {
            total: frames.len(),
            completed: count(FrameStatus::Completed),
            failed: count(FrameStatus::Failed),
            skipped: count(FrameStatus::Skipped),
            cancelled,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn emit(&self, event: RunEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
