//! Session log
//!
//! Append-only file under the data dir (`storyboard/storyboard.log`). Holds
//! the `log_*!` lines of the binary plus a transcript of every run, fed from
//! the sequencer's event stream, so a session can be read back after the
//! terminal output is gone.

use crate::frame::{FrameRecord, FrameStatus};
use crate::sequencer::RunEvent;
use chrono::Local;
use lazy_static::lazy_static;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;

lazy_static! {
    static ref SESSION: Mutex<Option<SessionLog>> = Mutex::new(None);
}

struct SessionLog {
    path: PathBuf,
    file: File,
}

/// Open the session log at its default location
pub fn init_logger() -> anyhow::Result<PathBuf> {
    let path = default_log_path();
    init_logger_at(&path)?;
    Ok(path)
}

/// Open (or switch to) the session log at `path`
pub fn init_logger_at(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "\n=== Storyboard session started at {} ===\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    *SESSION.lock().unwrap_or_else(|p| p.into_inner()) = Some(SessionLog {
        path: path.to_path_buf(),
        file,
    });
    Ok(())
}

pub fn default_log_path() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => data_dir.join("storyboard").join("storyboard.log"),
        None => PathBuf::from("storyboard.log"),
    }
}

/// Path of the open session log, if any
pub fn log_path() -> Option<PathBuf> {
    SESSION
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .as_ref()
        .map(|s| s.path.clone())
}

/// Append one line. A no-op until the log is opened.
pub fn log(level: &str, message: &str) {
    let mut session = SESSION.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(session) = session.as_mut() {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let _ = writeln!(session.file, "[{}] {}: {}", timestamp, level, message);
        let _ = session.file.flush();
    }
}

fn frame_line(frame: &FrameRecord) -> String {
    let head = format!("frame {:02} {}", frame.sequence_index() + 1, frame.status());
    match frame.status() {
        FrameStatus::Generating => format!("{}: {}", head, frame.prompt()),
        FrameStatus::Completed => match frame.image_payload() {
            Some(payload) => format!("{} ({})", head, payload.mime_type()),
            None => head,
        },
        FrameStatus::Failed => format!("{}: {}", head, frame.error_message().unwrap_or("")),
        _ => head,
    }
}

/// Transcript lines for one run event
pub fn event_lines(event: &RunEvent) -> Vec<String> {
    match event {
        RunEvent::RunStarted { frames } => vec![format!("run started with {} frames", frames.len())],
        RunEvent::FrameUpdated { frame } => vec![frame_line(frame)],
        RunEvent::FramesSkipped { frames } => frames.iter().map(frame_line).collect(),
        RunEvent::RunFinished { summary } => vec![format!(
            "run finished: {}/{} completed, {} failed, {} skipped, cancelled={}, {} ms",
            summary.completed,
            summary.total,
            summary.failed,
            summary.skipped,
            summary.cancelled,
            summary.elapsed_ms
        )],
    }
}

/// Write the transcript of one run; returns after `RunFinished` or when the
/// sequencer goes away
pub async fn record_run(mut events: mpsc::UnboundedReceiver<RunEvent>) {
    while let Some(event) = events.recv().await {
        let level = match &event {
            RunEvent::FrameUpdated { frame } if frame.status() == FrameStatus::Failed => "WARN",
            _ => "RUN",
        };
        for line in event_lines(&event) {
            log(level, &line);
        }
        if matches!(event, RunEvent::RunFinished { .. }) {
            break;
        }
    }
}

/// Macros for easier logging
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::log("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log("ERROR", &format!($($arg)*));
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::RunSummary;

    #[test]
    fn test_failed_frame_line_carries_error() {
        let mut frame = FrameRecord::new("A red cube", 2);
        frame.begin().unwrap();
        frame.fail("quota exhausted").unwrap();

        let lines = event_lines(&RunEvent::FrameUpdated { frame });
        assert_eq!(lines, vec!["frame 03 failed: quota exhausted"]);
    }

    #[test]
    fn test_skipped_frames_one_line_each() {
        let mut frames = vec![FrameRecord::new("a", 0), FrameRecord::new("b", 1)];
        for frame in frames.iter_mut() {
            frame.skip().unwrap();
        }
        let lines = event_lines(&RunEvent::FramesSkipped { frames });
        assert_eq!(lines, vec!["frame 01 skipped", "frame 02 skipped"]);
    }

    #[tokio::test]
    async fn test_run_transcript_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.log");
        init_logger_at(&path).unwrap();
        assert_eq!(log_path(), Some(path.clone()));

        let mut frame = FrameRecord::new("A blue sphere", 0);
        frame.begin().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(RunEvent::RunStarted {
            frames: vec![FrameRecord::new("A blue sphere", 0)],
        })
        .unwrap();
        tx.send(RunEvent::FrameUpdated { frame }).unwrap();
        tx.send(RunEvent::RunFinished {
            summary: RunSummary {
                total: 1,
                ..Default::default()
            },
        })
        .unwrap();
        record_run(rx).await;
        crate::log_info!("after {} run", 1);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("=== Storyboard session started at "));
        assert!(text.contains("RUN: run started with 1 frames"));
        assert!(text.contains("RUN: frame 01 generating: A blue sphere"));
        assert!(text.contains("RUN: run finished: 0/1 completed"));
        assert!(text.contains("INFO: after 1 run"));
    }
}
