//! Terminal rendering of a storyboard run
//!
//! Passive observer: consumes `RunEvent` snapshots and never touches the
//! sequencer's records.

use crate::frame::{FrameRecord, FrameStatus};
use crate::sequencer::{RunEvent, RunSummary};
use std::io::Write;
use tokio::sync::mpsc;

const PROMPT_PREVIEW_CHARS: usize = 48;

fn status_icon(status: FrameStatus) -> &'static str {
    match status {
        FrameStatus::Pending => "⏳",
        FrameStatus::Generating => "🎨",
        FrameStatus::Completed => "✓",
        FrameStatus::Failed => "❌",
        FrameStatus::Skipped => "⏭",
    }
}

fn preview(prompt: &str) -> String {
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(PROMPT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

/// One line for one frame
pub fn render_frame(frame: &FrameRecord) -> String {
    let mut line = format!(
        "{} #{:02} [{}] {}",
        status_icon(frame.status()),
        frame.sequence_index() + 1,
        frame.status(),
        preview(frame.prompt())
    );
    if let Some(error) = frame.error_message() {
        line.push_str(&format!(" → {}", error));
    }
    line
}

/// The whole board, one frame per line, in sequence order
pub fn render_board(frames: &[FrameRecord]) -> String {
    if frames.is_empty() {
        return "(empty storyboard)".to_string();
    }
    frames
        .iter()
        .map(render_frame)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_summary(summary: &RunSummary) -> String {
    let mut line = format!(
        "🎬 {}/{} completed, {} failed, {} skipped in {:.1}s",
        summary.completed,
        summary.total,
        summary.failed,
        summary.skipped,
        summary.elapsed_ms as f64 / 1000.0
    );
    if summary.cancelled {
        line.push_str(" (cancelled)");
    }
    line
}

/// Lines to print for one event
pub fn render_event(event: &RunEvent) -> Vec<String> {
    match event {
        RunEvent::RunStarted { frames } => {
            let mut lines = vec![format!("▶ Generating {} shots", frames.len())];
            lines.extend(frames.iter().map(render_frame));
            lines
        }
        RunEvent::FrameUpdated { frame } => vec![render_frame(frame)],
        RunEvent::FramesSkipped { frames } => frames.iter().map(render_frame).collect(),
        RunEvent::RunFinished { summary } => vec![render_summary(summary)],
    }
}

/// Print events until the run finishes or the sequencer goes away
pub struct StoryboardView<W: Write> {
    out: W,
}

impl<W: Write> StoryboardView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub async fn follow(
        &mut self,
        mut events: mpsc::UnboundedReceiver<RunEvent>,
    ) -> std::io::Result<Option<RunSummary>> {
        while let Some(event) = events.recv().await {
            for line in render_event(&event) {
                writeln!(self.out, "{}", line)?;
            }
            self.out.flush()?;
            if let RunEvent::RunFinished { summary } = event {
                return Ok(Some(summary));
            }
        }
        Ok(None)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pending_frame() {
        let frame = FrameRecord::new("A red cube", 0);
        assert_eq!(render_frame(&frame), "⏳ #01 [pending] A red cube");
    }

    #[test]
    fn test_long_prompt_is_truncated() {
        let prompt = "x".repeat(100);
        let frame = FrameRecord::new(prompt, 9);
        let line = render_frame(&frame);
        assert!(line.starts_with("⏳ #10 [pending] "));
        assert!(line.ends_with('…'));
        assert_eq!(line.chars().filter(|c| *c == 'x').count(), PROMPT_PREVIEW_CHARS);
    }

    #[test]
    fn test_empty_board() {
        assert_eq!(render_board(&[]), "(empty storyboard)");
    }

    #[test]
    fn test_summary_line() {
        let summary = RunSummary {
            total: 3,
            completed: 1,
            failed: 0,
            skipped: 2,
            cancelled: true,
            elapsed_ms: 2500,
        };
        assert_eq!(
            render_summary(&summary),
            "🎬 1/3 completed, 0 failed, 2 skipped in 2.5s (cancelled)"
        );
    }

    #[tokio::test]
    async fn test_follow_stops_at_finish() {
        let (tx, rx) = mpsc::unbounded_channel();
        let frames = vec![FrameRecord::new("a", 0), FrameRecord::new("b", 1)];
        tx.send(RunEvent::RunStarted { frames }).unwrap();
        tx.send(RunEvent::RunFinished {
            summary: RunSummary::default(),
        })
        .unwrap();

        let mut view = StoryboardView::new(Vec::new());
        let summary = view.follow(rx).await.unwrap();
        assert_eq!(summary, Some(RunSummary::default()));

        let text = String::from_utf8(view.into_inner()).unwrap();
        assert!(text.starts_with("▶ Generating 2 shots\n"));
        assert_eq!(text.lines().count(), 4);
    }
}
