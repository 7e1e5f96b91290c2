//! Storyboard export: a zip of every completed frame, or one frame on its own
//!
//! Archive layout:
//!
//! ```text
//! storyboard_project_2025-01-01T12-00-00-000Z.zip
//! └── storyboard_project_2025-01-01T12-00-00-000Z/
//!     ├── shot_01_A_red_cube.png
//!     └── shot_02_A_blue_sphere.png
//! ```

use crate::frame::{FrameError, FrameRecord, FrameStatus, ImagePayload};
use chrono::{DateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Characters of the prompt kept in a file name
const PROMPT_FRAGMENT_CHARS: usize = 30;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9]").expect("valid regex");
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No completed frames to export")]
    NothingToExport,

    #[error("Frame {0} has no image (status: {1})")]
    NotCompleted(usize, FrameStatus),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Payload(#[from] FrameError),
}

/// Result of an archive export
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    /// Entry paths inside the archive, in order
    pub entries: Vec<String>,
}

/// `storyboard_project_<ISO timestamp>` with ':' and '.' made file-safe
pub fn archive_folder_name(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("storyboard_project_{}", stamp)
}

/// `shot_<NN>_<prompt fragment>.<ext>`, `position` is 1-based
pub fn shot_file_name(position: usize, prompt: &str, extension: &str) -> String {
    let fragment: String = prompt.chars().take(PROMPT_FRAGMENT_CHARS).collect();
    let clean = UNSAFE_CHARS.replace_all(&fragment, "_");
    format!("shot_{:02}_{}.{}", position, clean, extension)
}

/// Write every Completed frame into a zip under `folder/`.
///
/// Frames in any other status are left out. Shot numbers count only the
/// exported frames, in sequence order.
pub fn write_archive<W: Write + Seek>(
    frames: &[FrameRecord],
    writer: W,
    folder: &str,
) -> Result<(W, Vec<String>), ExportError> {
    let completed: Vec<(&FrameRecord, &ImagePayload)> = frames
        .iter()
        .filter_map(|f| f.image_payload().map(|p| (f, p)))
        .collect();
    if completed.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(writer);
    zip.add_directory(format!("{}/", folder), options)?;

    let mut entries = Vec::with_capacity(completed.len());
    for (position, (frame, payload)) in completed.into_iter().enumerate() {
        let name = format!(
            "{}/{}",
            folder,
            shot_file_name(position + 1, frame.prompt(), payload.file_extension())
        );
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&payload.decode()?)?;
        entries.push(name);
    }

    let writer = zip.finish()?;
    Ok((writer, entries))
}

/// Write `<dir>/<folder>.zip` for the completed frames
pub fn export_archive(
    frames: &[FrameRecord],
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<ExportSummary, ExportError> {
    std::fs::create_dir_all(dir)?;
    let folder = archive_folder_name(now);
    let path = dir.join(format!("{}.zip", folder));

    let file = BufWriter::new(File::create(&path)?);
    let (mut writer, entries) = match write_archive(frames, file, &folder) {
        Ok(done) => done,
        Err(e) => {
            // Don't leave an empty or partial archive behind
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }
    };
    writer.flush()?;

    tracing::info!(path = %path.display(), entries = entries.len(), "storyboard exported");
    Ok(ExportSummary { path, entries })
}

/// Write one completed frame as `<dir>/frame-<id>.<ext>`
pub fn export_frame(frame: &FrameRecord, dir: &Path) -> Result<PathBuf, ExportError> {
    let payload = frame
        .image_payload()
        .ok_or_else(|| ExportError::NotCompleted(frame.sequence_index(), frame.status()))?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("frame-{}.{}", frame.id(), payload.file_extension()));
    std::fs::write(&path, payload.decode()?)?;
    Ok(path)
}
