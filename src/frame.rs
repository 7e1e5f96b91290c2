//! Frame records and their status state machine
//!
//! A frame is one prompt-to-image unit of a run. Its payload and error
//! message live inside the status variant, so "payload iff Completed" and
//! "error iff Failed" hold by construction.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Frame errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid transition for frame {index}: {from} -> {to}")]
    InvalidTransition {
        index: usize,
        from: FrameStatus,
        to: FrameStatus,
    },

    #[error("Invalid image payload: {0}")]
    InvalidPayload(String),
}

/// Status of a frame, without its attached data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameStatus {
    Pending,
    Generating,
    Completed,
    Failed,
    Skipped,
}

impl FrameStatus {
    /// Completed, Failed and Skipped accept no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Encoded image as a `data:<mime>;base64,<data>` URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImagePayload {
    uri: String,
    /// Byte offset of the base64 data inside `uri`
    data_start: usize,
}

impl ImagePayload {
    /// Validate and wrap a data URI
    pub fn parse(uri: impl Into<String>) -> Result<Self, FrameError> {
        let uri = uri.into();
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| FrameError::InvalidPayload("missing data: scheme".to_string()))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| FrameError::InvalidPayload("missing ',' separator".to_string()))?;
        if !header.ends_with(";base64") {
            return Err(FrameError::InvalidPayload(
                "only base64 data URIs are supported".to_string(),
            ));
        }
        if data.is_empty() {
            return Err(FrameError::InvalidPayload("empty image data".to_string()));
        }
        // A payload that cannot be decoded here would only fail later, at export
        decode_base64(data)?;
        let data_start = uri.len() - data.len();
        Ok(Self { uri, data_start })
    }

    /// Build a payload from raw base64 data and its mime type
    pub fn from_base64(mime_type: &str, data: &str) -> Result<Self, FrameError> {
        Self::parse(format!("data:{};base64,{}", mime_type, data))
    }

    pub fn as_uri(&self) -> &str {
        &self.uri
    }

    pub fn mime_type(&self) -> &str {
        // "data:" prefix is 5 bytes, ";base64," is 8 bytes
        let header = &self.uri[5..self.data_start - 8];
        if header.is_empty() {
            "image/png"
        } else {
            header
        }
    }

    pub fn base64_data(&self) -> &str {
        &self.uri[self.data_start..]
    }

    /// Decode the image bytes
    pub fn decode(&self) -> Result<Vec<u8>, FrameError> {
        decode_base64(self.base64_data())
    }

    /// File extension matching the mime type
    pub fn file_extension(&self) -> &'static str {
        match self.mime_type() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

fn decode_base64(data: &str) -> Result<Vec<u8>, FrameError> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| FrameError::InvalidPayload(e.to_string()))
}

impl TryFrom<String> for ImagePayload {
    type Error = FrameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ImagePayload> for String {
    fn from(payload: ImagePayload) -> Self {
        payload.uri
    }
}

/// Status with its attached data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum FrameState {
    Pending,
    Generating,
    Completed { image_payload: ImagePayload },
    Failed { error_message: String },
    Skipped,
}

impl FrameState {
    pub fn status(&self) -> FrameStatus {
        match self {
            Self::Pending => FrameStatus::Pending,
            Self::Generating => FrameStatus::Generating,
            Self::Completed { .. } => FrameStatus::Completed,
            Self::Failed { .. } => FrameStatus::Failed,
            Self::Skipped => FrameStatus::Skipped,
        }
    }
}

/// One frame of a storyboard run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    id: Uuid,
    prompt: String,
    sequence_index: usize,
    #[serde(flatten)]
    state: FrameState,
}

impl FrameRecord {
    /// New record in the Pending state
    pub fn new(prompt: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            sequence_index,
            state: FrameState::Pending,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn status(&self) -> FrameStatus {
        self.state.status()
    }

    /// Present only when Completed
    pub fn image_payload(&self) -> Option<&ImagePayload> {
        match &self.state {
            FrameState::Completed { image_payload } => Some(image_payload),
            _ => None,
        }
    }

    /// Present only when Failed
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            FrameState::Failed { error_message } => Some(error_message),
            _ => None,
        }
    }

    /// Pending -> Generating
    pub(crate) fn begin(&mut self) -> Result<(), FrameError> {
        self.transition(FrameStatus::Generating, |s| {
            matches!(s, FrameState::Pending).then_some(FrameState::Generating)
        })
    }

    /// Generating -> Completed
    pub(crate) fn complete(&mut self, image_payload: ImagePayload) -> Result<(), FrameError> {
        self.transition(FrameStatus::Completed, move |s| {
            matches!(s, FrameState::Generating).then_some(FrameState::Completed { image_payload })
        })
    }

    /// Generating -> Failed
    pub(crate) fn fail(&mut self, error_message: impl Into<String>) -> Result<(), FrameError> {
        let error_message = error_message.into();
        self.transition(FrameStatus::Failed, move |s| {
            matches!(s, FrameState::Generating).then_some(FrameState::Failed { error_message })
        })
    }

    /// Pending | Generating -> Skipped
    pub(crate) fn skip(&mut self) -> Result<(), FrameError> {
        self.transition(FrameStatus::Skipped, |s| {
            matches!(s, FrameState::Pending | FrameState::Generating)
                .then_some(FrameState::Skipped)
        })
    }

    fn transition<F>(&mut self, to: FrameStatus, next: F) -> Result<(), FrameError>
    where
        F: FnOnce(&FrameState) -> Option<FrameState>,
    {
        match next(&self.state) {
            Some(state) => {
                tracing::debug!(
                    frame = self.sequence_index,
                    from = %self.status(),
                    to = %to,
                    "frame transition"
                );
                self.state = state;
                Ok(())
            }
            None => Err(FrameError::InvalidTransition {
                index: self.sequence_index,
                from: self.status(),
                to,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ImagePayload {
        // "hello" in base64
        ImagePayload::parse("data:image/png;base64,aGVsbG8=").unwrap()
    }

    #[test]
    fn test_new_record_is_pending() {
        let frame = FrameRecord::new("A red cube", 0);
        assert_eq!(frame.status(), FrameStatus::Pending);
        assert!(frame.image_payload().is_none());
        assert!(frame.error_message().is_none());
    }

    #[test]
    fn test_happy_path() {
        let mut frame = FrameRecord::new("A red cube", 0);
        frame.begin().unwrap();
        frame.complete(payload()).unwrap();
        assert_eq!(frame.status(), FrameStatus::Completed);
        assert_eq!(frame.image_payload(), Some(&payload()));
        assert!(frame.error_message().is_none());
    }

    #[test]
    fn test_failure_keeps_message() {
        let mut frame = FrameRecord::new("A red cube", 3);
        frame.begin().unwrap();
        frame.fail("quota exceeded").unwrap();
        assert_eq!(frame.error_message(), Some("quota exceeded"));
        assert!(frame.image_payload().is_none());
    }

    #[test]
    fn test_no_regression_from_terminal() {
        let mut frame = FrameRecord::new("A red cube", 1);
        frame.skip().unwrap();
        assert!(frame.begin().is_err());
        assert!(frame.skip().is_err());

        let mut frame = FrameRecord::new("A red cube", 2);
        frame.begin().unwrap();
        frame.complete(payload()).unwrap();
        let err = frame.fail("late").unwrap_err();
        assert_eq!(
            err,
            FrameError::InvalidTransition {
                index: 2,
                from: FrameStatus::Completed,
                to: FrameStatus::Failed,
            }
        );
        assert_eq!(frame.status(), FrameStatus::Completed);
    }

    #[test]
    fn test_complete_requires_generating() {
        let mut frame = FrameRecord::new("A red cube", 0);
        assert!(frame.complete(payload()).is_err());
        assert_eq!(frame.status(), FrameStatus::Pending);
    }

    #[test]
    fn test_payload_accessors() {
        let p = payload();
        assert_eq!(p.mime_type(), "image/png");
        assert_eq!(p.base64_data(), "aGVsbG8=");
        assert_eq!(p.decode().unwrap(), b"hello");
        assert_eq!(p.file_extension(), "png");

        let jpeg = ImagePayload::from_base64("image/jpeg", "aGVsbG8=").unwrap();
        assert_eq!(jpeg.file_extension(), "jpg");
    }

    #[test]
    fn test_payload_rejects_garbage() {
        assert!(ImagePayload::parse("https://example.com/a.png").is_err());
        assert!(ImagePayload::parse("data:image/png,raw").is_err());
        assert!(ImagePayload::parse("data:image/png;base64,").is_err());
        assert!(matches!(
            ImagePayload::parse("data:image/png;base64,@@@not-base64@@@"),
            Err(FrameError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_undecodable_payload_rejected_on_deserialize() {
        let json = format!(
            r#"{{"id":"{}","prompt":"p","sequenceIndex":0,"status":"COMPLETED","imagePayload":"data:image/png;base64,%%%"}}"#,
            Uuid::new_v4()
        );
        assert!(serde_json::from_str::<FrameRecord>(&json).is_err());
    }

    #[test]
    fn test_record_json_shape() {
        let mut frame = FrameRecord::new("A red cube", 0);
        frame.begin().unwrap();
        frame.complete(payload()).unwrap();

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["sequenceIndex"], 0);
        assert_eq!(json["imagePayload"], "data:image/png;base64,aGVsbG8=");
        assert!(json.get("errorMessage").is_none());
    }
}
