// Crate error type. Every variant states *where* things went wrong.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Upload was not JPEG/PNG; rejected by the host before the core sees it.
    #[error("invalid file format: {0} (please upload a JPG or PNG file)")]
    InvalidInputFormat(String),

    #[error("no source image loaded")]
    MissingSourceImage,

    #[error("mask is empty: paint the area to animate first")]
    EmptyMask,

    #[error("a generation request is already in flight")]
    Busy,

    /// Remote call rejected, timed out or returned a non-success status.
    #[error("generation request failed{}: {message}", status_suffix(.status))]
    RequestFailure { status: Option<u16>, message: String },

    /// Success status but the payload had no usable media URL.
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("image decode error: {0}")]
    ImageDecode(String),

    #[error("image encode error: {0}")]
    ImageEncode(String),

    #[error("window init error: {0}")]
    WindowInit(String),

    #[error("window update error: {0}")]
    WindowUpdate(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    pub fn request(message: impl Into<String>) -> Self {
        Self::RequestFailure { status: None, message: message.into() }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailure { status: Some(status), message: message.into() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// RequestFailure and MalformedResponse are surfaced identically.
    pub fn is_request_failure(&self) -> bool {
        matches!(self, Self::RequestFailure { .. } | Self::MalformedResponse(_))
    }
}
