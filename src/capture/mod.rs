use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use thiserror::Error;

use crate::state::{CaptureState, StateError};

mod command;
mod session;
#[cfg(test)]
pub(crate) mod testing;
mod v4l2;

pub use session::{CaptureControls, CaptureSession};
pub use v4l2::V4l2CameraBackend;

/// Which way the camera should face; catches are shot with the rear camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Environment,
    User,
}

/// An open video stream on a camera device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: u64,
    pub device: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl StreamHandle {
    /// Native frame size, if the device reported a usable one.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackCapabilities {
    pub torch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillSource {
    Camera,
    Upload,
}

/// A frozen frame or adopted upload, stored as a PNG in the temp directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillImage {
    pub capture_id: String,
    pub temp_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub source: StillSource,
    pub created_at: u64,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera permission denied: {message}")]
    PermissionDenied { message: String },
    #[error("camera unavailable: {message}")]
    DeviceUnavailable { message: String },
    #[error("camera does not support {capability}")]
    UnsupportedCapability { capability: &'static str },
    #[error("camera rejected constraint: {message}")]
    ConstraintRejected { message: String },
    #[error("cannot {operation} while capture is {state:?}")]
    NotLive {
        operation: &'static str,
        state: CaptureState,
    },
    #[error("video dimensions are unknown")]
    UnknownDimensions,
    #[error("no still image to confirm")]
    MissingStill,
    #[error("invalid frame: {message}")]
    InvalidFrame { message: String },
    #[error("failed to read captured image dimensions: {message}")]
    ImageReadFailed { message: String },
    #[error("failed to write still image {path}: {message}")]
    ImageWriteFailed { path: PathBuf, message: String },
    #[error("failed to decode uploaded image {path}: {message}")]
    UploadDecode { path: PathBuf, message: String },
    #[error("io error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("command failed: {command}")]
    CommandFailed { command: String, message: String },
    #[error("command io error: {command}")]
    CommandIo {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start camera worker")]
    Worker {
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    State(#[from] StateError),
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// Device side of a capture session.
pub trait CameraBackend: Send + Sync {
    fn open_stream(&self, facing: CameraFacing) -> CaptureResult<StreamHandle>;
    fn track_capabilities(&self, stream: &StreamHandle) -> CaptureResult<TrackCapabilities>;
    fn apply_torch(&self, stream: &StreamHandle, enabled: bool) -> CaptureResult<()>;
    /// Writes the current frame of `stream` as a `width`x`height` PNG to `output`.
    fn grab_frame(
        &self,
        stream: &StreamHandle,
        width: u32,
        height: u32,
        output: &Path,
    ) -> CaptureResult<()>;
    fn release_stream(&self, stream: &StreamHandle);
}

/// Returns a fresh capture id and its creation time in unix milliseconds.
pub(crate) fn new_capture_id() -> CaptureResult<(String, u64)> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| CaptureError::InvalidFrame {
            message: format!("system time before unix epoch: {err}"),
        })?;
    Ok((format!("still-{}", now.as_nanos()), now.as_millis() as u64))
}
