use std::path::Path;
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};

use super::{
    CameraBackend, CameraFacing, CaptureError, CaptureResult, StreamHandle, TrackCapabilities,
};

#[derive(Debug, Clone)]
pub(crate) struct FakeCameraConfig {
    pub(crate) deny_open: bool,
    pub(crate) dimensions: Option<(u32, u32)>,
    pub(crate) torch_supported: bool,
    pub(crate) reject_torch: bool,
    pub(crate) fail_grab: bool,
    /// Size of the frame actually written, when it should differ from the request.
    pub(crate) written_frame: Option<(u32, u32)>,
}

impl Default for FakeCameraConfig {
    fn default() -> Self {
        Self {
            deny_open: false,
            dimensions: Some((64, 48)),
            torch_supported: true,
            reject_torch: false,
            fail_grab: false,
            written_frame: None,
        }
    }
}

#[derive(Debug, Default)]
struct FakeCameraState {
    next_id: u64,
    opened: Vec<u64>,
    released: Vec<u64>,
    torch_requests: Vec<bool>,
    calls: Vec<String>,
}

/// In-process camera that writes solid-colour PNG frames.
#[derive(Debug, Default)]
pub(crate) struct FakeCameraBackend {
    config: Mutex<FakeCameraConfig>,
    state: Mutex<FakeCameraState>,
    open_gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl FakeCameraBackend {
    pub(crate) fn new(config: FakeCameraConfig) -> Self {
        Self {
            config: Mutex::new(config),
            ..Self::default()
        }
    }

    /// Blocks `open_stream` until the returned sender fires.
    pub(crate) fn gate_open(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.open_gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(rx);
        tx
    }

    pub(crate) fn update(&self, change: impl FnOnce(&mut FakeCameraConfig)) {
        change(&mut self.config.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn config(&self) -> FakeCameraConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeCameraState) -> T) -> T {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn open_streams(&self) -> usize {
        self.with_state(|state| state.opened.len() - state.released.len())
    }

    pub(crate) fn opened_count(&self) -> usize {
        self.with_state(|state| state.opened.len())
    }

    pub(crate) fn released(&self) -> Vec<u64> {
        self.with_state(|state| state.released.clone())
    }

    pub(crate) fn torch_requests(&self) -> Vec<bool> {
        self.with_state(|state| state.torch_requests.clone())
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.with_state(|state| state.calls.clone())
    }
}

impl CameraBackend for FakeCameraBackend {
    fn open_stream(&self, facing: CameraFacing) -> CaptureResult<StreamHandle> {
        let gate = self
            .open_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        let config = self.config();
        self.with_state(|state| state.calls.push(format!("open {facing:?}")));
        if config.deny_open {
            return Err(CaptureError::PermissionDenied {
                message: "simulated permission denial".to_string(),
            });
        }

        let id = self.with_state(|state| {
            state.next_id += 1;
            state.opened.push(state.next_id);
            state.next_id
        });
        Ok(StreamHandle {
            id,
            device: "fake0".to_string(),
            width: config.dimensions.map(|(width, _)| width),
            height: config.dimensions.map(|(_, height)| height),
        })
    }

    fn track_capabilities(&self, stream: &StreamHandle) -> CaptureResult<TrackCapabilities> {
        self.with_state(|state| state.calls.push(format!("capabilities {}", stream.id)));
        Ok(TrackCapabilities {
            torch: self.config().torch_supported,
        })
    }

    fn apply_torch(&self, stream: &StreamHandle, enabled: bool) -> CaptureResult<()> {
        self.with_state(|state| {
            state.calls.push(format!("torch {} {enabled}", stream.id));
            state.torch_requests.push(enabled);
        });
        if self.config().reject_torch {
            return Err(CaptureError::CommandFailed {
                command: "torch".to_string(),
                message: "simulated constraint rejection".to_string(),
            });
        }
        Ok(())
    }

    fn grab_frame(
        &self,
        stream: &StreamHandle,
        width: u32,
        height: u32,
        output: &Path,
    ) -> CaptureResult<()> {
        self.with_state(|state| {
            state
                .calls
                .push(format!("grab {} {width}x{height} {}", stream.id, output.display()))
        });
        let config = self.config();
        if config.fail_grab {
            std::fs::write(output, b"partial").map_err(|source| CaptureError::Io {
                path: output.to_path_buf(),
                source,
            })?;
            return Err(CaptureError::CommandFailed {
                command: "grab".to_string(),
                message: "simulated frame grab failure".to_string(),
            });
        }

        let (width, height) = config.written_frame.unwrap_or((width, height));
        image::RgbImage::from_pixel(width, height, image::Rgb([12, 90, 160]))
            .save_with_format(output, image::ImageFormat::Png)
            .map_err(|err| CaptureError::ImageWriteFailed {
                path: output.to_path_buf(),
                message: err.to_string(),
            })
    }

    fn release_stream(&self, stream: &StreamHandle) {
        self.with_state(|state| {
            state.calls.push(format!("release {}", stream.id));
            state.released.push(stream.id);
        });
    }
}
