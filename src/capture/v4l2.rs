use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use super::command::{run_command_output, run_command_status};
use super::{
    CameraBackend, CameraFacing, CaptureError, CaptureResult, StreamHandle, TrackCapabilities,
};

const V4L2_CTL_COMMAND: &str = "v4l2-ctl";
const FFMPEG_COMMAND: &str = "ffmpeg";
const TORCH_CONTROL: &str = "flash_led_mode";
const FLASH_LED_MODE_NONE: u32 = 0;
const FLASH_LED_MODE_TORCH: u32 = 2;

/// Camera backend for Video4Linux devices, driven through `v4l2-ctl` and `ffmpeg`.
#[derive(Debug)]
pub struct V4l2CameraBackend {
    device: PathBuf,
    next_stream_id: AtomicU64,
    // stream id -> torch currently applied
    active: Mutex<HashMap<u64, bool>>,
}

impl V4l2CameraBackend {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            next_stream_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn active_streams(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn device_arg(&self) -> String {
        self.device.to_string_lossy().into_owned()
    }

    fn check_device_access(&self) -> CaptureResult<()> {
        match OpenOptions::new().read(true).open(&self.device) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                Err(CaptureError::PermissionDenied {
                    message: format!("cannot open {}: {err}", self.device.display()),
                })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(CaptureError::DeviceUnavailable {
                    message: format!("no camera device at {}", self.device.display()),
                })
            }
            Err(err) => Err(CaptureError::DeviceUnavailable {
                message: format!("cannot open {}: {err}", self.device.display()),
            }),
        }
    }

    fn set_torch_mode(&self, mode: u32) -> CaptureResult<()> {
        let device = self.device_arg();
        let control = format!("--set-ctrl={TORCH_CONTROL}={mode}");
        run_command_status(V4L2_CTL_COMMAND, &["--device", device.as_str(), control.as_str()])
    }
}

impl CameraBackend for V4l2CameraBackend {
    fn open_stream(&self, facing: CameraFacing) -> CaptureResult<StreamHandle> {
        if facing != CameraFacing::Environment {
            tracing::debug!(
                ?facing,
                device = %self.device.display(),
                "v4l2 devices do not report facing; using configured device"
            );
        }
        self.check_device_access()?;

        let device = self.device_arg();
        let format = run_command_output(
            V4L2_CTL_COMMAND,
            &["--device", device.as_str(), "--get-fmt-video"],
        )?;
        let dimensions = parse_video_format(&format);
        if dimensions.is_none() {
            tracing::warn!(device = %device, "camera did not report frame dimensions");
        }

        let id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, false);

        tracing::info!(stream_id = id, device = %device, ?dimensions, "opened camera stream");
        Ok(StreamHandle {
            id,
            device,
            width: dimensions.map(|(width, _)| width),
            height: dimensions.map(|(_, height)| height),
        })
    }

    fn track_capabilities(&self, stream: &StreamHandle) -> CaptureResult<TrackCapabilities> {
        let controls = run_command_output(
            V4L2_CTL_COMMAND,
            &["--device", stream.device.as_str(), "--list-ctrls"],
        )?;
        Ok(TrackCapabilities {
            torch: parse_torch_support(&controls),
        })
    }

    fn apply_torch(&self, stream: &StreamHandle, enabled: bool) -> CaptureResult<()> {
        let mode = if enabled {
            FLASH_LED_MODE_TORCH
        } else {
            FLASH_LED_MODE_NONE
        };
        self.set_torch_mode(mode)?;
        if let Some(torch) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&stream.id)
        {
            *torch = enabled;
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
        let video_size = format!("{width}x{height}");
        let output = output.to_string_lossy().into_owned();
        run_command_status(
            FFMPEG_COMMAND,
            &[
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-f",
                "video4linux2",
                "-video_size",
                video_size.as_str(),
                "-i",
                stream.device.as_str(),
                "-frames:v",
                "1",
                output.as_str(),
            ],
        )
    }

    fn release_stream(&self, stream: &StreamHandle) {
        let torch_on = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&stream.id);

        if torch_on == Some(true) {
            if let Err(err) = self.set_torch_mode(FLASH_LED_MODE_NONE) {
                tracing::warn!(
                    stream_id = stream.id,
                    ?err,
                    "failed to switch torch off on release"
                );
            }
        }
        tracing::info!(stream_id = stream.id, "released camera stream");
    }
}

/// Reads `Width/Height : 1280/720` from `v4l2-ctl --get-fmt-video` output.
fn parse_video_format(output: &str) -> Option<(u32, u32)> {
    output.lines().find_map(|line| {
        let (label, value) = line.split_once(':')?;
        if label.trim() != "Width/Height" {
            return None;
        }
        let (width, height) = value.trim().split_once('/')?;
        let width = width.trim().parse::<u32>().ok().filter(|v| *v > 0)?;
        let height = height.trim().parse::<u32>().ok().filter(|v| *v > 0)?;
        Some((width, height))
    })
}

/// True when `v4l2-ctl --list-ctrls` lists a flash control with a torch mode.
fn parse_torch_support(output: &str) -> bool {
    output.lines().any(|line| {
        if line.split_whitespace().next() != Some(TORCH_CONTROL) {
            return false;
        }
        line.split_whitespace()
            .find_map(|token| token.strip_prefix("max="))
            .and_then(|max| max.parse::<u32>().ok())
            .is_some_and(|max| max >= FLASH_LED_MODE_TORCH)
    })
}
