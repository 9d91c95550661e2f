use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use image::ImageFormat;

use super::{
    new_capture_id, CameraBackend, CameraFacing, CaptureError, CaptureResult, StillImage,
    StillSource, StreamHandle,
};
use crate::notification::Notifier;
use crate::state::{CaptureEvent, CaptureState, StateError, StateMachine, StateTransition};
use crate::storage::TEMP_CAPTURE_PREFIX;
use crate::worker::{spawn_worker_task, WorkerTask};

const CAMERA_UNAVAILABLE_MESSAGE: &str =
    "Unable to access camera. Please allow permission or try another device.";
const TORCH_UNSUPPORTED_MESSAGE: &str = "Torch not supported on this device.";
const TORCH_FAILED_MESSAGE: &str = "Unable to toggle flash. Try another device.";
const CAPTURE_FAILED_MESSAGE: &str = "Unable to capture a photo. Please try again.";
const UPLOAD_FAILED_MESSAGE: &str = "Unable to read the selected image.";
const CAMERA_WORKER_NAME: &str = "fishtrack-camera";

type PendingStream = WorkerTask<CaptureResult<StreamHandle>>;

/// Which capture screen triggers are currently enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureControls {
    pub capture: bool,
    pub torch: bool,
    pub upload: bool,
    pub retake: bool,
    pub analyze: bool,
    pub starting: bool,
}

/// Live preview, torch control and still capture for one visit to the camera screen.
///
/// The session owns at most one stream and at most one pending acquisition.
/// Dropping it releases both.
pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    notifier: Rc<dyn Notifier>,
    temp_dir: PathBuf,
    facing: CameraFacing,
    machine: StateMachine,
    stream: Option<StreamHandle>,
    torch_on: bool,
    still: Option<StillImage>,
    pending: Option<PendingStream>,
}

impl CaptureSession {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        notifier: Rc<dyn Notifier>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            notifier,
            temp_dir: temp_dir.into(),
            facing: CameraFacing::Environment,
            machine: StateMachine::new(),
            stream: None,
            torch_on: false,
            still: None,
            pending: None,
        }
    }

    pub fn with_facing(mut self, facing: CameraFacing) -> Self {
        self.facing = facing;
        self
    }

    pub fn state(&self) -> CaptureState {
        self.machine.state()
    }

    pub fn history(&self) -> &[StateTransition] {
        self.machine.history()
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on
    }

    pub fn stream(&self) -> Option<&StreamHandle> {
        self.stream.as_ref()
    }

    pub fn still(&self) -> Option<&StillImage> {
        self.still.as_ref()
    }

    pub fn is_starting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn controls(&self) -> CaptureControls {
        let state = self.machine.state();
        let starting = self.pending.is_some();
        let live = state.is_live() && !starting && self.stream.is_some();
        CaptureControls {
            capture: live && self.stream.as_ref().and_then(StreamHandle::dimensions).is_some(),
            torch: live,
            upload: self.machine.can_transition(CaptureEvent::AdoptUpload),
            retake: state.is_reviewing(),
            analyze: state.is_reviewing() && self.still.is_some(),
            starting,
        }
    }

    /// Starts acquiring a stream on a worker thread.
    ///
    /// A second call while an acquisition is in flight reuses it. A call while
    /// live replaces the current stream.
    pub fn begin_start(&mut self) -> CaptureResult<()> {
        if self.pending.is_some() {
            tracing::debug!("stream acquisition already in flight");
            return Ok(());
        }

        self.machine.transition(CaptureEvent::Start)?;
        self.release_stream("restart");

        let backend = Arc::clone(&self.backend);
        let cleanup_backend = Arc::clone(&self.backend);
        let facing = self.facing;
        let task = spawn_worker_task(
            CAMERA_WORKER_NAME,
            move || backend.open_stream(facing),
            move |result: CaptureResult<StreamHandle>| {
                if let Ok(stream) = result {
                    tracing::info!(
                        stream_id = stream.id,
                        "releasing stream delivered after cancellation"
                    );
                    cleanup_backend.release_stream(&stream);
                }
            },
        );

        match task {
            Ok(task) => {
                tracing::info!(facing = ?self.facing, "requested camera stream");
                self.pending = Some(task);
                Ok(())
            }
            Err(source) => self.fail_start(CaptureError::Worker { source }),
        }
    }

    /// Completes a pending acquisition if the device has answered.
    pub fn poll_start(&mut self) -> Option<CaptureResult<()>> {
        let result = self.pending.as_ref()?.poll()?;
        self.pending = None;
        Some(self.finish_start(result))
    }

    /// Requests a stream and waits for the device to answer.
    pub fn start_session(&mut self) -> CaptureResult<()> {
        self.begin_start()?;
        let Some(task) = self.pending.take() else {
            return Ok(());
        };
        let result = task.wait().unwrap_or_else(|| {
            Err(CaptureError::DeviceUnavailable {
                message: "stream acquisition was cancelled".to_string(),
            })
        });
        self.finish_start(result)
    }

    fn finish_start(&mut self, result: CaptureResult<StreamHandle>) -> CaptureResult<()> {
        match result {
            Ok(stream) => {
                if let Err(err) = self.machine.transition(CaptureEvent::StreamReady) {
                    self.backend.release_stream(&stream);
                    return Err(err.into());
                }
                tracing::info!(
                    stream_id = stream.id,
                    dimensions = ?stream.dimensions(),
                    "camera stream live"
                );
                self.stream = Some(stream);
                self.torch_on = false;
                Ok(())
            }
            Err(err) => self.fail_start(err),
        }
    }

    fn fail_start(&mut self, err: CaptureError) -> CaptureResult<()> {
        tracing::warn!(?err, "camera stream unavailable");
        if let Err(state_err) = self.machine.transition(CaptureEvent::StreamFailed) {
            tracing::debug!(?state_err, "stream failure arrived outside starting state");
        }
        self.notifier.error(CAMERA_UNAVAILABLE_MESSAGE);
        Err(err)
    }

    fn live_stream(&self, operation: &'static str) -> CaptureResult<&StreamHandle> {
        let not_live = || CaptureError::NotLive {
            operation,
            state: self.machine.state(),
        };
        if self.pending.is_some() || !self.machine.state().is_live() {
            return Err(not_live());
        }
        self.stream.as_ref().ok_or_else(not_live)
    }

    /// Flips the torch; the flag changes only once the device accepts.
    pub fn toggle_torch(&mut self) -> CaptureResult<bool> {
        let stream = self.live_stream("toggle torch")?.clone();

        let capabilities = match self.backend.track_capabilities(&stream) {
            Ok(capabilities) => capabilities,
            Err(err) => {
                tracing::warn!(
                    stream_id = stream.id,
                    ?err,
                    "failed to query track capabilities"
                );
                self.notifier.error(TORCH_FAILED_MESSAGE);
                return Err(err);
            }
        };
        if !capabilities.torch {
            tracing::info!(stream_id = stream.id, "torch not supported by camera track");
            self.notifier.error(TORCH_UNSUPPORTED_MESSAGE);
            return Err(CaptureError::UnsupportedCapability {
                capability: "torch",
            });
        }

        let requested = !self.torch_on;
        if let Err(err) = self.backend.apply_torch(&stream, requested) {
            tracing::warn!(
                stream_id = stream.id,
                requested,
                ?err,
                "torch constraint rejected"
            );
            self.notifier.error(TORCH_FAILED_MESSAGE);
            return Err(CaptureError::ConstraintRejected {
                message: err.to_string(),
            });
        }

        self.torch_on = requested;
        tracing::info!(stream_id = stream.id, torch_on = requested, "torch toggled");
        Ok(requested)
    }

    /// Freezes the current frame at native resolution and ends the live stream.
    pub fn capture_still(&mut self) -> CaptureResult<StillImage> {
        let stream = self.live_stream("capture still")?.clone();
        let (width, height) = stream
            .dimensions()
            .ok_or(CaptureError::UnknownDimensions)?;

        let (capture_id, created_at) = new_capture_id()?;
        let temp_path = self.prepare_temp_path(&capture_id)?;

        if let Err(err) = self.backend.grab_frame(&stream, width, height, &temp_path) {
            cleanup_temp_still(&temp_path, "frame grab failure");
            self.notifier.error(CAPTURE_FAILED_MESSAGE);
            return Err(err);
        }

        let written = match image::image_dimensions(&temp_path) {
            Ok(size) => size,
            Err(err) => {
                cleanup_temp_still(&temp_path, "frame dimension read failure");
                self.notifier.error(CAPTURE_FAILED_MESSAGE);
                return Err(CaptureError::ImageReadFailed {
                    message: err.to_string(),
                });
            }
        };
        if written != (width, height) {
            cleanup_temp_still(&temp_path, "frame size mismatch");
            self.notifier.error(CAPTURE_FAILED_MESSAGE);
            return Err(CaptureError::InvalidFrame {
                message: format!(
                    "expected {width}x{height}, camera wrote {}x{}",
                    written.0, written.1
                ),
            });
        }

        self.machine.transition(CaptureEvent::CaptureStill)?;
        self.release_stream("still captured");

        let still = StillImage {
            capture_id,
            temp_path,
            width,
            height,
            source: StillSource::Camera,
            created_at,
        };
        tracing::info!(
            capture_id = %still.capture_id,
            width,
            height,
            "captured still from camera"
        );
        self.still = Some(still.clone());
        Ok(still)
    }

    /// Decodes an image file into a still, replacing live preview.
    pub fn adopt_uploaded_image(&mut self, path: &Path) -> CaptureResult<StillImage> {
        if !self.machine.can_transition(CaptureEvent::AdoptUpload) {
            return Err(StateError::InvalidStateTransition {
                from: self.machine.state(),
                event: CaptureEvent::AdoptUpload,
            }
            .into());
        }

        let decoded = std::fs::read(path)
            .map_err(|source| CaptureError::Io {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|bytes| {
                image::load_from_memory(&bytes).map_err(|err| CaptureError::UploadDecode {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                })
            });
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(path = %path.display(), ?err, "rejected uploaded image");
                self.notifier.error(UPLOAD_FAILED_MESSAGE);
                return Err(err);
            }
        };

        let (capture_id, created_at) = new_capture_id()?;
        let temp_path = self.prepare_temp_path(&capture_id)?;
        if let Err(err) = decoded.save_with_format(&temp_path, ImageFormat::Png) {
            cleanup_temp_still(&temp_path, "upload encode failure");
            self.notifier.error(UPLOAD_FAILED_MESSAGE);
            return Err(CaptureError::ImageWriteFailed {
                path: temp_path,
                message: err.to_string(),
            });
        }

        if let Some(task) = self.pending.take() {
            tracing::info!("cancelling pending stream acquisition for upload");
            task.cancel();
        }
        self.machine.transition(CaptureEvent::AdoptUpload)?;
        self.release_stream("upload adopted");

        let still = StillImage {
            capture_id,
            temp_path,
            width: decoded.width(),
            height: decoded.height(),
            source: StillSource::Upload,
            created_at,
        };
        tracing::info!(
            capture_id = %still.capture_id,
            path = %path.display(),
            width = still.width,
            height = still.height,
            "adopted uploaded image"
        );
        self.still = Some(still.clone());
        Ok(still)
    }

    /// Discards the reviewed still and goes back to live preview.
    pub fn retake(&mut self) -> CaptureResult<()> {
        self.machine.transition(CaptureEvent::Retake)?;
        self.discard_still();
        self.start_session()
    }

    /// Hands the reviewed still to the caller and closes the session.
    pub fn confirm(&mut self) -> CaptureResult<StillImage> {
        if self.still.is_none() {
            return Err(CaptureError::MissingStill);
        }
        self.machine.transition(CaptureEvent::Confirm)?;
        self.still.take().ok_or(CaptureError::MissingStill)
    }

    /// Releases the stream and any pending acquisition. Safe to call repeatedly.
    pub fn end_session(&mut self) {
        if let Some(task) = self.pending.take() {
            task.cancel();
        }
        self.release_stream("session ended");
        self.discard_still();
        if !self.machine.state().is_closed() {
            let _ = self.machine.transition(CaptureEvent::End);
            tracing::debug!("capture session closed");
        }
    }

    fn release_stream(&mut self, reason: &'static str) {
        if let Some(stream) = self.stream.take() {
            tracing::debug!(stream_id = stream.id, reason, "stopping camera stream");
            self.backend.release_stream(&stream);
        }
        self.torch_on = false;
    }

    fn discard_still(&mut self) {
        if let Some(still) = self.still.take() {
            cleanup_temp_still(&still.temp_path, "still discarded");
        }
    }

    fn prepare_temp_path(&self, capture_id: &str) -> CaptureResult<PathBuf> {
        std::fs::create_dir_all(&self.temp_dir).map_err(|source| CaptureError::Io {
            path: self.temp_dir.clone(),
            source,
        })?;
        let mut path = self.temp_dir.clone();
        path.push(format!("{TEMP_CAPTURE_PREFIX}{capture_id}.png"));
        Ok(path)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.end_session();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.machine.state())
            .field("stream", &self.stream)
            .field("torch_on", &self.torch_on)
            .field("still", &self.still)
            .field("starting", &self.pending.is_some())
            .finish()
    }
}

/// Best-effort removal of a temporary still; failures are only logged.
fn cleanup_temp_still(temp_path: &Path, stage: &str) {
    match std::fs::remove_file(temp_path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                stage,
                path = %temp_path.display(),
                "temporary still was already missing during cleanup"
            );
        }
        Err(err) => {
            tracing::warn!(
                stage,
                path = %temp_path.display(),
                ?err,
                "failed to remove temporary still"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::{FakeCameraBackend, FakeCameraConfig};
    use crate::notification::{NotificationKind, RecordingNotifier};

    struct Fixture {
        backend: Arc<FakeCameraBackend>,
        notifier: Rc<RecordingNotifier>,
        temp: tempfile::TempDir,
    }

    impl Fixture {
        fn new(config: FakeCameraConfig) -> Self {
            Self {
                backend: Arc::new(FakeCameraBackend::new(config)),
                notifier: Rc::new(RecordingNotifier::new()),
                temp: tempfile::tempdir().expect("temp dir"),
            }
        }

        fn working() -> Self {
            Self::new(FakeCameraConfig::default())
        }

        fn session(&self) -> CaptureSession {
            let backend: Arc<dyn CameraBackend> = self.backend.clone();
            let notifier: Rc<dyn Notifier> = self.notifier.clone();
            CaptureSession::new(backend, notifier, self.temp.path().join("stills"))
        }

        fn write_upload(&self, name: &str) -> PathBuf {
            let path = self.temp.path().join(name);
            image::RgbImage::from_pixel(30, 20, image::Rgb([200, 180, 40]))
                .save_with_format(&path, ImageFormat::Jpeg)
                .expect("write upload fixture");
            path
        }
    }

    #[test]
    fn start_session_goes_live_with_environment_facing() {
        let fixture = Fixture::working();
        let mut session = fixture.session();

        session.start_session().expect("stream should open");

        assert_eq!(session.state(), CaptureState::Live);
        assert!(session.stream().is_some());
        assert_eq!(fixture.backend.calls()[0], "open Environment");
        assert!(session.controls().capture);
        assert!(session.controls().torch);
    }

    #[test]
    fn denied_stream_falls_back_to_unavailable_and_keeps_upload() {
        let fixture = Fixture::new(FakeCameraConfig {
            deny_open: true,
            ..FakeCameraConfig::default()
        });
        let mut session = fixture.session();

        let err = session.start_session().expect_err("denied stream should fail");
        assert!(matches!(err, CaptureError::PermissionDenied { .. }));
        assert_eq!(session.state(), CaptureState::Unavailable);
        assert!(session.stream().is_none());
        assert_eq!(
            fixture.notifier.last(),
            Some((
                NotificationKind::Error,
                CAMERA_UNAVAILABLE_MESSAGE.to_string()
            ))
        );

        let controls = session.controls();
        assert!(!controls.capture);
        assert!(!controls.torch);
        assert!(controls.upload);

        let upload = fixture.write_upload("catch.jpg");
        let still = session
            .adopt_uploaded_image(&upload)
            .expect("upload should still work");
        assert_eq!(still.source, StillSource::Upload);
        assert_eq!(session.state(), CaptureState::Reviewing);
    }

    #[test]
    fn capture_and_torch_outside_live_are_rejected_without_state_change() {
        let fixture = Fixture::working();
        let mut session = fixture.session();

        assert!(matches!(
            session.capture_still(),
            Err(CaptureError::NotLive {
                state: CaptureState::Idle,
                ..
            })
        ));
        assert!(matches!(
            session.toggle_torch(),
            Err(CaptureError::NotLive { .. })
        ));
        assert_eq!(session.state(), CaptureState::Idle);
        assert!(!session.torch_on());
        assert!(fixture.backend.calls().is_empty());
        assert!(fixture.notifier.sent().is_empty());
    }

    #[test]
    fn torch_flag_flips_only_after_device_accepts() {
        let fixture = Fixture::working();
        let mut session = fixture.session();
        session.start_session().unwrap();

        assert!(session.toggle_torch().unwrap());
        assert!(session.torch_on());
        assert!(!session.toggle_torch().unwrap());
        assert!(!session.torch_on());
        assert_eq!(fixture.backend.torch_requests(), vec![true, false]);

        session.toggle_torch().unwrap();
        fixture.backend.update(|config| config.reject_torch = true);
        let err = session
            .toggle_torch()
            .expect_err("rejected constraint should fail");
        assert!(matches!(err, CaptureError::ConstraintRejected { .. }));
        assert!(session.torch_on());
        assert_eq!(
            fixture.notifier.last(),
            Some((NotificationKind::Error, TORCH_FAILED_MESSAGE.to_string()))
        );
    }

    #[test]
    fn unsupported_torch_leaves_state_unchanged() {
        let fixture = Fixture::new(FakeCameraConfig {
            torch_supported: false,
            ..FakeCameraConfig::default()
        });
        let mut session = fixture.session();
        session.start_session().unwrap();

        let err = session
            .toggle_torch()
            .expect_err("torch should be unsupported");
        assert!(matches!(
            err,
            CaptureError::UnsupportedCapability { capability: "torch" }
        ));
        assert!(!session.torch_on());
        assert_eq!(session.state(), CaptureState::Live);
        assert!(fixture.backend.torch_requests().is_empty());
        assert_eq!(
            fixture.notifier.last(),
            Some((
                NotificationKind::Error,
                TORCH_UNSUPPORTED_MESSAGE.to_string()
            ))
        );
    }

    #[test]
    fn capture_still_writes_native_resolution_and_stops_stream() {
        let fixture = Fixture::working();
        let mut session = fixture.session();
        session.start_session().unwrap();
        session.toggle_torch().unwrap();

        let still = session.capture_still().expect("capture should succeed");

        assert_eq!((still.width, still.height), (64, 48));
        assert_eq!(still.source, StillSource::Camera);
        assert_eq!(
            image::image_dimensions(&still.temp_path).unwrap(),
            (64, 48)
        );
        assert_eq!(session.state(), CaptureState::Reviewing);
        assert!(session.stream().is_none());
        assert!(!session.torch_on());
        assert_eq!(fixture.backend.open_streams(), 0);

        assert!(matches!(
            session.capture_still(),
            Err(CaptureError::NotLive {
                state: CaptureState::Reviewing,
                ..
            })
        ));
        let controls = session.controls();
        assert!(!controls.capture);
        assert!(controls.retake);
        assert!(controls.analyze);
    }

    #[test]
    fn capture_failure_removes_partial_file_and_stays_live() {
        let fixture = Fixture::new(FakeCameraConfig {
            fail_grab: true,
            ..FakeCameraConfig::default()
        });
        let mut session = fixture.session();
        session.start_session().unwrap();

        let err = session.capture_still().expect_err("grab should fail");
        assert!(matches!(err, CaptureError::CommandFailed { .. }));
        assert_eq!(session.state(), CaptureState::Live);
        assert!(session.stream().is_some());

        let leftovers = std::fs::read_dir(fixture.temp.path().join("stills"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn mismatched_frame_size_is_rejected() {
        let fixture = Fixture::new(FakeCameraConfig {
            written_frame: Some((32, 24)),
            ..FakeCameraConfig::default()
        });
        let mut session = fixture.session();
        session.start_session().unwrap();

        let err = session.capture_still().expect_err("size mismatch");
        assert!(matches!(err, CaptureError::InvalidFrame { .. }));
        assert_eq!(session.state(), CaptureState::Live);
    }

    #[test]
    fn unknown_dimensions_disable_capture() {
        let fixture = Fixture::new(FakeCameraConfig {
            dimensions: None,
            ..FakeCameraConfig::default()
        });
        let mut session = fixture.session();
        session.start_session().unwrap();

        assert!(!session.controls().capture);
        assert!(matches!(
            session.capture_still(),
            Err(CaptureError::UnknownDimensions)
        ));
        assert_eq!(session.state(), CaptureState::Live);
    }

    #[test]
    fn restarting_a_live_session_replaces_the_stream() {
        let fixture = Fixture::working();
        let mut session = fixture.session();

        session.start_session().unwrap();
        let first = session.stream().map(|stream| stream.id);
        session.start_session().unwrap();

        assert_eq!(fixture.backend.opened_count(), 2);
        assert_eq!(fixture.backend.open_streams(), 1);
        assert_eq!(fixture.backend.released(), vec![first.unwrap()]);
        assert_eq!(session.state(), CaptureState::Live);
    }

    #[test]
    fn second_start_while_pending_reuses_acquisition() {
        let fixture = Fixture::working();
        let gate = fixture.backend.gate_open();
        let mut session = fixture.session();

        session.begin_start().unwrap();
        session.begin_start().unwrap();
        assert_eq!(session.state(), CaptureState::Starting);

        let controls = session.controls();
        assert!(controls.starting);
        assert!(!controls.capture);
        assert!(!controls.torch);
        assert!(session.poll_start().is_none());

        gate.send(()).unwrap();
        session.start_session().unwrap();

        assert_eq!(fixture.backend.opened_count(), 1);
        assert_eq!(session.state(), CaptureState::Live);
        assert!(!session.controls().starting);
    }

    #[test]
    fn poll_start_completes_pending_acquisition() {
        let fixture = Fixture::working();
        let mut session = fixture.session();
        session.begin_start().unwrap();

        let result = loop {
            if let Some(result) = session.poll_start() {
                break result;
            }
            std::thread::yield_now();
        };
        result.unwrap();
        assert_eq!(session.state(), CaptureState::Live);
    }

    #[test]
    fn ending_during_acquisition_releases_late_stream() {
        let fixture = Fixture::working();
        let gate = fixture.backend.gate_open();
        let mut session = fixture.session();

        session.begin_start().unwrap();
        session.end_session();
        assert_eq!(session.state(), CaptureState::Closed);

        gate.send(()).unwrap();
        while fixture.backend.released().is_empty() {
            std::thread::yield_now();
        }
        assert_eq!(fixture.backend.opened_count(), 1);
        assert_eq!(fixture.backend.open_streams(), 0);
    }

    #[test]
    fn upload_during_acquisition_releases_late_stream() {
        let fixture = Fixture::working();
        let gate = fixture.backend.gate_open();
        let mut session = fixture.session();
        let upload = fixture.write_upload("early.jpg");

        session.begin_start().unwrap();
        assert!(session.controls().starting);
        session.adopt_uploaded_image(&upload).unwrap();
        assert_eq!(session.state(), CaptureState::Reviewing);
        assert!(!session.is_starting());

        gate.send(()).unwrap();
        while fixture.backend.released().is_empty() {
            std::thread::yield_now();
        }
        assert_eq!(session.state(), CaptureState::Reviewing);
        assert!(session.stream().is_none());
        assert_eq!(fixture.backend.opened_count(), 1);
        assert_eq!(fixture.backend.open_streams(), 0);
    }

    #[test]
    fn upload_replaces_live_preview() {
        let fixture = Fixture::working();
        let mut session = fixture.session();
        session.start_session().unwrap();

        let upload = fixture.write_upload("upload.jpg");
        let still = session.adopt_uploaded_image(&upload).unwrap();

        assert_eq!((still.width, still.height), (30, 20));
        assert_eq!(
            image::ImageFormat::from_path(&still.temp_path).unwrap(),
            ImageFormat::Png
        );
        assert!(still.temp_path.exists());
        assert_eq!(fixture.backend.open_streams(), 0);
        assert_eq!(session.state(), CaptureState::Reviewing);
    }

    #[test]
    fn undecodable_upload_keeps_session_live() {
        let fixture = Fixture::working();
        let mut session = fixture.session();
        session.start_session().unwrap();

        let bogus = fixture.temp.path().join("notes.png");
        std::fs::write(&bogus, b"definitely not an image").unwrap();

        let err = session
            .adopt_uploaded_image(&bogus)
            .expect_err("decode should fail");
        assert!(matches!(err, CaptureError::UploadDecode { .. }));
        assert_eq!(session.state(), CaptureState::Live);
        assert_eq!(fixture.backend.open_streams(), 1);
        assert_eq!(
            fixture.notifier.last(),
            Some((NotificationKind::Error, UPLOAD_FAILED_MESSAGE.to_string()))
        );
    }

    #[test]
    fn retake_discards_still_and_restarts_preview() {
        let fixture = Fixture::working();
        let mut session = fixture.session();
        session.start_session().unwrap();
        let still = session.capture_still().unwrap();

        session.retake().expect("retake should restart preview");

        assert!(!still.temp_path.exists());
        assert!(session.still().is_none());
        assert_eq!(session.state(), CaptureState::Live);
        assert_eq!(fixture.backend.opened_count(), 2);
        assert_eq!(fixture.backend.open_streams(), 1);
    }

    #[test]
    fn confirm_hands_over_still_and_keeps_file() {
        let fixture = Fixture::working();
        let mut session = fixture.session();
        session.start_session().unwrap();
        session.capture_still().unwrap();

        let still = session.confirm().expect("confirm reviewed still");
        drop(session);

        assert!(still.temp_path.exists());
        assert_eq!(fixture.backend.open_streams(), 0);
    }

    #[test]
    fn end_session_is_idempotent_and_runs_on_drop() {
        let fixture = Fixture::working();
        {
            let mut session = fixture.session();
            session.start_session().unwrap();
            session.end_session();
            session.end_session();
            assert_eq!(session.state(), CaptureState::Closed);
            assert_eq!(
                session
                    .history()
                    .iter()
                    .filter(|t| t.event == CaptureEvent::End)
                    .count(),
                1
            );
        }
        {
            let mut session = fixture.session();
            session.start_session().unwrap();
        }
        assert_eq!(fixture.backend.opened_count(), 2);
        assert_eq!(fixture.backend.open_streams(), 0);
    }

    #[test]
    fn closed_session_rejects_restart() {
        let fixture = Fixture::working();
        let mut session = fixture.session();
        session.end_session();

        assert!(matches!(
            session.start_session(),
            Err(CaptureError::State(_))
        ));
        assert_eq!(fixture.backend.opened_count(), 0);
    }

    #[test]
    fn cleanup_temp_still_removes_file_and_tolerates_missing_one() {
        let fixture = Fixture::working();
        let path = fixture.temp.path().join("capture_still-9.png");
        std::fs::write(&path, b"png").unwrap();

        cleanup_temp_still(&path, "test cleanup");
        assert!(!path.exists());
        cleanup_temp_still(&path, "test cleanup");
        assert!(!path.exists());
    }
}
