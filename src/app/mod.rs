use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use crate::capture::{CameraBackend, CaptureSession, V4l2CameraBackend};
use crate::compose::{
    Clock, FreshnessPolicy, Identifier, PlaceholderIdentifier, ReportedFreshness,
    ResultComposer, SystemClock,
};
use crate::config::{runtime_temp_dir, AppConfig};
use crate::error::{AppError, AppResult};
use crate::navigation::{NavigationShell, Route, TabItem};
use crate::notification::{DesktopNotifier, LogNotifier, Notifier};
use crate::records::{CatchRecord, RecordStore};
use crate::storage::{FileStorage, ImageLibrary, KeyValueStorage};

mod screens;

pub use self::screens::{
    HomeView, PendingResult, RecordsView, ResultView, SettingsState, NO_RECORDS_MESSAGE,
    NO_SCANS_MESSAGE,
};

const SAVE_SUCCESS_MESSAGE: &str = "Result saved successfully!";
const SAVE_FAILED_MESSAGE: &str = "Failed to save result";
const IDENTIFY_FAILED_MESSAGE: &str = "Unable to identify the catch. Please try again.";
const DATA_SYNCED_MESSAGE: &str = "All data synced successfully!";
const RECORDS_SYNCED_MESSAGE: &str = "All records synced successfully!";
const SYNC_SETTINGS_MESSAGE: &str = "Sync settings opened";

/// Collaborators the app drives; production wiring lives in [`App::from_config`].
pub struct AppServices {
    pub camera: Arc<dyn CameraBackend>,
    pub notifier: Rc<dyn Notifier>,
    pub storage: Box<dyn KeyValueStorage>,
    pub images: ImageLibrary,
    pub clock: Box<dyn Clock>,
    pub identifier: Box<dyn Identifier>,
    pub freshness: Box<dyn FreshnessPolicy>,
}

pub struct App {
    config: AppConfig,
    nav: NavigationShell,
    started_at: Instant,
    camera: Arc<dyn CameraBackend>,
    notifier: Rc<dyn Notifier>,
    store: RecordStore<Box<dyn KeyValueStorage>>,
    images: ImageLibrary,
    composer: ResultComposer<Box<dyn Clock>>,
    identifier: Box<dyn Identifier>,
    freshness: Box<dyn FreshnessPolicy>,
    settings: SettingsState,
    capture: Option<CaptureSession>,
    pending: Option<PendingResult>,
}

impl App {
    pub fn new(config: AppConfig, services: AppServices) -> Self {
        let store = RecordStore::new(services.storage);
        let composer = ResultComposer::with_clock(services.clock);
        composer.seed_last_id(store.max_id());
        let settings = SettingsState {
            offline_mode: config.offline_mode,
        };

        Self {
            config,
            nav: NavigationShell::new(),
            started_at: Instant::now(),
            camera: services.camera,
            notifier: services.notifier,
            store,
            images: services.images,
            composer,
            identifier: services.identifier,
            freshness: services.freshness,
            settings,
            capture: None,
            pending: None,
        }
    }

    /// Wires the V4L2 camera, file-backed records and desktop notifications.
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let data_dir = config.resolve_data_dir()?;
        let images = ImageLibrary::open(runtime_temp_dir(), &data_dir)?;
        match images.prune_stale_temp_files(config.prune_temp_after_hours) {
            Ok(report) if report.removed_files > 0 => {
                tracing::info!(removed = report.removed_files, "pruned stale temp stills");
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(?err, "failed to prune stale temp stills"),
        }

        let notifier: Rc<dyn Notifier> = if config.desktop_notifications {
            Rc::new(DesktopNotifier)
        } else {
            Rc::new(LogNotifier)
        };
        tracing::info!(
            data_dir = %data_dir.display(),
            device = %config.camera_device.display(),
            "opening FishTrack"
        );

        let services = AppServices {
            camera: Arc::new(V4l2CameraBackend::new(config.camera_device.clone())),
            notifier,
            storage: Box::new(FileStorage::new(data_dir)),
            images,
            clock: Box::new(SystemClock),
            identifier: Box::new(PlaceholderIdentifier),
            freshness: Box::new(ReportedFreshness),
        };
        Ok(Self::new(config, services))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn route(&self) -> Route {
        self.nav.current()
    }

    pub fn navigation(&self) -> &NavigationShell {
        &self.nav
    }

    pub fn tab_bar(&self) -> Vec<TabItem> {
        self.nav.tab_bar()
    }

    pub fn records(&self) -> &RecordStore<Box<dyn KeyValueStorage>> {
        &self.store
    }

    pub fn settings(&self) -> SettingsState {
        self.settings
    }

    pub fn camera(&self) -> Option<&CaptureSession> {
        self.capture.as_ref()
    }

    pub fn camera_mut(&mut self) -> Option<&mut CaptureSession> {
        self.capture.as_mut()
    }

    pub fn pending_result(&self) -> Option<&PendingResult> {
        self.pending.as_ref()
    }

    /// Advances time-driven work: the splash delay and pending camera starts.
    pub fn poll(&mut self) -> AppResult<()> {
        if self.nav.advance_splash(self.started_at.elapsed()) {
            tracing::debug!("splash finished");
        }
        if let Some(session) = self.capture.as_mut() {
            if let Some(Err(err)) = session.poll_start() {
                tracing::debug!(?err, "camera start finished with error");
            }
        }
        Ok(())
    }

    pub fn navigate(&mut self, route: Route) -> AppResult<()> {
        let previous = self.nav.current();
        if previous == route {
            return Ok(());
        }

        match previous {
            Route::Camera => self.close_camera(),
            Route::Result => self.discard_pending(),
            _ => {}
        }
        self.nav.navigate(route);

        match route {
            Route::Camera => self.open_camera(),
            Route::Result if self.pending.is_none() => {
                let pending = self.identify(None)?;
                self.pending = Some(pending);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn require_route(&self, route: Route, action: &'static str) -> AppResult<()> {
        let current = self.nav.current();
        if current != route {
            return Err(AppError::WrongScreen {
                action,
                route: current,
            });
        }
        Ok(())
    }

    fn open_camera(&mut self) -> AppResult<()> {
        let mut session = CaptureSession::new(
            Arc::clone(&self.camera),
            Rc::clone(&self.notifier),
            self.images.temp_dir(),
        )
        .with_facing(self.config.camera_facing);
        session.begin_start()?;
        self.capture = Some(session);
        Ok(())
    }

    fn close_camera(&mut self) {
        if let Some(mut session) = self.capture.take() {
            session.end_session();
        }
    }

    fn discard_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if let Some(still) = pending.still {
            if let Err(err) = self.images.discard_temp_still(&still.capture_id) {
                tracing::warn!(
                    capture_id = %still.capture_id,
                    ?err,
                    "failed to discard unsaved still"
                );
            }
        }
    }

    fn identify(&self, still: Option<crate::capture::StillImage>) -> AppResult<PendingResult> {
        let mut outcome = self
            .identifier
            .identify(still.as_ref().map(|still| still.temp_path.as_path()))?;
        outcome.freshness = self.freshness.assess(&outcome);
        tracing::info!(
            species = %outcome.species,
            confidence = outcome.confidence,
            freshness = %outcome.freshness,
            "identification complete"
        );
        Ok(PendingResult { still, outcome })
    }

    /// Replaces the camera preview with an image file from disk.
    pub fn upload_image(&mut self, path: &Path) -> AppResult<()> {
        self.require_route(Route::Camera, "upload image")?;
        if self.capture.is_none() {
            self.open_camera()?;
        }
        if let Some(session) = self.capture.as_mut() {
            session.adopt_uploaded_image(path)?;
        }
        Ok(())
    }

    /// Hands the reviewed still to the identifier and shows the result screen.
    pub fn analyze(&mut self) -> AppResult<()> {
        self.require_route(Route::Camera, "analyze")?;
        let still = self
            .capture
            .as_ref()
            .and_then(CaptureSession::still)
            .cloned()
            .ok_or(crate::capture::CaptureError::MissingStill)?;

        // The session keeps reviewing the still until identification succeeds.
        let pending = match self.identify(Some(still)) {
            Ok(pending) => pending,
            Err(err) => {
                tracing::warn!(?err, "identification failed; still kept for retry");
                self.notifier.error(IDENTIFY_FAILED_MESSAGE);
                return Err(err);
            }
        };
        if let Some(session) = self.capture.as_mut() {
            session.confirm()?;
        }
        self.close_camera();
        self.nav.navigate(Route::Result);
        self.pending = Some(pending);
        Ok(())
    }

    pub fn result_view(&self) -> Option<ResultView> {
        self.pending.as_ref().map(ResultView::from)
    }

    /// Persists the pending result and moves to the records screen.
    pub fn save_result(&mut self, location: Option<&str>) -> AppResult<CatchRecord> {
        self.require_route(Route::Result, "save result")?;
        let pending = self.pending.as_ref().ok_or(AppError::NoPendingResult)?;

        let persisted = match &pending.still {
            Some(still) => match self.images.persist_still(&still.capture_id, &still.temp_path) {
                Ok(path) => Some(path),
                Err(err) => {
                    tracing::warn!(capture_id = %still.capture_id, ?err, "failed to persist still");
                    self.notifier.error(SAVE_FAILED_MESSAGE);
                    return Err(err.into());
                }
            },
            None => None,
        };
        let image = persisted
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());
        let record = self
            .composer
            .compose_record(image.as_deref(), &pending.outcome, location);

        match self.composer.save_record(&self.store, record) {
            Ok(saved) => {
                tracing::info!(record_id = saved.id, species = %saved.species, "saved catch record");
                self.notifier.success(SAVE_SUCCESS_MESSAGE);
                self.discard_pending();
                self.nav.navigate(Route::Records);
                Ok(saved)
            }
            Err(err) => {
                tracing::warn!(?err, "failed to save catch record");
                self.notifier.error(SAVE_FAILED_MESSAGE);
                if let Some(path) = persisted {
                    if let Err(cleanup) = std::fs::remove_file(&path) {
                        tracing::warn!(path = %path.display(), ?cleanup, "failed to remove orphaned image");
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Drops the pending result and goes back to a fresh camera session.
    pub fn retake_from_result(&mut self) -> AppResult<()> {
        self.require_route(Route::Result, "retake")?;
        self.navigate(Route::Camera)
    }

    pub fn home_view(&self) -> HomeView {
        HomeView {
            latest: self.store.latest_record(),
            total_scans: self.store.count(),
        }
    }

    pub fn records_view(&self, query: &str) -> RecordsView {
        RecordsView {
            query: query.to_string(),
            records: self.store.search(query),
        }
    }

    pub fn sync_data(&self) {
        tracing::info!(records = self.store.count(), "sync requested from home");
        self.notifier.success(DATA_SYNCED_MESSAGE);
    }

    pub fn sync_records(&self) {
        tracing::info!(records = self.store.count(), "sync requested from records");
        self.notifier.success(RECORDS_SYNCED_MESSAGE);
    }

    pub fn set_offline_mode(&mut self, offline: bool) {
        self.settings.offline_mode = offline;
        tracing::info!(offline, "offline mode changed");
        self.notifier.success(self.settings.mode_message());
    }

    pub fn manage_sync(&self) {
        self.notifier.info(SYNC_SETTINGS_MESSAGE);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.close_camera();
        self.discard_pending();
    }
}
