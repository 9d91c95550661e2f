const APP_NAME: &str = "FishTrack";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

impl NotificationKind {
    const fn summary(self) -> &'static str {
        match self {
            Self::Success => "FishTrack",
            Self::Error => "FishTrack error",
            Self::Info => "FishTrack info",
        }
    }
}

/// Fire-and-forget user notifications.
pub trait Notifier {
    fn notify(&self, kind: NotificationKind, message: &str);

    fn success(&self, message: &str) {
        self.notify(NotificationKind::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(NotificationKind::Error, message);
    }

    fn info(&self, message: &str) {
        self.notify(NotificationKind::Info, message);
    }
}

#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        tracing::info!(?kind, message, "notification");
        if let Err(err) = notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(kind.summary())
            .body(message)
            .show()
        {
            tracing::warn!("system notification failed: {err}");
        }
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        match kind {
            NotificationKind::Error => tracing::warn!(?kind, message, "notification"),
            NotificationKind::Success | NotificationKind::Info => {
                tracing::info!(?kind, message, "notification")
            }
        }
    }
}

/// Keeps every notification in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    sent: std::cell::RefCell<Vec<(NotificationKind, String)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sent(&self) -> Vec<(NotificationKind, String)> {
        self.sent.borrow().clone()
    }

    pub(crate) fn last(&self) -> Option<(NotificationKind, String)> {
        self.sent.borrow().last().cloned()
    }

    pub(crate) fn count_of(&self, kind: NotificationKind) -> usize {
        self.sent
            .borrow()
            .iter()
            .filter(|(sent_kind, _)| *sent_kind == kind)
            .count()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        self.sent.borrow_mut().push((kind, message.to_string()));
    }
}
