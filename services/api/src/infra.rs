use chrono::NaiveDate;
use eventcover::lifecycle::{Notification, NotificationError, NotificationPublisher};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Hands notifications to the log until a mail relay is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotifier;

impl NotificationPublisher for LoggingNotifier {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            template = notification.template.label(),
            recipient = %notification.recipient,
            reference = %notification.reference,
            "notification queued"
        );
        Ok(())
    }
}

/// Keeps every notification so the demo can print what would have been sent.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationPublisher for InMemoryNotifier {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut guard = self
            .sent
            .lock()
            .map_err(|_| NotificationError::Transport("notifier mutex poisoned".to_string()))?;
        guard.push(notification);
        Ok(())
    }
}

impl InMemoryNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
