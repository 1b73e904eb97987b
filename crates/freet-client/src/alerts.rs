use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

use crate::error::ClientError;

/// How long an alert stays up before it clears itself.
pub const ALERT_LIFETIME: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub id: u64,
    pub kind: AlertKind,
    pub message: String,
}

#[derive(Default)]
struct AlertState {
    next_id: u64,
    alerts: Vec<Alert>,
}

/// Inline alerts shown next to a form or list. Each one is removed by a
/// timer task `lifetime` after it was pushed. Must be used inside a tokio
/// runtime.
#[derive(Clone)]
pub struct Alerts {
    state: Arc<Mutex<AlertState>>,
    lifetime: Duration,
}

impl Default for Alerts {
    fn default() -> Self {
        Self::new()
    }
}

impl Alerts {
    pub fn new() -> Self {
        Self::with_lifetime(ALERT_LIFETIME)
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(AlertState::default())),
            lifetime,
        }
    }

    pub fn push(&self, kind: AlertKind, message: impl Into<String>) -> u64 {
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.alerts.push(Alert {
                id,
                kind,
                message: message.into(),
            });
            id
        };

        let alerts = self.clone();
        let lifetime = self.lifetime;
        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            alerts.dismiss(id);
        });

        id
    }

    /// Surface a failed request.
    pub fn error(&self, err: &ClientError) -> u64 {
        self.push(AlertKind::Error, err.to_string())
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(AlertKind::Success, message)
    }

    pub fn dismiss(&self, id: u64) {
        self.lock().alerts.retain(|alert| alert.id != id);
    }

    /// Alerts currently on screen, oldest first.
    pub fn active(&self) -> Vec<Alert> {
        self.lock().alerts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AlertState> {
        // A panic while holding the lock leaves the list intact; keep using it.
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("alert list lock was poisoned");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    async fn elapse(duration: Duration) {
        tokio::time::sleep(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_clear_after_lifetime() {
        let alerts = Alerts::new();
        alerts.push(AlertKind::Error, "Freet not found.");
        assert_eq!(alerts.active().len(), 1);

        elapse(ALERT_LIFETIME - Duration::from_millis(100)).await;
        assert_eq!(alerts.active().len(), 1);

        elapse(Duration::from_millis(200)).await;
        assert!(alerts.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn each_alert_has_its_own_timer() {
        let alerts = Alerts::with_lifetime(Duration::from_secs(2));
        let first = alerts.push(AlertKind::Error, "first");
        elapse(Duration::from_secs(1)).await;
        let second = alerts.success("second");
        assert_ne!(first, second);

        elapse(Duration::from_millis(1500)).await;
        let left = alerts.active();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, second);
        assert_eq!(left[0].kind, AlertKind::Success);

        elapse(Duration::from_secs(1)).await;
        assert!(alerts.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_become_error_alerts() {
        let alerts = Alerts::new();
        let err = ClientError::from_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            r#"{"error":"Freet content must be no more than 280 characters."}"#,
        );
        let id = alerts.error(&err);

        assert_eq!(
            alerts.active(),
            vec![Alert {
                id,
                kind: AlertKind::Error,
                message: "Freet content must be no more than 280 characters.".into(),
            }]
        );

        alerts.dismiss(id);
        assert!(alerts.active().is_empty());
    }
}
