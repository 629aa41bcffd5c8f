//! Background tasks that feed the UI loop.
//!
//! Tasks never touch the session. They report through an mpsc channel which
//! the UI loop drains between frames.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::models::{HealthStatus, ServerInfo};
use crate::widget::{check_widget, WidgetStatus};

/// Buffer size for the background event channel.
pub const CHANNEL_BUFFER_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub enum BackgroundEvent {
    /// Result of one `/health` poll
    Health {
        status: HealthStatus,
        checked_at: DateTime<Utc>,
    },
    /// Backend details, fetched once it first reports healthy
    Info(ServerInfo),
    /// Outcome of the assistant widget check
    Widget(WidgetStatus),
}

/// Poll `/health` every `interval` until the receiver goes away.
pub fn spawn_health_monitor(
    api: ApiClient,
    interval: Duration,
    tx: mpsc::Sender<BackgroundEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut info_fetched = false;
        loop {
            let status = api.health().await;
            let event = BackgroundEvent::Health {
                status,
                checked_at: Utc::now(),
            };
            if tx.send(event).await.is_err() {
                debug!("Health monitor stopping, receiver dropped");
                return;
            }

            if status == HealthStatus::Online && !info_fetched {
                match api.info().await {
                    Ok(info) => {
                        info_fetched = true;
                        if tx.send(BackgroundEvent::Info(info)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to fetch server info"),
                }
            }

            tokio::time::sleep(interval).await;
        }
    })
}

/// Run the widget check once and report its outcome.
pub fn spawn_widget_checker(
    api: ApiClient,
    url: Option<String>,
    delay: Duration,
    tx: mpsc::Sender<BackgroundEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let status = check_widget(&api, url.as_deref(), delay).await;
        let _ = tx.send(BackgroundEvent::Widget(status)).await;
    })
}
