//! Assistant widget load check.
//!
//! The rich assistant widget is a third-party embed. If it has not answered
//! by a fixed deadline the client offers the simple built-in chat instead.

use std::time::Duration;

use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info};

use crate::api::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetStatus {
    Loading,
    Loaded,
    FallbackOffered,
}

/// Decide, once `delay` has elapsed, whether the widget loaded.
///
/// The decision is always made at the deadline, never earlier, so a fast
/// failure and a slow one look the same to the user.
pub async fn check_widget(api: &ApiClient, url: Option<&str>, delay: Duration) -> WidgetStatus {
    let deadline = Instant::now() + delay;

    let loaded = match url {
        Some(url) => matches!(timeout_at(deadline, api.probe(url)).await, Ok(true)),
        None => {
            debug!("No widget URL configured");
            false
        }
    };

    sleep_until(deadline).await;

    if loaded {
        debug!("Assistant widget loaded");
        WidgetStatus::Loaded
    } else {
        info!("Assistant widget unavailable, offering fallback chat");
        WidgetStatus::FallbackOffered
    }
}
