// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Stop signal for the gauge runtime.
//!
//! SIGINT, SIGTERM and SIGQUIT on Unix (Ctrl+C elsewhere) and
//! [`ShutdownSignal::trigger`] all resolve [`ShutdownSignal::wait`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

/// Cloneable stop flag shared by the runtime and its background tasks.
#[derive(Clone)]
pub struct ShutdownSignal {
    notify: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self {
            notify,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Receiver that yields once when the signal triggers.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Triggers the signal. Later calls do nothing.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            info!("Stopping gauge");
            let _ = self.notify.send(());
        }
    }

    /// Whether [`trigger`](Self::trigger) has run.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolves on an OS signal or on [`trigger`](Self::trigger).
    pub async fn wait(&self) {
        let mut triggered = self.subscribe();
        if self.is_triggered() {
            return;
        }

        tokio::select! {
            _ = os_signal() => {}
            _ = triggered.recv() => {}
        }

        self.trigger();
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut term), Ok(mut int), Ok(mut quit)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::quit()),
    ) else {
        warn!("Unix signal handlers unavailable, listening for Ctrl+C only");
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(signal = "ctrl-c", "Signal received");
        }
        return;
    };

    let name = tokio::select! {
        _ = term.recv() => "SIGTERM",
        _ = int.recv() => "SIGINT",
        _ = quit.recv() => "SIGQUIT",
    };
    info!(signal = name, "Signal received");
}

#[cfg(not(unix))]
async fn os_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(signal = "ctrl-c", "Signal received"),
        Err(e) => {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}
