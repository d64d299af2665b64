//! Cooperative cancellation shared by every capture thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::{AudioError, AudioResult};

#[derive(Debug, Default)]
struct ShutdownInner {
    triggered: AtomicBool,
    reason: Mutex<Option<String>>,
    signal: Condvar,
}

/// Clonable cancellation flag with a blocking wait
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<ShutdownInner>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. The first reason wins.
    pub fn trigger(&self, reason: impl Into<String>) {
        let mut slot = self.inner.reason.lock();
        if slot.is_none() {
            let reason = reason.into();
            log::debug!("Shutdown requested: {}", reason);
            *slot = Some(reason);
        }
        self.inner.triggered.store(true, Ordering::Release);
        self.inner.signal.notify_all();
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// Sleep up to `timeout`, returning early when shutdown is requested.
    ///
    /// Returns `true` if shutdown has been requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut slot = self.inner.reason.lock();
        if !self.is_triggered() {
            self.inner.signal.wait_for(&mut slot, timeout);
        }
        drop(slot);
        self.is_triggered()
    }
}

/// Trip `token` on Ctrl-C (SIGINT), or SIGTERM on unix, from a dedicated thread.
///
/// The thread runs a current-thread tokio runtime and exits after the first
/// signal, or never if none arrives.
pub fn spawn_signal_handler(token: ShutdownToken) -> AudioResult<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AudioError::Config(format!("signal runtime: {}", e)))?;

    thread::Builder::new()
        .name("signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match wait_for_signal().await {
                    Ok(name) => {
                        log::info!("{} received, stopping capture", name);
                        token.trigger(format!("{} received", name));
                    }
                    Err(e) => log::error!("Unable to listen for termination signals: {}", e),
                }
            });
        })
        .map_err(|e| AudioError::Config(format!("signal thread: {}", e)))
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
}
