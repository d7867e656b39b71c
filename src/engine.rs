//! Scoped access to a running underwriting engine.
//!
//! Acquiring the engine starts the service when it is down. Releasing it
//! stops the service only when `kill_on_exit` was requested and the service
//! was down at acquisition time; a service that was already running belongs
//! to someone else and is never stopped.

use crate::config::{Config, Environment};
use crate::errors::UnderwritingError;
use crate::insure_service::{HttpInsureService, InsureService};
use crate::underwriting::PolicyUnderwriting;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

/// Holds the engine for a block of work and releases the service afterwards.
///
/// Call [`release`](Self::release) when done. A guard dropped without release
/// (early return, panic, cancelled future) schedules the stop on the current
/// tokio runtime instead.
#[must_use = "the service is released when the guard is released or dropped"]
pub struct UnderwritingEngineGuard {
    engine: PolicyUnderwriting,
    was_up: bool,
    kill_on_exit: bool,
    released: bool,
}

impl UnderwritingEngineGuard {
    pub fn engine(&self) -> &PolicyUnderwriting {
        &self.engine
    }

    /// Whether the service was already running when the guard was acquired.
    pub fn was_up(&self) -> bool {
        self.was_up
    }

    fn owns_service(&self) -> bool {
        self.kill_on_exit && !self.was_up
    }

    /// Stops the service if this guard owns it.
    ///
    /// If the returned future is dropped before the stop completes, the
    /// guard's `Drop` still schedules a stop.
    pub async fn release(mut self) -> Result<(), UnderwritingError> {
        if !self.owns_service() {
            self.released = true;
            tracing::debug!(
                "Leaving underwriting service in {} running",
                self.engine.service().environment()
            );
            return Ok(());
        }

        let stopped = self.engine.service().stop().await;
        self.released = true;

        stopped.map_err(|e| {
            tracing::error!("Failed to stop underwriting service: {}", e);
            e
        })
    }
}

impl Deref for UnderwritingEngineGuard {
    type Target = PolicyUnderwriting;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

impl Drop for UnderwritingEngineGuard {
    fn drop(&mut self) {
        if self.released || !self.owns_service() {
            return;
        }

        let service = Arc::clone(self.engine.service());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(
                    "Engine guard dropped without release, stopping {} in background",
                    service.environment()
                );
                handle.spawn(async move {
                    if let Err(e) = service.stop().await {
                        tracing::error!("Failed to stop underwriting service: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::error!(
                    "Engine guard dropped outside a tokio runtime; {} left running",
                    service.environment()
                );
            }
        }
    }
}

/// Acquires the engine on `service`, starting the service if it is down.
pub async fn acquire_underwriting_engine(
    service: Arc<dyn InsureService>,
    kill_on_exit: bool,
) -> Result<UnderwritingEngineGuard, UnderwritingError> {
    let was_up = service.is_up().await?;
    tracing::info!(
        "Underwriting service in {} is {}",
        service.environment(),
        if was_up { "up" } else { "down" }
    );

    // From here on the guard owns cleanup, including a failed start.
    let guard = UnderwritingEngineGuard {
        engine: PolicyUnderwriting::new(service),
        was_up,
        kill_on_exit,
        released: false,
    };

    if !was_up {
        let started = guard.engine.service().start().await;
        if let Err(e) = started {
            tracing::error!("Failed to start underwriting service: {}", e);
            if let Err(stop_err) = guard.release().await {
                tracing::warn!("Cleanup after failed start also failed: {}", stop_err);
            }
            return Err(e);
        }
    }

    Ok(guard)
}

/// Acquires the engine for the DEV or RATING_PROD environment.
pub async fn get_underwriting_engine(
    config: &Config,
    prod: bool,
    kill_on_exit: bool,
) -> Result<UnderwritingEngineGuard, UnderwritingError> {
    let environment = Environment::from_prod_flag(prod);
    let service = HttpInsureService::new(config, environment)?;
    acquire_underwriting_engine(Arc::new(service), kill_on_exit).await
}

/// Runs `work` with the engine and releases the service afterwards.
///
/// The release happens whether `work` succeeds or fails. An error from
/// `work` takes precedence over an error from the release.
pub async fn with_underwriting_engine<F, Fut, T>(
    service: Arc<dyn InsureService>,
    kill_on_exit: bool,
    work: F,
) -> Result<T, UnderwritingError>
where
    F: FnOnce(PolicyUnderwriting) -> Fut,
    Fut: Future<Output = Result<T, UnderwritingError>>,
{
    let guard = acquire_underwriting_engine(service, kill_on_exit).await?;
    let result = work(guard.engine().clone()).await;
    let released = guard.release().await;

    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_err)) => {
            tracing::warn!("Release failed after work error: {}", release_err);
            Err(e)
        }
    }
}
