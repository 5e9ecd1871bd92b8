//! Call wrapper that owns the log lifecycle
//!
//! [`CallRunner::run`] gives the body a fresh [`LogContext`], and on every
//! exit path (success, error, panic, cancellation) builds the [`LogEvent`] once and stores
//! it if anything was logged. Failures of the body are recorded and then
//! handed back untouched.

use super::clock::Clock;
use super::context::LogContext;
use super::database::{LogStore, StoreError};
use super::event::endpoint_name;
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use std::time::Instant;

thread_local! {
    /// Backtrace of the last panic on this thread, taken inside the panic hook
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Chain a hook in front of the existing one that records where panics happen
///
/// By the time `catch_unwind` returns, the panicking frames are gone, so the
/// trace has to be taken here.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            let backtrace = Backtrace::force_capture().to_string();
            let _ = PANIC_BACKTRACE.try_with(|slot| *slot.borrow_mut() = Some(backtrace));
            default_hook(panic_info);
        }));
    });
}

fn take_panic_backtrace() -> Option<String> {
    PANIC_BACKTRACE.try_with(|slot| slot.borrow_mut().take()).ok().flatten()
}

/// Runs units of work inside a logging context
#[derive(Clone)]
pub struct CallRunner {
    store: Arc<LogStore>,
    clock: Arc<dyn Clock>,
}

impl CallRunner {
    pub fn new(store: Arc<LogStore>, clock: Arc<dyn Clock>) -> Self {
        install_panic_hook();
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }

    /// Run `body` as the call `name`
    ///
    /// - `Ok` from the body is returned once the event (if any) is stored;
    ///   a store failure then surfaces as `E::from(StoreError)`.
    /// - `Err` from the body is recorded as an error entry and returned as
    ///   the same value. A store failure at that point is only traced.
    /// - A panic in the body is recorded with the backtrace of the panic
    ///   site, the event stored, and the panic resumed.
    /// - If the returned future is dropped before the body finishes (client
    ///   disconnect, `timeout`, `select!`), a "Call cancelled" entry is added
    ///   and the event is stored from a spawned task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let user = runner
    ///     .run("/users/get", |ctx| async move {
    ///         ctx.log_data("Id", || id);
    ///         load_user(id).await
    ///     })
    ///     .await?;
    /// ```
    pub async fn run<T, E, F, Fut>(&self, name: &str, body: F) -> Result<T, E>
    where
        F: FnOnce(LogContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug + From<StoreError>,
    {
        let endpoint = endpoint_name(name);
        let context = LogContext::new(endpoint.clone(), self.clock.clone());
        let started = Instant::now();
        let guard = CancelGuard {
            context: Some(context.clone()),
            store: self.store.clone(),
            call_name: name.to_string(),
            started,
        };

        let body_context = context.clone();
        let outcome = AssertUnwindSafe(async move { body(body_context).await })
            .catch_unwind()
            .await;
        guard.disarm();

        match outcome {
            Ok(Ok(value)) => match self.store_log(&context).await {
                Ok(_) => {
                    crate::metrics::record_call(&endpoint, "ok", started.elapsed());
                    Ok(value)
                }
                Err(store_error) => {
                    crate::metrics::record_call(&endpoint, "store_error", started.elapsed());
                    Err(E::from(store_error))
                }
            },
            Ok(Err(error)) => {
                context.log_exception(&error, || format!("Unexpected error handling '{}'", name));
                crate::metrics::record_call(&endpoint, "error", started.elapsed());
                if let Err(store_error) = self.store_log(&context).await {
                    tracing::error!(
                        endpoint = %endpoint,
                        error = %store_error,
                        "Failed to store log of failed call"
                    );
                }
                Err(error)
            }
            Err(panic) => {
                let stacktrace = take_panic_backtrace().unwrap_or_else(|| Backtrace::force_capture().to_string());
                context.record_error(
                    format!("Unexpected error handling '{}'", name),
                    panic_message(panic.as_ref()),
                    stacktrace,
                );
                crate::metrics::record_call(&endpoint, "panic", started.elapsed());
                if let Err(store_error) = self.store_log(&context).await {
                    tracing::error!(
                        endpoint = %endpoint,
                        error = %store_error,
                        "Failed to store log of panicked call"
                    );
                }
                panic::resume_unwind(panic)
            }
        }
    }

    /// Build the event and persist it unless nothing was logged
    ///
    /// Returns the assigned id, or `None` when the call logged nothing.
    async fn store_log(&self, context: &LogContext) -> Result<Option<i64>, StoreError> {
        let event = context.finish();
        if event.logs.is_empty() {
            tracing::trace!(endpoint = %event.name, "Call logged nothing, skipping store");
            return Ok(None);
        }

        let id = self.store.put(&event).await?;
        tracing::debug!(
            endpoint = %event.name,
            id = id,
            lines = event.logs.len(),
            duration_ms = event.duration_ms(),
            "Stored call log"
        );

        Ok(Some(id))
    }
}

/// Stores the call when `run` is dropped before the body completes
struct CancelGuard {
    context: Option<LogContext>,
    store: Arc<LogStore>,
    call_name: String,
    started: Instant,
}

impl CancelGuard {
    fn disarm(mut self) {
        self.context = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };

        context.record_error(
            format!("Unexpected error handling '{}'", self.call_name),
            "Call cancelled".to_string(),
            Backtrace::force_capture().to_string(),
        );
        let event = context.finish();
        crate::metrics::record_call(&event.name, "cancelled", self.started.elapsed());

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(endpoint = %event.name, "Call cancelled outside a runtime, log dropped");
            return;
        };

        let store = self.store.clone();
        runtime.spawn(async move {
            match store.put(&event).await {
                Ok(id) => tracing::debug!(endpoint = %event.name, id = id, "Stored log of cancelled call"),
                Err(e) => tracing::error!(
                    endpoint = %event.name,
                    error = %e,
                    "Failed to store log of cancelled call"
                ),
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
