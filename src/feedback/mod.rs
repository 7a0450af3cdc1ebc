use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_timer::Delay;

/// Receives failures that are not validation messages: validator errors and
/// failed background operations.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: CapturedError);
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CapturedError {
    pub message: String,
}

impl CapturedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_error(error: &impl Display) -> Self {
        Self::new(error.to_string())
    }
}

impl Display for CapturedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Error boundary shared by a form and its fields. Errors are kept in arrival
/// order and de-duplicated by message.
#[derive(Clone, Default)]
pub struct ErrorCapture {
    errors: Arc<RwLock<Vec<CapturedError>>>,
}

impl ErrorCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&self, error: CapturedError) {
        let mut errors = match self.errors.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if errors.iter().any(|known| known.message == error.message) {
            return;
        }
        tracing::debug!(message = %error.message, "captured error");
        errors.push(error);
    }

    pub fn errors(&self) -> Vec<CapturedError> {
        match self.errors.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    /// Dismiss one error by message.
    pub fn clear_error(&self, message: &str) {
        let mut errors = match self.errors.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        errors.retain(|error| error.message != message);
    }

    pub fn clear_all(&self) {
        let mut errors = match self.errors.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        errors.clear();
    }

    /// Await `operation`; a failure is captured and yields `None`.
    pub async fn handle<T, E, F>(&self, operation: F) -> Option<T>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        match operation.await {
            Ok(value) => Some(value),
            Err(error) => {
                self.capture(CapturedError::from_error(&error));
                None
            }
        }
    }
}

impl ErrorSink for ErrorCapture {
    fn report(&self, error: CapturedError) {
        self.capture(error);
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoadingOptions {
    pub min_loading_time: Duration,
}

impl LoadingOptions {
    pub fn min_loading_time(mut self, value: Duration) -> Self {
        self.min_loading_time = value;
        self
    }
}

/// A loading flag raised for the duration of an operation.
#[derive(Clone, Default)]
pub struct LoadingState {
    loading: Arc<AtomicBool>,
    options: LoadingOptions,
}

impl LoadingState {
    pub fn new(options: LoadingOptions) -> Self {
        Self {
            loading: Arc::new(AtomicBool::new(false)),
            options,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Raise the flag while `operation` runs, and for at least the configured
    /// minimum loading time. The flag drops even if the future is abandoned.
    pub async fn show_while<F: Future>(&self, operation: F) -> F::Output {
        self.loading.store(true, Ordering::SeqCst);
        let _reset = ResetOnDrop(&self.loading);
        if self.options.min_loading_time.is_zero() {
            operation.await
        } else {
            let (output, ()) =
                futures::join!(operation, Delay::new(self.options.min_loading_time));
            output
        }
    }
}

struct ResetOnDrop<'a>(&'a AtomicBool);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
