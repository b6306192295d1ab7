//! Injected handler for errors that escape the render loop.
//!
//! Cells run inside host callbacks (scroll, item change, key press) that
//! cannot propagate a `Result` back to application code. Those errors are
//! handed to an [`ErrorHandler`] instead. The handler is an ordinary value
//! that the application constructs and passes to whoever needs it; there is
//! no process-wide mutable hook.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_core::{CoreError, ErrorHandler};
//!
//! let handler = ErrorHandler::new()
//!     .with_filter(|event| {
//!         if event.error().to_string().contains("expected") {
//!             event.consume();
//!         }
//!     })
//!     .with_presenter(|error| eprintln!("{}", ErrorHandler::describe(error)));
//!
//! handler.handle(&CoreError::panic("expected failure", None));
//! assert_eq!(handler.presented_count(), 0);
//! ```

use std::cell::Cell;
use std::error::Error;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::CoreError;
use crate::logging::targets;

thread_local! {
    static HANDLING: Cell<bool> = const { Cell::new(false) };
}

/// An error offered to the handler's filter before it is presented.
pub struct ErrorEvent<'a> {
    thread: String,
    error: &'a (dyn Error + 'static),
    consumed: bool,
}

impl<'a> ErrorEvent<'a> {
    /// Name (or id) of the thread that reported the error.
    pub fn thread(&self) -> &str {
        &self.thread
    }

    /// The reported error.
    pub fn error(&self) -> &'a (dyn Error + 'static) {
        self.error
    }

    /// Mark the error as handled so it is not presented.
    pub fn consume(&mut self) {
        self.consumed = true;
    }

    /// Returns `true` once a filter has consumed the event.
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}

/// Clears the per-thread handling flag, even when a presenter panics.
struct HandlingReset;

impl Drop for HandlingReset {
    fn drop(&mut self) {
        HANDLING.with(|flag| flag.set(false));
    }
}

type ErrorFilter = Box<dyn Fn(&mut ErrorEvent<'_>) + Send + Sync>;
type ErrorPresenter = Box<dyn Fn(&(dyn Error + 'static)) + Send + Sync>;

/// Logs, filters and presents errors reported from UI callbacks.
///
/// By default every error is logged and nothing else happens. A filter may
/// consume an event to suppress presentation; a presenter (typically an
/// error dialog) is called for every event that is not consumed.
#[derive(Default)]
pub struct ErrorHandler {
    filter: Option<ErrorFilter>,
    presenter: Option<ErrorPresenter>,
    handled: AtomicUsize,
    presented: AtomicUsize,
}

impl ErrorHandler {
    /// Create a handler that only logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter using builder pattern.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&mut ErrorEvent<'_>) + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Set the presenter using builder pattern.
    pub fn with_presenter<F>(mut self, presenter: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) + Send + Sync + 'static,
    {
        self.presenter = Some(Box::new(presenter));
        self
    }

    /// Report an error.
    ///
    /// If this is called again on the same thread while a previous report
    /// is still being filtered or presented, the nested report is logged
    /// and dropped to break the cycle.
    pub fn handle(&self, error: &(dyn Error + 'static)) {
        self.handled.fetch_add(1, Ordering::SeqCst);
        tracing::error!(target: targets::ERROR_HANDLER, error = %error, "uncaught error");

        if HANDLING.with(|flag| flag.replace(true)) {
            tracing::info!(
                target: targets::ERROR_HANDLER,
                error = %error,
                "detected cycle handling error, aborting"
            );
            return;
        }
        let _reset = HandlingReset;

        let current = std::thread::current();
        let thread = current
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{:?}", current.id()));
        let mut event = ErrorEvent {
            thread,
            error,
            consumed: false,
        };

        if let Some(filter) = &self.filter {
            filter(&mut event);
        }

        if !event.consumed {
            event.consume();
            self.presented.fetch_add(1, Ordering::SeqCst);
            if let Some(presenter) = &self.presenter {
                presenter(error);
            }
        }
    }

    /// Number of errors reported so far, including dropped cycles.
    pub fn handled_count(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }

    /// Number of errors that reached the presentation step.
    pub fn presented_count(&self) -> usize {
        self.presented.load(Ordering::SeqCst)
    }

    /// Render an error and its chain of sources, one per line.
    pub fn describe(error: &(dyn Error + 'static)) -> String {
        let mut out = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            let _ = write!(out, "\ncaused by: {cause}");
            source = cause.source();
        }
        out
    }

    /// Route panics from every thread to this handler.
    ///
    /// Replaces the current panic hook.
    pub fn install_panic_hook(self: &Arc<Self>) {
        let handler = Arc::clone(self);
        std::panic::set_hook(Box::new(move |info| {
            let payload = info.payload();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic payload>".to_owned());
            let location = info.location().map(|l| format!("{}:{}", l.file(), l.line()));
            handler.handle(&CoreError::panic(message, location));
        }));
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("has_filter", &self.filter.is_some())
            .field("has_presenter", &self.presenter.is_some())
            .field("handled", &self.handled_count())
            .finish()
    }
}
