//! Logging facilities for Trellis.
//!
//! Trellis uses the `tracing` crate for instrumentation. Install a
//! subscriber in your application to see the output:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("trellis_cells=debug")
//!     .init();
//! ```
//!
//! Recycling transitions are logged at `trace`, edit transitions at
//! `debug`, abandoned edits and parse failures at `warn`.

/// Span names used throughout Trellis for tracing.
pub mod span_names {
    /// One virtualization pass over the visible slots.
    pub const LAYOUT_PASS: &str = "trellis::layout_pass";
    /// A single item update delivered to a cell.
    pub const UPDATE_ITEM: &str = "trellis::update_item";
    /// An edit session from start to commit or cancel.
    pub const EDIT: &str = "trellis::edit";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "trellis_core::signal";
    /// Property system target.
    pub const PROPERTY: &str = "trellis_core::property";
    /// Error handler target.
    pub const ERROR_HANDLER: &str = "trellis_core::error_handler";
    /// Cell recycling target.
    pub const CELL: &str = "trellis_cells::cell";
    /// Edit state machine target.
    pub const EDIT: &str = "trellis_cells::edit";
    /// Render cache target.
    pub const CACHE: &str = "trellis_cells::cache";
    /// Fragment binding target.
    pub const FRAGMENT: &str = "trellis_cells::fragment";
    /// Host virtualization loop target.
    pub const FLOW: &str = "trellis_cells::flow";
}

/// A guard that keeps a tracing span entered until it is dropped.
///
/// Useful for timing a virtualization pass or an edit session.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "trellis::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
