//! Core systems for Trellis.
//!
//! This crate provides the reactive building blocks the cell engine is
//! written against:
//!
//! - **Signal/Slot System**: Type-safe notification with scoped and
//!   single-use connections
//! - **Property System**: Values with change notification and one-way
//!   bindings
//! - **Error Handler**: An injected sink for errors raised inside UI
//!   callbacks
//! - **Logging**: `tracing` targets and span names
//!
//! # Signal/Slot Example
//!
//! ```
//! use trellis_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```
//!
//! # Property Example
//!
//! ```
//! use trellis_core::Property;
//!
//! let count = Property::new(0);
//! count.changed().connect(|n| println!("count is now {n}"));
//! assert!(count.set(1));
//! assert!(!count.set(1));
//! ```

mod error;
pub mod error_handler;
pub mod logging;
pub mod property;
pub mod signal;

pub use error::CoreError;
pub use error_handler::{ErrorEvent, ErrorHandler};
pub use logging::PerfSpan;
pub use property::Property;
pub use signal::{ConnectionGuard, ConnectionId, Signal, Subscription};
