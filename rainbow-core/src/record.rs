//! Types and traits for recording training metrics.
//!
//! # Basic Usage
//!
//! ```rust
//! use rainbow_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.25);
//! record.insert("epsilon", RecordValue::Scalar(0.9));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.25);
//! ```
//!
//! Records are written to a [`Recorder`]. Persisting them is left to
//! recorder implementations outside of this crate; [`BufferedRecorder`] keeps
//! them in memory.
mod base;
mod buffered_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use recorder::Recorder;
