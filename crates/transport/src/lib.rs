//! # Context Transport
//!
//! Plumbing for streamed chat replies: splitting a server event stream into
//! payloads, and running stream consumers under a supervisor that keeps one
//! task's failure away from the others.
//!
//! ```text
//! bytes ──> SseSegmenter ──> SseEvent { data } ... [DONE]
//!
//! TaskSupervisor
//!     ├─ spawn(name, task)  (tokio task per stream)
//!     ├─ failures / panics logged, siblings untouched
//!     └─ join_all → SupervisorReport
//! ```

mod error;
mod sse;
mod supervisor;

pub use error::{Result, TransportError};
pub use sse::{SseEvent, SseSegmenter, DONE_MARKER};
pub use supervisor::{SupervisorReport, TaskOutcome, TaskSupervisor};
