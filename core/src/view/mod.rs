//! Client-side virtualization over a remote (or in-process) record source.
//!
//! The viewer keeps only the segments it has fetched, addressed by global offset, and renders
//! whatever part of the visible window is loaded at `offset * item_height`.

mod http;
mod jump;
mod loader;
mod segments;
mod session;
mod source;
mod viewport;

use thiserror::Error;

use crate::engine::CoreError;

pub use self::http::HttpSource;
pub use self::jump::{JumpCoordinator, JumpOutcome, JumpTicket};
pub use self::loader::{Loader, PageFetch, RangeFetch};
pub use self::segments::{Segment, SegmentStore};
pub use self::session::{ViewerOptions, ViewerSession};
pub use self::source::PageSource;
pub use self::viewport::{Frame, LoadPlan, RowSlot, Viewport, ViewportGeometry};

#[derive(Debug, Error)]
pub enum ViewError {
  #[error("network error: {0}")]
  Network(String),
  #[error("server error {status}: {message}")]
  Server { status: u16, message: String },
  #[error("letter not found: {0}")]
  LetterNotFound(char),
  #[error(transparent)]
  Core(#[from] CoreError),
  #[error("invalid argument: {0}")]
  InvalidArg(String),
}
