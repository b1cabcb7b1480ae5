mod alphabet;
mod engine;
mod line_store;
mod models;
pub mod view;

pub use crate::alphabet::AlphabetIndex;
pub use crate::engine::{CoreEngine, CoreError, CoreOptions};
pub use crate::line_store::LineStore;
pub use crate::models::{
  AlphabetIndexMap, CountResult, ErrorBody, LetterPage, Record, RecordPage, ScanStats,
};
