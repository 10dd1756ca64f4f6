//! Hedge/filler selection: the on-disk filler manifest index and the
//! five-step graceful-degradation selector that picks what plays during the
//! 400 ms hedge silence window (spec §4.7). The timer itself is driven by
//! the call supervisor; this crate only answers "which filler."

pub mod error;
pub mod index;
pub mod selector;

pub use error::{HedgeError, Result};
pub use index::FillerIndex;
pub use selector::HedgeSelector;
