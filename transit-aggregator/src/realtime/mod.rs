//! Realtime overlay and the realtime queue consumer.

mod fold;
mod overlay;

pub use fold::RealtimeFold;
pub use overlay::{DEFAULT_CUTOFF_MINUTES, OverlayEngine, overlay_applies};
