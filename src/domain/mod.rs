// Domain types and value objects
pub mod candle;
pub mod interval;
pub mod retracement;

// Re-export commonly used types
pub use candle::{CandlePoint, CandleType, VolumeBar};
pub use interval::Interval;
pub use retracement::{PriceMarker, RetracementOverlay, RetracementParams};
