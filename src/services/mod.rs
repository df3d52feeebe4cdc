/// Shared service building blocks
pub mod common;
/// MPRIS player indicator engine
pub mod mpris;

pub use mpris::{IndicatorEvent, MprisIndicator, PlayerView};
