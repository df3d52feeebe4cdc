//! Shared building blocks for services

/// Watchable state cell
pub mod property;

pub use property::Property;
