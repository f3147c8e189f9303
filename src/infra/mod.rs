//! Vendor-specific implementations of the [`crate::services`] traits.

pub mod openmeteo;
pub mod pegelonline;
pub mod windguru;

pub use openmeteo::OpenMeteoClient;
pub use pegelonline::PegelOnlineClient;
pub use windguru::WindguruClient;
