//! Duplicate call suppression.
//!
//! A [`SingleFlight`] makes sure that, for a given key, only one caller runs
//! the expensive operation while every concurrent caller for the same key
//! receives its outcome. Nothing is cached: once the flight lands the key is
//! forgotten and the next call runs the operation again.
//!
//! [`AsyncSingleFlight`] does the same for futures.
//!
//! ```
//! use std::convert::Infallible;
//!
//! use singleflight_sync::SingleFlight;
//!
//! let group = SingleFlight::new();
//! let value = group.work("key", || Ok::<_, Infallible>("my-result"));
//! assert_eq!(value, Ok("my-result"));
//!
//! let failed = group.work("key", || Err("boom"));
//! assert_eq!(failed.unwrap_err().detail(), "boom");
//! ```

mod blocking;
mod error;
mod failure;
mod nonblocking;

pub use blocking::SingleFlight;
pub use error::Error;
pub use failure::NON_DESCRIPTIVE_FAILURE;
pub use nonblocking::AsyncSingleFlight;
