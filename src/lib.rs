//! Browser-driven end-to-end checks for a stay-listing site.
//!
//! The suite drives a real Chrome session against the live site and
//! validates search, filtering and listing-detail behaviors. Two primitives
//! carry all the weight: [`wait::Poller`] synchronizes with asynchronous UI
//! state, and [`extract`] recovers typed counts from free-form label text.
//! Everything else is page-object glue over the site's selector contract.

pub mod browser;
pub mod error;
pub mod extract;
pub mod models;
pub mod pages;
pub mod scenario;
pub mod wait;

pub use browser::{Session, SessionConfig};
pub use error::{CheckError, CheckResult};
