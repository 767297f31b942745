//! Client for the ads platform insights API.
//!
//! [`AdsClient`] fetches one breakdown at a time with paging and retry;
//! [`collect_raw`] pulls every breakdown for a month into a
//! [`RawCollection`](adlens_core::RawCollection), tolerating failures of
//! individual endpoints.

pub mod client;
pub mod collect;
pub mod error;
pub(crate) mod retry;
pub mod types;

pub use client::AdsClient;
pub use collect::{collect_raw, InsightsSource};
pub use error::SourceError;
