//! Composite-event assembly for DPS event production.
//!
//! Two independently produced events (a primary and a secondary) are merged
//! into one record with disjoint identifiers and a product weight, then
//! written in either record schema.
//!
//! # Modules
//!
//! - [`merge`] -- [`merge`](merge::merge), identifier remapping and edge resolution
//! - [`convert`] -- Schema conversion and the [`Converting`] writer adapter
//! - [`scan`] -- [`skip_until_non_empty`] over unusable records
//! - [`pairing`] -- [`run_mixing`] and its [`PairingPolicy`]s

pub mod convert;
pub mod merge;
pub mod pairing;
pub mod scan;

pub use convert::{Converting, convert, to_minimal, to_rich};
pub use merge::{CompositeEvent, MergeError, merge};
pub use pairing::{MixEnd, MixError, MixFailure, MixOptions, MixReport, PairingPolicy, log_mixing_end, run_mixing};
pub use scan::{Scan, skip_until_non_empty};
