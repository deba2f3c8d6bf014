//! tinyslru: frequency-aware SLRU cache admission for named content.
//!
//! A count-min sketch estimates request frequency, a θ-gated TinyLFU policy
//! decides which responses enter a two-segment LRU store, and a per-key
//! accountant emits periodic access reports. θ values are pushed by an
//! external controller as TLV-encoded control messages.
//!
//! The entry point is [`engine::Engine`]; [`report::ReportTimer`] drives its
//! periodic flush.

pub mod accountant;
pub mod codec;
pub mod ds;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod name;
pub mod policy;
pub mod prelude;
pub mod report;
pub mod traits;

pub use crate::name::Name;
