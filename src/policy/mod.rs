//! Replacement and admission policies.
//!
//! - [`slru`]: the two-segment store that decides *what* to evict.
//! - [`admission`]: the θ and frequency gates that decide *whether* a fetched
//!   item is cached at all.

pub mod admission;
pub mod slru;
