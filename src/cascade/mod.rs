//! The cascade: tiers, the chain that links them, and the dispatch engine.
//!
//! - [`backend`]: the `Backend` trait each store implements
//! - [`capability`]: capability tags for locating and skipping tiers
//! - [`expiration`]: per-tier expiration calculator
//! - [`keys`]: logical → physical key adaptation
//! - [`tier`]: one tier of the chain
//! - [`chain`]: chain assembly and the tier locator
//! - [`options`]: per-call skip and downstream options
//! - [`engine`]: get / set / delete / refresh across the chain

pub mod backend;
pub mod capability;
pub mod chain;
pub mod engine;
pub mod expiration;
pub mod keys;
pub mod options;
pub mod tier;

pub use backend::Backend;
pub use capability::{Capability, CapabilitySet};
pub use chain::{Chain, ChainBuilder, SharedChain, TierRef};
pub use expiration::{ExpirationMode, ExpirationPolicy, Expiry};
pub use keys::{CacheItem, ItemKeys, KeyAdapter};
pub use options::{CallOptions, TierSelector};
pub use tier::Tier;
