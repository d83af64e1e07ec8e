//! tier-cascade: one read/write interface over a chain of storage tiers.
//!
//! A chain is ordered fastest to slowest, e.g.
//!   in-process cache → distributed cache → durable store
//!
//! Reads fall through on a miss and back-fill the tiers they passed; writes
//! and deletes stay local unless asked to continue downstream. Each tier has
//! its own expiration policy and key mapping.
//!
//! ```ignore
//! let chain = Chain::builder()
//!     .tier(Tier::new("local", InMemoryBackend::new()).with_ttl(Duration::from_secs(60)))
//!     .tier(Tier::new("durable", DiskBackend::new("/var/lib/app").await?))
//!     .build()?;
//!
//! let user = chain.head().get(&"42".to_string(), &CallOptions::new()).await?;
//! ```

pub mod backends;
pub mod cascade;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;

pub use cascade::{
    Backend, CacheItem, CallOptions, Capability, CapabilitySet, Chain, ChainBuilder,
    ExpirationMode, ExpirationPolicy, Expiry, SharedChain, Tier, TierRef, TierSelector,
};
pub use error::{CascadeError, Result};
