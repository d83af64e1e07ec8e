//! Per-call options.
//!
//! Skip requests and the downstream flag travel with the call instead of
//! living on the tiers, so concurrent calls against the same chain never see
//! each other's skips.

use crate::cascade::capability::Capability;
use crate::cascade::tier::Tier;

/// Selects tiers for a skip request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierSelector {
    /// Every tier whose capability set contains the tag.
    Capability(Capability),
    /// The tier at this chain position.
    Index(usize),
    /// The tier with this name.
    Name(String),
}

impl TierSelector {
    pub fn matches<K, T>(&self, index: usize, tier: &Tier<K, T>) -> bool {
        match self {
            TierSelector::Capability(capability) => tier.capabilities().contains(*capability),
            TierSelector::Index(i) => *i == index,
            TierSelector::Name(name) => tier.name() == name,
        }
    }
}

impl From<Capability> for TierSelector {
    fn from(capability: Capability) -> Self {
        TierSelector::Capability(capability)
    }
}

impl From<usize> for TierSelector {
    fn from(index: usize) -> Self {
        TierSelector::Index(index)
    }
}

impl From<&str> for TierSelector {
    /// Built-in capability names select by capability, anything else by tier name.
    fn from(s: &str) -> Self {
        match s.parse::<Capability>() {
            Ok(capability) => TierSelector::Capability(capability),
            Err(_) => TierSelector::Name(s.to_string()),
        }
    }
}

/// Options for one engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    skip_read: Vec<TierSelector>,
    skip_write: Vec<TierSelector>,
    downstream: Option<bool>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bypass the backend read on every selected tier for this call.
    pub fn skip_read(mut self, selector: impl Into<TierSelector>) -> Self {
        self.skip_read.push(selector.into());
        self
    }

    /// Bypass the backend write (including back-fill) on every selected tier.
    pub fn skip_write(mut self, selector: impl Into<TierSelector>) -> Self {
        self.skip_write.push(selector.into());
        self
    }

    /// Override the operation's downstream default: back-fill for reads,
    /// fan-out for writes and deletes.
    pub fn downstream(mut self, enabled: bool) -> Self {
        self.downstream = Some(enabled);
        self
    }

    pub fn downstream_or(&self, default: bool) -> bool {
        self.downstream.unwrap_or(default)
    }

    pub fn skips_read<K, T>(&self, index: usize, tier: &Tier<K, T>) -> bool {
        self.skip_read.iter().any(|s| s.matches(index, tier))
    }

    pub fn skips_write<K, T>(&self, index: usize, tier: &Tier<K, T>) -> bool {
        self.skip_write.iter().any(|s| s.matches(index, tier))
    }
}
