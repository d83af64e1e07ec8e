//! Chain assembly and the tier locator.
//!
//! Tiers live in an arena ordered from fastest to slowest; the successor of
//! tier `i` is tier `i + 1`. Because the arena is assembled once by
//! [`ChainBuilder`], a chain cannot contain a cycle.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::cascade::capability::Capability;
use crate::cascade::tier::Tier;
use crate::error::{CascadeError, Result};
use crate::metrics::CascadeMetrics;

/// An ordered, immutable cascade of tiers.
pub struct Chain<K, T> {
    pub(crate) tiers: Vec<Tier<K, T>>,
    pub(crate) metrics: CascadeMetrics,
}

impl<K, T> fmt::Debug for Chain<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("tiers", &self.tiers).finish()
    }
}

/// Collects tiers in order and validates them.
pub struct ChainBuilder<K, T> {
    tiers: Vec<Tier<K, T>>,
}

impl<K, T> Default for ChainBuilder<K, T> {
    fn default() -> Self {
        Self { tiers: Vec::new() }
    }
}

impl<K, T> ChainBuilder<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier behind the ones already added.
    pub fn tier(mut self, tier: Tier<K, T>) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn build(self) -> Result<Chain<K, T>> {
        if self.tiers.is_empty() {
            return Err(CascadeError::EmptyChain);
        }

        let mut seen = HashSet::new();
        for tier in &self.tiers {
            if !seen.insert(tier.name()) {
                return Err(CascadeError::DuplicateTier(tier.name().to_string()));
            }
        }

        let order = self
            .tiers
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(" -> ");
        info!(tiers = %order, "Tier chain assembled");

        Ok(Chain {
            tiers: self.tiers,
            metrics: CascadeMetrics::new()?,
        })
    }

    /// Build and wrap in an `Arc` for sharing across tasks.
    pub fn build_shared(self) -> Result<SharedChain<K, T>> {
        self.build().map(Arc::new)
    }
}

/// Thread-safe handle to a chain.
pub type SharedChain<K, T> = Arc<Chain<K, T>>;

impl<K, T> Chain<K, T> {
    pub fn builder() -> ChainBuilder<K, T> {
        ChainBuilder::new()
    }

    /// The first (fastest) tier.
    pub fn head(&self) -> TierRef<'_, K, T> {
        TierRef {
            chain: self,
            index: 0,
        }
    }

    /// The tier at `index`, if any.
    pub fn tier(&self, index: usize) -> Option<TierRef<'_, K, T>> {
        (index < self.tiers.len()).then_some(TierRef { chain: self, index })
    }

    pub fn tier_by_name(&self, name: &str) -> Option<TierRef<'_, K, T>> {
        self.tiers
            .iter()
            .position(|t| t.name() == name)
            .map(|index| TierRef { chain: self, index })
    }

    /// The `index`-th tier (zero-based) carrying `capability`, from the head.
    pub fn find_tier(&self, capability: Capability, index: usize) -> Option<TierRef<'_, K, T>> {
        self.head().find_tier(capability, index)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn tiers(&self) -> impl Iterator<Item = &Tier<K, T>> {
        self.tiers.iter()
    }

    pub fn metrics(&self) -> &CascadeMetrics {
        &self.metrics
    }

    pub(crate) fn last_index(&self) -> usize {
        self.tiers.len() - 1
    }
}

/// A position in a chain. Engine operations called on it start at this tier
/// and cascade toward the tail.
pub struct TierRef<'a, K, T> {
    pub(crate) chain: &'a Chain<K, T>,
    pub(crate) index: usize,
}

impl<K, T> Clone for TierRef<'_, K, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, T> Copy for TierRef<'_, K, T> {}

impl<K, T> fmt::Debug for TierRef<'_, K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierRef")
            .field("index", &self.index)
            .field("name", &self.tier().name())
            .finish()
    }
}

impl<'a, K, T> TierRef<'a, K, T> {
    pub fn tier(&self) -> &'a Tier<K, T> {
        &self.chain.tiers[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &'a str {
        self.tier().name()
    }

    pub fn next(&self) -> Option<TierRef<'a, K, T>> {
        self.chain.tier(self.index + 1)
    }

    pub fn has_next(&self) -> bool {
        self.index < self.chain.last_index()
    }

    /// Walk from this tier toward the tail and return the `index`-th
    /// (zero-based) tier whose capability set contains `capability`.
    pub fn find_tier(&self, capability: Capability, index: usize) -> Option<TierRef<'a, K, T>> {
        let mut remaining = index;
        let mut current = Some(*self);

        while let Some(tier_ref) = current {
            if tier_ref.tier().capabilities().contains(capability) {
                if remaining == 0 {
                    return Some(tier_ref);
                }
                remaining -= 1;
            }
            current = tier_ref.next();
        }
        None
    }
}
