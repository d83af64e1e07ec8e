//! Capability tags used to locate tiers and to target skip requests.
//!
//! A tier's capability set is declared statically: the backend reports the
//! capabilities it provides, and the tier may add more at construction.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// A declared trait of a tier.
///
/// Serialized as its display name. Only the built-in tags can be read back;
/// `Named` tags exist in code only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Lives in this process (fastest, lost on restart).
    InProcess,
    /// Shared cache reachable over the network.
    Distributed,
    /// Durable source of truth.
    Durable,
    /// Ad-hoc tier driven by caller-supplied callbacks.
    Callback,
    /// Application-defined tag.
    Named(&'static str),
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::InProcess => write!(f, "in_process"),
            Capability::Distributed => write!(f, "distributed"),
            Capability::Durable => write!(f, "durable"),
            Capability::Callback => write!(f, "callback"),
            Capability::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Returned when a string does not name one of the built-in capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCapability(pub String);

impl fmt::Display for UnknownCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown capability `{}`", self.0)
    }
}

impl std::error::Error for UnknownCapability {}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_process" | "memory" => Ok(Capability::InProcess),
            "distributed" => Ok(Capability::Distributed),
            "durable" => Ok(Capability::Durable),
            "callback" => Ok(Capability::Callback),
            other => Err(UnknownCapability(other.to_string())),
        }
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}

/// The set of capabilities a tier carries. Small, so a vector is enough.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(Vec<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability (no-op if already present).
    pub fn insert(&mut self, capability: Capability) {
        if !self.0.contains(&capability) {
            self.0.push(capability);
        }
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Merge another set into this one.
    pub fn extend(&mut self, other: &CapabilitySet) {
        for capability in &other.0 {
            self.insert(*capability);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Capability> for CapabilitySet {
    fn from(capability: Capability) -> Self {
        Self(vec![capability])
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::new();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}
