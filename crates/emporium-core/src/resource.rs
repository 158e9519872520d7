//! The fixed resource enumeration and the value table used for sales.
//!
//! Resources form three raw -> processed -> finished chains. Only raw
//! resources carry a configured base value; processed goods are worth twice
//! their raw input and finished goods four times.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tradeable resource kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Resource {
    Wood,
    Planks,
    Furniture,
    Ore,
    Metal,
    Tools,
    Wheat,
    Flour,
    Bread,
}

/// Position of a resource along its processing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Raw,
    Processed,
    Finished,
}

impl Tier {
    /// Value multiplier relative to the chain's raw resource.
    pub fn multiplier(self) -> u32 {
        match self {
            Tier::Raw => 1,
            Tier::Processed => 2,
            Tier::Finished => 4,
        }
    }
}

impl Resource {
    /// Every resource, in declaration order.
    pub const ALL: [Resource; 9] = [
        Resource::Wood,
        Resource::Planks,
        Resource::Furniture,
        Resource::Ore,
        Resource::Metal,
        Resource::Tools,
        Resource::Wheat,
        Resource::Flour,
        Resource::Bread,
    ];

    /// The raw resources, one per chain.
    pub const RAW: [Resource; 3] = [Resource::Wood, Resource::Ore, Resource::Wheat];

    pub fn tier(self) -> Tier {
        match self {
            Resource::Wood | Resource::Ore | Resource::Wheat => Tier::Raw,
            Resource::Planks | Resource::Metal | Resource::Flour => Tier::Processed,
            Resource::Furniture | Resource::Tools | Resource::Bread => Tier::Finished,
        }
    }

    /// The raw resource at the head of this resource's chain.
    pub fn raw_source(self) -> Resource {
        match self {
            Resource::Wood | Resource::Planks | Resource::Furniture => Resource::Wood,
            Resource::Ore | Resource::Metal | Resource::Tools => Resource::Ore,
            Resource::Wheat | Resource::Flour | Resource::Bread => Resource::Wheat,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Resource::Wood => "wood",
            Resource::Planks => "planks",
            Resource::Furniture => "furniture",
            Resource::Ore => "ore",
            Resource::Metal => "metal",
            Resource::Tools => "tools",
            Resource::Wheat => "wheat",
            Resource::Flour => "flour",
            Resource::Bread => "bread",
        }
    }
}

/// Default base value of a raw resource.
pub fn default_base_value(raw: Resource) -> u32 {
    match raw.raw_source() {
        Resource::Ore => 2,
        _ => 1,
    }
}

/// Resolved per-resource value table.
///
/// Built once from configured raw base values. Missing raw entries fall back
/// to [`default_base_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceValues {
    values: BTreeMap<Resource, u32>,
}

impl ResourceValues {
    pub fn from_base_values(base: &BTreeMap<Resource, u32>) -> Self {
        let values = Resource::ALL
            .iter()
            .map(|&r| {
                let raw = r.raw_source();
                let raw_value = base
                    .get(&raw)
                    .copied()
                    .unwrap_or_else(|| default_base_value(raw));
                (r, raw_value.saturating_mul(r.tier().multiplier()))
            })
            .collect();
        Self { values }
    }

    /// Value of one unit. `None` (no resource) is worth nothing.
    pub fn value(&self, resource: Option<Resource>) -> u32 {
        resource
            .and_then(|r| self.values.get(&r).copied())
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        self.values.iter().map(|(&r, &v)| (r, v))
    }
}

impl Default for ResourceValues {
    fn default() -> Self {
        Self::from_base_values(&BTreeMap::new())
    }
}
