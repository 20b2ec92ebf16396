//! # Protocol Upgrade Gate
//!
//! Height-indexed activation table for consensus rule changes. Activation is
//! one-way and inclusive: the activation height itself already runs under
//! the new rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Height at which the halving reward schedule takes effect.
pub const HALVING_ACTIVATION_HEIGHT: u32 = 472_178;

/// Named consensus rule changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Upgrade {
    /// Halving block-reward schedule.
    Halving,
}

impl Upgrade {
    pub const ALL: [Upgrade; 1] = [Upgrade::Halving];

    /// Canonical name used by operators and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Upgrade::Halving => "upgrade-01",
        }
    }
}

impl fmt::Display for Upgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a name matches no known upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownUpgrade(pub String);

impl FromStr for Upgrade {
    type Err = UnknownUpgrade;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Upgrade::ALL
            .into_iter()
            .find(|u| u.name() == s)
            .ok_or_else(|| UnknownUpgrade(s.to_string()))
    }
}

/// Activation table. Pure lookups, no failure modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeGate {
    activations: Vec<(Upgrade, u32)>,
}

impl Default for UpgradeGate {
    fn default() -> Self {
        Self::standard()
    }
}

impl UpgradeGate {
    /// The table shipped with this release (identical on both networks).
    pub fn standard() -> Self {
        Self {
            activations: vec![(Upgrade::Halving, HALVING_ACTIVATION_HEIGHT)],
        }
    }

    /// Build a gate from an explicit table. A later entry for the same
    /// upgrade replaces an earlier one.
    pub fn from_table(table: impl IntoIterator<Item = (Upgrade, u32)>) -> Self {
        let mut gate = Self {
            activations: Vec::new(),
        };
        for (upgrade, height) in table {
            gate = gate.with_activation(upgrade, height);
        }
        gate
    }

    pub fn with_activation(mut self, upgrade: Upgrade, height: u32) -> Self {
        match self.activations.iter_mut().find(|(u, _)| *u == upgrade) {
            Some(entry) => entry.1 = height,
            None => self.activations.push((upgrade, height)),
        }
        self
    }

    pub fn activation_height(&self, upgrade: Upgrade) -> Option<u32> {
        self.activations
            .iter()
            .find(|(u, _)| *u == upgrade)
            .map(|(_, h)| *h)
    }

    /// True iff `height >= activation`. An upgrade missing from the table is
    /// never active.
    pub fn is_active(&self, upgrade: Upgrade, height: u32) -> bool {
        self.activation_height(upgrade)
            .is_some_and(|activation| height >= activation)
    }

    /// Lookup by canonical name; unknown names are inactive.
    pub fn is_active_by_name(&self, name: &str, height: u32) -> bool {
        name.parse::<Upgrade>()
            .map(|upgrade| self.is_active(upgrade, height))
            .unwrap_or(false)
    }

    pub fn active_upgrades(&self, height: u32) -> Vec<Upgrade> {
        self.activations
            .iter()
            .filter(|(_, activation)| height >= *activation)
            .map(|(u, _)| *u)
            .collect()
    }

    pub fn entries(&self) -> &[(Upgrade, u32)] {
        &self.activations
    }
}
