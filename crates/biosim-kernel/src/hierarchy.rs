//! Universe and ecosystem registry.
//!
//! Universes are immutable once created. Ecosystems hang off an existing
//! universe and carry a mutable status tag that only the ecosystem's creator
//! may change through the public path.

use crate::error::{SimulationError, SimulationResult};
use crate::identity::IdentityAuthority;
use crate::ids::{EcosystemId, IdCounter, Principal, UniverseId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    pub id: UniverseId,
    pub creator: Principal,
    pub name: String,
    /// Opaque parameter payload, stored verbatim.
    pub parameters: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ecosystem {
    pub id: EcosystemId,
    pub universe_id: UniverseId,
    pub creator: Principal,
    pub name: String,
    pub parameters: String,
    pub status: EcosystemStatus,
}

/// Ecosystem status tag.
///
/// The well-known tags get their own variant; anything else round-trips as
/// [`EcosystemStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EcosystemStatus {
    Active,
    Endangered,
    Thriving,
    Transferred,
    Other(String),
}

impl EcosystemStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EcosystemStatus::Active => "active",
            EcosystemStatus::Endangered => "endangered",
            EcosystemStatus::Thriving => "thriving",
            EcosystemStatus::Transferred => "transferred",
            EcosystemStatus::Other(tag) => tag,
        }
    }
}

impl From<String> for EcosystemStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => EcosystemStatus::Active,
            "endangered" => EcosystemStatus::Endangered,
            "thriving" => EcosystemStatus::Thriving,
            "transferred" => EcosystemStatus::Transferred,
            _ => EcosystemStatus::Other(value),
        }
    }
}

impl From<&str> for EcosystemStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<EcosystemStatus> for String {
    fn from(value: EcosystemStatus) -> Self {
        match value {
            EcosystemStatus::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EcosystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned store of universes and ecosystems with one id counter each.
#[derive(Debug, Clone, Default)]
pub struct HierarchyRegistry {
    universes: BTreeMap<UniverseId, Universe>,
    ecosystems: BTreeMap<EcosystemId, Ecosystem>,
    universe_ids: IdCounter,
    ecosystem_ids: IdCounter,
}

impl HierarchyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted rows and counters.
    ///
    /// Counters never fall behind the highest stored id.
    pub fn from_records(
        universes: Vec<Universe>,
        ecosystems: Vec<Ecosystem>,
        last_universe_id: u64,
        last_ecosystem_id: u64,
    ) -> Self {
        let universes: BTreeMap<_, _> = universes.into_iter().map(|u| (u.id, u)).collect();
        let ecosystems: BTreeMap<_, _> = ecosystems.into_iter().map(|e| (e.id, e)).collect();
        let max_universe = universes.keys().next_back().map_or(0, |id| id.get());
        let max_ecosystem = ecosystems.keys().next_back().map_or(0, |id| id.get());
        Self {
            universes,
            ecosystems,
            universe_ids: IdCounter::resume(last_universe_id.max(max_universe)),
            ecosystem_ids: IdCounter::resume(last_ecosystem_id.max(max_ecosystem)),
        }
    }

    /// Create a universe. Any principal may do so.
    pub fn create_universe(
        &mut self,
        name: impl Into<String>,
        parameters: impl Into<String>,
        creator: &Principal,
    ) -> UniverseId {
        let id = UniverseId(self.universe_ids.assign());
        let universe = Universe {
            id,
            creator: creator.clone(),
            name: name.into(),
            parameters: parameters.into(),
        };
        tracing::debug!(universe_id = %id, creator = %creator, "universe created");
        self.universes.insert(id, universe);
        id
    }

    /// Attach a new `active` ecosystem to an existing universe.
    ///
    /// Any principal may attach to any universe.
    pub fn create_ecosystem(
        &mut self,
        universe_id: UniverseId,
        name: impl Into<String>,
        parameters: impl Into<String>,
        creator: &Principal,
    ) -> SimulationResult<EcosystemId> {
        if !self.universes.contains_key(&universe_id) {
            return Err(SimulationError::not_found("universe", universe_id));
        }

        let id = EcosystemId(self.ecosystem_ids.assign());
        let ecosystem = Ecosystem {
            id,
            universe_id,
            creator: creator.clone(),
            name: name.into(),
            parameters: parameters.into(),
            status: EcosystemStatus::Active,
        };
        tracing::debug!(
            ecosystem_id = %id,
            universe_id = %universe_id,
            creator = %creator,
            "ecosystem created"
        );
        self.ecosystems.insert(id, ecosystem);
        Ok(id)
    }

    /// Creator-only status change.
    pub fn update_ecosystem_status(
        &mut self,
        authority: &impl IdentityAuthority,
        ecosystem_id: EcosystemId,
        new_status: EcosystemStatus,
        updater: &Principal,
    ) -> SimulationResult<()> {
        let ecosystem = self
            .ecosystems
            .get_mut(&ecosystem_id)
            .ok_or_else(|| SimulationError::not_found("ecosystem", ecosystem_id))?;

        if !authority.is_owner_of(&ecosystem.creator, updater) {
            tracing::warn!(
                ecosystem_id = %ecosystem_id,
                updater = %updater,
                "ecosystem status update rejected"
            );
            return Err(SimulationError::unauthorized(updater, "update ecosystem status"));
        }

        tracing::debug!(
            ecosystem_id = %ecosystem_id,
            from = %ecosystem.status,
            to = %new_status,
            "ecosystem status updated"
        );
        ecosystem.status = new_status;
        Ok(())
    }

    /// Settlement-only status write.
    ///
    /// Skips the creator check: the marketplace, not the creator, drives this
    /// transition. Not reachable from outside the crate.
    pub(crate) fn settle_status(
        &mut self,
        ecosystem_id: EcosystemId,
        new_status: EcosystemStatus,
    ) -> SimulationResult<()> {
        let ecosystem = self
            .ecosystems
            .get_mut(&ecosystem_id)
            .ok_or_else(|| SimulationError::not_found("ecosystem", ecosystem_id))?;
        tracing::debug!(
            ecosystem_id = %ecosystem_id,
            from = %ecosystem.status,
            to = %new_status,
            "ecosystem status settled"
        );
        ecosystem.status = new_status;
        Ok(())
    }

    /// Administrator-gated interaction between two existing ecosystems.
    ///
    /// Validation only; no registry state changes.
    pub fn interact_ecosystems(
        &self,
        authority: &impl IdentityAuthority,
        first: EcosystemId,
        second: EcosystemId,
        interaction_data: &str,
        actor: &Principal,
    ) -> SimulationResult<()> {
        for id in [first, second] {
            if !self.ecosystems.contains_key(&id) {
                return Err(SimulationError::not_found("ecosystem", id));
            }
        }
        if !authority.is_administrator(actor) {
            tracing::warn!(actor = %actor, "ecosystem interaction rejected");
            return Err(SimulationError::unauthorized(actor, "interact ecosystems"));
        }

        tracing::debug!(
            first = %first,
            second = %second,
            payload_len = interaction_data.len(),
            "ecosystem interaction accepted"
        );
        Ok(())
    }

    pub fn universe(&self, id: UniverseId) -> Option<&Universe> {
        self.universes.get(&id)
    }

    pub fn ecosystem(&self, id: EcosystemId) -> Option<&Ecosystem> {
        self.ecosystems.get(&id)
    }

    pub fn contains_ecosystem(&self, id: EcosystemId) -> bool {
        self.ecosystems.contains_key(&id)
    }

    /// Iterate universes in id order.
    pub fn universes(&self) -> impl Iterator<Item = &Universe> {
        self.universes.values()
    }

    /// Iterate ecosystems in id order.
    pub fn ecosystems(&self) -> impl Iterator<Item = &Ecosystem> {
        self.ecosystems.values()
    }

    /// Ecosystems attached to `universe_id`, in id order.
    pub fn ecosystems_in(&self, universe_id: UniverseId) -> impl Iterator<Item = &Ecosystem> {
        self.ecosystems
            .values()
            .filter(move |ecosystem| ecosystem.universe_id == universe_id)
    }

    pub fn last_universe_id(&self) -> u64 {
        self.universe_ids.last()
    }

    pub fn last_ecosystem_id(&self) -> u64 {
        self.ecosystem_ids.last()
    }
}
