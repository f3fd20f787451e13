//! Species token registry.
//!
//! Species data and ownership live in separate maps: transfers only touch
//! the owner map, evolution only touches the data record. Evolution rights
//! stay with the original creator regardless of who owns the token.

use crate::error::{SimulationError, SimulationResult};
use crate::identity::IdentityAuthority;
use crate::ids::{EcosystemId, IdCounter, Principal, SpeciesId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `{trait, value}` pair. Order is preserved and names may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesTrait {
    #[serde(rename = "trait")]
    pub name: String,
    pub value: String,
}

impl SpeciesTrait {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    /// Advisory reference; not checked against the hierarchy.
    pub ecosystem_id: EcosystemId,
    pub name: String,
    pub traits: Vec<SpeciesTrait>,
    pub rarity: u32,
    pub creator: Principal,
}

#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    species: BTreeMap<SpeciesId, Species>,
    owners: BTreeMap<SpeciesId, Principal>,
    species_ids: IdCounter,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(
        species: Vec<Species>,
        owners: Vec<(SpeciesId, Principal)>,
        last_species_id: u64,
    ) -> Self {
        let species: BTreeMap<_, _> = species.into_iter().map(|s| (s.id, s)).collect();
        let owners: BTreeMap<_, _> = owners.into_iter().collect();
        let max_id = species.keys().next_back().map_or(0, |id| id.get());
        Self {
            species,
            owners,
            species_ids: IdCounter::resume(last_species_id.max(max_id)),
        }
    }

    /// Mint a species token owned by its creator.
    pub fn mint_species(
        &mut self,
        ecosystem_id: EcosystemId,
        name: impl Into<String>,
        traits: Vec<SpeciesTrait>,
        rarity: u32,
        creator: &Principal,
    ) -> SpeciesId {
        let id = SpeciesId(self.species_ids.assign());
        let species = Species {
            id,
            ecosystem_id,
            name: name.into(),
            traits,
            rarity,
            creator: creator.clone(),
        };
        tracing::debug!(
            species_id = %id,
            ecosystem_id = %ecosystem_id,
            creator = %creator,
            "species minted"
        );
        self.species.insert(id, species);
        self.owners.insert(id, creator.clone());
        id
    }

    /// Move ownership from `sender` to `recipient`.
    ///
    /// Unknown ids have no owner, so they fail the same way a wrong sender
    /// does.
    pub fn transfer_species(
        &mut self,
        authority: &impl IdentityAuthority,
        species_id: SpeciesId,
        sender: &Principal,
        recipient: &Principal,
    ) -> SimulationResult<()> {
        self.check_transfer(authority, species_id, sender)?;
        self.apply_transfer(species_id, recipient);
        Ok(())
    }

    /// Guard of [`AssetRegistry::transfer_species`] without the write.
    pub(crate) fn check_transfer(
        &self,
        authority: &impl IdentityAuthority,
        species_id: SpeciesId,
        sender: &Principal,
    ) -> SimulationResult<()> {
        let owned = self
            .owners
            .get(&species_id)
            .is_some_and(|owner| authority.is_owner_of(owner, sender));
        if !owned {
            tracing::warn!(
                species_id = %species_id,
                sender = %sender,
                "species transfer rejected"
            );
            return Err(SimulationError::unauthorized(sender, "transfer species"));
        }
        Ok(())
    }

    pub(crate) fn apply_transfer(&mut self, species_id: SpeciesId, recipient: &Principal) {
        tracing::debug!(species_id = %species_id, recipient = %recipient, "species transferred");
        self.owners.insert(species_id, recipient.clone());
    }

    /// Replace the trait list wholesale. Only the original creator may evolve.
    pub fn evolve_species(
        &mut self,
        authority: &impl IdentityAuthority,
        species_id: SpeciesId,
        new_traits: Vec<SpeciesTrait>,
        evolver: &Principal,
    ) -> SimulationResult<()> {
        let species = self
            .species
            .get_mut(&species_id)
            .ok_or_else(|| SimulationError::not_found("species", species_id))?;
        if !authority.is_owner_of(&species.creator, evolver) {
            tracing::warn!(
                species_id = %species_id,
                evolver = %evolver,
                "species evolution rejected"
            );
            return Err(SimulationError::unauthorized(evolver, "evolve species"));
        }

        tracing::debug!(
            species_id = %species_id,
            traits = new_traits.len(),
            "species evolved"
        );
        species.traits = new_traits;
        Ok(())
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(&id)
    }

    pub fn contains_species(&self, id: SpeciesId) -> bool {
        self.species.contains_key(&id)
    }

    pub fn owner_of(&self, id: SpeciesId) -> Option<&Principal> {
        self.owners.get(&id)
    }

    /// Iterate species in id order.
    pub fn all_species(&self) -> impl Iterator<Item = &Species> {
        self.species.values()
    }

    /// Iterate `(species, owner)` pairs in id order.
    pub fn ownership(&self) -> impl Iterator<Item = (SpeciesId, &Principal)> {
        self.owners.iter().map(|(id, owner)| (*id, owner))
    }

    /// Species ids currently owned by `principal`, in id order.
    pub fn species_owned_by<'a>(
        &'a self,
        principal: &'a Principal,
    ) -> impl Iterator<Item = SpeciesId> + 'a {
        self.owners
            .iter()
            .filter(move |(_, owner)| *owner == principal)
            .map(|(id, _)| *id)
    }

    pub fn last_species_id(&self) -> u64 {
        self.species_ids.last()
    }
}
