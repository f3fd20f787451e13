//! Snapshot record types: one JSON object per line.

use biosim_kernel::{
    AiModel, Ecosystem, EcosystemPrediction, Listing, Principal, Species, SpeciesId, Universe,
};
use serde::{Deserialize, Serialize};

pub const STATE_SNAPSHOT_SCHEMA: &str = "biosim.state.v1";

fn default_schema() -> String {
    STATE_SNAPSHOT_SCHEMA.to_string()
}

/// Last assigned id of every registry counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub universe: u64,
    #[serde(default)]
    pub ecosystem: u64,
    #[serde(default)]
    pub species: u64,
    #[serde(default)]
    pub ai_model: u64,
    #[serde(default)]
    pub prediction: u64,
    #[serde(default)]
    pub listing: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRow {
    pub species_id: SpeciesId,
    pub owner: Principal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub principal: Principal,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateRecord {
    Counters(Counters),
    Universe(Universe),
    Ecosystem(Ecosystem),
    Species(Species),
    Ownership(OwnershipRow),
    AiModel(AiModel),
    Prediction(EcosystemPrediction),
    Listing(Listing),
    Balance(BalanceRow),
}

impl StateRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            StateRecord::Counters(_) => "counters",
            StateRecord::Universe(_) => "universe",
            StateRecord::Ecosystem(_) => "ecosystem",
            StateRecord::Species(_) => "species",
            StateRecord::Ownership(_) => "ownership",
            StateRecord::AiModel(_) => "ai_model",
            StateRecord::Prediction(_) => "prediction",
            StateRecord::Listing(_) => "listing",
            StateRecord::Balance(_) => "balance",
        }
    }
}
