//! AI model registrations and ecosystem predictions.

use crate::error::{SimulationError, SimulationResult};
use crate::identity::IdentityAuthority;
use crate::ids::{EcosystemId, IdCounter, ModelId, PredictionId, Principal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiModel {
    pub id: ModelId,
    pub creator: Principal,
    pub name: String,
    pub description: String,
    pub version: String,
}

/// Review state of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Validated,
    Rejected,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Pending => "pending",
            PredictionStatus::Validated => "validated",
            PredictionStatus::Rejected => "rejected",
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, PredictionStatus::Pending)
    }
}

impl std::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcosystemPrediction {
    pub id: PredictionId,
    pub model_id: ModelId,
    /// Advisory reference; not checked against the hierarchy.
    pub ecosystem_id: EcosystemId,
    /// Opaque model output, stored verbatim.
    pub prediction_data: String,
    pub timestamp: DateTime<Utc>,
    pub status: PredictionStatus,
}

#[derive(Debug, Clone, Default)]
pub struct PredictionRegistry {
    models: BTreeMap<ModelId, AiModel>,
    predictions: BTreeMap<PredictionId, EcosystemPrediction>,
    model_ids: IdCounter,
    prediction_ids: IdCounter,
}

impl PredictionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(
        models: Vec<AiModel>,
        predictions: Vec<EcosystemPrediction>,
        last_model_id: u64,
        last_prediction_id: u64,
    ) -> Self {
        let models: BTreeMap<_, _> = models.into_iter().map(|m| (m.id, m)).collect();
        let predictions: BTreeMap<_, _> = predictions.into_iter().map(|p| (p.id, p)).collect();
        let max_model = models.keys().next_back().map_or(0, |id| id.get());
        let max_prediction = predictions.keys().next_back().map_or(0, |id| id.get());
        Self {
            models,
            predictions,
            model_ids: IdCounter::resume(last_model_id.max(max_model)),
            prediction_ids: IdCounter::resume(last_prediction_id.max(max_prediction)),
        }
    }

    pub fn register_ai_model(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        creator: &Principal,
    ) -> ModelId {
        let id = ModelId(self.model_ids.assign());
        let model = AiModel {
            id,
            creator: creator.clone(),
            name: name.into(),
            description: description.into(),
            version: version.into(),
        };
        tracing::debug!(model_id = %id, version = %model.version, "ai model registered");
        self.models.insert(id, model);
        id
    }

    /// Record a pending prediction stamped with the current time.
    pub fn create_ecosystem_prediction(
        &mut self,
        model_id: ModelId,
        ecosystem_id: EcosystemId,
        prediction_data: impl Into<String>,
    ) -> SimulationResult<PredictionId> {
        self.create_ecosystem_prediction_at(model_id, ecosystem_id, prediction_data, Utc::now())
    }

    /// Record a pending prediction with an explicit creation time.
    pub fn create_ecosystem_prediction_at(
        &mut self,
        model_id: ModelId,
        ecosystem_id: EcosystemId,
        prediction_data: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> SimulationResult<PredictionId> {
        if !self.models.contains_key(&model_id) {
            return Err(SimulationError::not_found("ai model", model_id));
        }

        let id = PredictionId(self.prediction_ids.assign());
        let prediction = EcosystemPrediction {
            id,
            model_id,
            ecosystem_id,
            prediction_data: prediction_data.into(),
            timestamp,
            status: PredictionStatus::Pending,
        };
        tracing::debug!(
            prediction_id = %id,
            model_id = %model_id,
            ecosystem_id = %ecosystem_id,
            "prediction recorded"
        );
        self.predictions.insert(id, prediction);
        Ok(id)
    }

    /// Administrator decision on a prediction.
    ///
    /// The current status is not consulted: a decided prediction can be
    /// decided again.
    pub fn validate_prediction(
        &mut self,
        authority: &impl IdentityAuthority,
        prediction_id: PredictionId,
        is_valid: bool,
        validator: &Principal,
    ) -> SimulationResult<()> {
        if !authority.is_administrator(validator) {
            tracing::warn!(
                prediction_id = %prediction_id,
                validator = %validator,
                "prediction validation rejected"
            );
            return Err(SimulationError::unauthorized(validator, "validate predictions"));
        }
        let prediction = self
            .predictions
            .get_mut(&prediction_id)
            .ok_or_else(|| SimulationError::not_found("prediction", prediction_id))?;

        let status = if is_valid {
            PredictionStatus::Validated
        } else {
            PredictionStatus::Rejected
        };
        if prediction.status.is_decided() {
            tracing::debug!(
                prediction_id = %prediction_id,
                previous = %prediction.status,
                "prediction re-decided"
            );
        }
        tracing::debug!(prediction_id = %prediction_id, status = %status, "prediction decided");
        prediction.status = status;
        Ok(())
    }

    pub fn ai_model(&self, id: ModelId) -> Option<&AiModel> {
        self.models.get(&id)
    }

    pub fn prediction(&self, id: PredictionId) -> Option<&EcosystemPrediction> {
        self.predictions.get(&id)
    }

    pub fn ai_models(&self) -> impl Iterator<Item = &AiModel> {
        self.models.values()
    }

    pub fn predictions(&self) -> impl Iterator<Item = &EcosystemPrediction> {
        self.predictions.values()
    }

    /// Predictions targeting `ecosystem_id`, in id order.
    pub fn predictions_for(
        &self,
        ecosystem_id: EcosystemId,
    ) -> impl Iterator<Item = &EcosystemPrediction> {
        self.predictions
            .values()
            .filter(move |prediction| prediction.ecosystem_id == ecosystem_id)
    }

    pub fn last_model_id(&self) -> u64 {
        self.model_ids.last()
    }

    pub fn last_prediction_id(&self) -> u64 {
        self.prediction_ids.last()
    }
}
