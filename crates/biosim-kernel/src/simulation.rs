//! The simulation facade: one identity authority over four registries.
//!
//! All public operations take the calling principal explicitly. Every
//! operation is one atomic unit of work; `&mut self` serializes them.

use crate::assets::{AssetRegistry, Species, SpeciesTrait};
use crate::error::{SimulationError, SimulationResult};
use crate::hierarchy::{Ecosystem, EcosystemStatus, HierarchyRegistry, Universe};
use crate::identity::{FixedAdministrator, IdentityAuthority};
use crate::ids::{EcosystemId, ListingId, ModelId, PredictionId, Principal, SpeciesId, UniverseId};
use crate::market::{Listing, Marketplace, TokenType};
use crate::predictions::{AiModel, EcosystemPrediction, PredictionRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How settlement treats listings whose token id resolves to nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementPolicy {
    /// Reject purchases of unknown tokens with `NotFound` instead of settling
    /// balances alone.
    pub strict_token_references: bool,
}

/// The persisted part of a simulation: the four registries.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub hierarchy: HierarchyRegistry,
    pub assets: AssetRegistry,
    pub predictions: PredictionRegistry,
    pub market: Marketplace,
}

/// Token-side effect of a purchase, resolved before anything is written.
enum TokenEffect {
    TransferSpecies(SpeciesId),
    MarkEcosystemTransferred(EcosystemId),
    None,
}

#[derive(Debug, Clone)]
pub struct Simulation<A = FixedAdministrator> {
    authority: A,
    policy: SettlementPolicy,
    state: Registries,
}

impl<A: IdentityAuthority> Simulation<A> {
    pub fn new(authority: A) -> Self {
        Self::with_state(
            authority,
            SettlementPolicy::default(),
            Registries::default(),
        )
    }

    pub fn with_state(authority: A, policy: SettlementPolicy, state: Registries) -> Self {
        Self {
            authority,
            policy,
            state,
        }
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn policy(&self) -> SettlementPolicy {
        self.policy
    }

    pub fn state(&self) -> &Registries {
        &self.state
    }

    pub fn into_state(self) -> Registries {
        self.state
    }

    // === Hierarchy ===

    pub fn create_universe(
        &mut self,
        name: impl Into<String>,
        parameters: impl Into<String>,
        creator: &Principal,
    ) -> UniverseId {
        self.state.hierarchy.create_universe(name, parameters, creator)
    }

    pub fn create_ecosystem(
        &mut self,
        universe_id: UniverseId,
        name: impl Into<String>,
        parameters: impl Into<String>,
        creator: &Principal,
    ) -> SimulationResult<EcosystemId> {
        self.state
            .hierarchy
            .create_ecosystem(universe_id, name, parameters, creator)
    }

    pub fn update_ecosystem_status(
        &mut self,
        ecosystem_id: EcosystemId,
        new_status: impl Into<EcosystemStatus>,
        updater: &Principal,
    ) -> SimulationResult<()> {
        self.state.hierarchy.update_ecosystem_status(
            &self.authority,
            ecosystem_id,
            new_status.into(),
            updater,
        )
    }

    pub fn interact_ecosystems(
        &self,
        first: EcosystemId,
        second: EcosystemId,
        interaction_data: &str,
        actor: &Principal,
    ) -> SimulationResult<()> {
        self.state.hierarchy.interact_ecosystems(
            &self.authority,
            first,
            second,
            interaction_data,
            actor,
        )
    }

    // === Assets ===

    pub fn mint_species(
        &mut self,
        ecosystem_id: EcosystemId,
        name: impl Into<String>,
        traits: Vec<SpeciesTrait>,
        rarity: u32,
        creator: &Principal,
    ) -> SpeciesId {
        self.state
            .assets
            .mint_species(ecosystem_id, name, traits, rarity, creator)
    }

    pub fn transfer_species(
        &mut self,
        species_id: SpeciesId,
        sender: &Principal,
        recipient: &Principal,
    ) -> SimulationResult<()> {
        self.state
            .assets
            .transfer_species(&self.authority, species_id, sender, recipient)
    }

    pub fn evolve_species(
        &mut self,
        species_id: SpeciesId,
        new_traits: Vec<SpeciesTrait>,
        evolver: &Principal,
    ) -> SimulationResult<()> {
        self.state
            .assets
            .evolve_species(&self.authority, species_id, new_traits, evolver)
    }

    // === Predictions ===

    pub fn register_ai_model(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        creator: &Principal,
    ) -> ModelId {
        self.state
            .predictions
            .register_ai_model(name, description, version, creator)
    }

    pub fn create_ecosystem_prediction(
        &mut self,
        model_id: ModelId,
        ecosystem_id: EcosystemId,
        prediction_data: impl Into<String>,
    ) -> SimulationResult<PredictionId> {
        self.state
            .predictions
            .create_ecosystem_prediction(model_id, ecosystem_id, prediction_data)
    }

    pub fn create_ecosystem_prediction_at(
        &mut self,
        model_id: ModelId,
        ecosystem_id: EcosystemId,
        prediction_data: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> SimulationResult<PredictionId> {
        self.state.predictions.create_ecosystem_prediction_at(
            model_id,
            ecosystem_id,
            prediction_data,
            timestamp,
        )
    }

    pub fn validate_prediction(
        &mut self,
        prediction_id: PredictionId,
        is_valid: bool,
        validator: &Principal,
    ) -> SimulationResult<()> {
        self.state
            .predictions
            .validate_prediction(&self.authority, prediction_id, is_valid, validator)
    }

    // === Marketplace ===

    pub fn create_listing(
        &mut self,
        token_type: TokenType,
        token_id: u64,
        price: u64,
        seller: &Principal,
    ) -> ListingId {
        self.state
            .market
            .create_listing(token_type, token_id, price, seller)
    }

    pub fn cancel_listing(
        &mut self,
        listing_id: ListingId,
        canceller: &Principal,
    ) -> SimulationResult<()> {
        self.state
            .market
            .cancel_listing(&self.authority, listing_id, canceller)
    }

    pub fn mint_tokens(
        &mut self,
        amount: u64,
        recipient: &Principal,
        minter: &Principal,
    ) -> SimulationResult<()> {
        self.state
            .market
            .mint_tokens(&self.authority, amount, recipient, minter)
    }

    /// Buy an active listing.
    ///
    /// Debit, credit, the token side effect and the `sold` mark land
    /// together or not at all. Checks run in order: listing exists and is
    /// active, buyer funds, token guard. The species side effect transfers
    /// from the listing's recorded seller; the ecosystem side effect writes
    /// `transferred` through the settlement-only path, without the creator
    /// check.
    pub fn buy_listing(
        &mut self,
        listing_id: ListingId,
        buyer: &Principal,
    ) -> SimulationResult<()> {
        let purchase = self.state.market.plan_purchase(listing_id, buyer)?;
        let listing = self
            .state
            .market
            .listing(listing_id)
            .ok_or_else(|| SimulationError::not_found("listing", listing_id))?;
        let effect = self.resolve_token_effect(listing)?;

        // Every guard passed and the token exists; the writes below cannot fail.
        match effect {
            TokenEffect::TransferSpecies(species_id) => {
                self.state.assets.apply_transfer(species_id, buyer);
            }
            TokenEffect::MarkEcosystemTransferred(ecosystem_id) => {
                self.state
                    .hierarchy
                    .settle_status(ecosystem_id, EcosystemStatus::Transferred)?;
            }
            TokenEffect::None => {}
        }
        self.state.market.commit_purchase(purchase);
        Ok(())
    }

    fn resolve_token_effect(&self, listing: &Listing) -> SimulationResult<TokenEffect> {
        match listing.token_type {
            TokenType::Species => {
                let species_id = SpeciesId(listing.token_id);
                if self.state.assets.contains_species(species_id) {
                    self.state
                        .assets
                        .check_transfer(&self.authority, species_id, &listing.seller)?;
                    Ok(TokenEffect::TransferSpecies(species_id))
                } else {
                    self.unresolved_token(listing, "species")
                }
            }
            TokenType::Ecosystem => {
                let ecosystem_id = EcosystemId(listing.token_id);
                if self.state.hierarchy.contains_ecosystem(ecosystem_id) {
                    Ok(TokenEffect::MarkEcosystemTransferred(ecosystem_id))
                } else {
                    self.unresolved_token(listing, "ecosystem")
                }
            }
        }
    }

    fn unresolved_token(
        &self,
        listing: &Listing,
        entity: &'static str,
    ) -> SimulationResult<TokenEffect> {
        if self.policy.strict_token_references {
            return Err(SimulationError::not_found(entity, listing.token_id));
        }
        tracing::debug!(
            listing_id = %listing.id,
            token_type = %listing.token_type,
            token_id = listing.token_id,
            "listing token unresolved; settling balances only"
        );
        Ok(TokenEffect::None)
    }

    // === Queries ===

    pub fn universe(&self, id: UniverseId) -> Option<&Universe> {
        self.state.hierarchy.universe(id)
    }

    pub fn ecosystem(&self, id: EcosystemId) -> Option<&Ecosystem> {
        self.state.hierarchy.ecosystem(id)
    }

    pub fn ecosystems_in(&self, universe_id: UniverseId) -> impl Iterator<Item = &Ecosystem> {
        self.state.hierarchy.ecosystems_in(universe_id)
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.state.assets.species(id)
    }

    pub fn owner_of(&self, id: SpeciesId) -> Option<&Principal> {
        self.state.assets.owner_of(id)
    }

    pub fn species_owned_by<'a>(
        &'a self,
        principal: &'a Principal,
    ) -> impl Iterator<Item = SpeciesId> + 'a {
        self.state.assets.species_owned_by(principal)
    }

    pub fn ai_model(&self, id: ModelId) -> Option<&AiModel> {
        self.state.predictions.ai_model(id)
    }

    pub fn prediction(&self, id: PredictionId) -> Option<&EcosystemPrediction> {
        self.state.predictions.prediction(id)
    }

    pub fn predictions_for(
        &self,
        ecosystem_id: EcosystemId,
    ) -> impl Iterator<Item = &EcosystemPrediction> {
        self.state.predictions.predictions_for(ecosystem_id)
    }

    pub fn listing(&self, id: ListingId) -> Option<&Listing> {
        self.state.market.listing(id)
    }

    pub fn active_listings(&self) -> impl Iterator<Item = &Listing> {
        self.state.market.active_listings()
    }

    pub fn balance_of(&self, principal: &Principal) -> u64 {
        self.state.market.balance_of(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::market::ListingStatus;
    use crate::predictions::PredictionStatus;
    use proptest::prelude::*;

    const ADMIN: &str = "CONTRACT_OWNER";

    fn p(name: &str) -> Principal {
        Principal::from(name)
    }

    fn sim() -> Simulation {
        Simulation::new(FixedAdministrator::new(ADMIN))
    }

    fn strict_sim() -> Simulation {
        Simulation::with_state(
            FixedAdministrator::new(ADMIN),
            SettlementPolicy {
                strict_token_references: true,
            },
            Registries::default(),
        )
    }

    fn balances(sim: &Simulation, names: &[&str]) -> Vec<u64> {
        names.iter().map(|name| sim.balance_of(&p(name))).collect()
    }

    #[test]
    fn buy_unminted_species_listing_settles_balances() {
        let mut sim = sim();
        let listing_id = sim.create_listing(TokenType::Species, 7, 100, &p("seller1"));
        assert_eq!(listing_id, ListingId(1));
        sim.mint_tokens(100, &p("buyer1"), &p(ADMIN)).expect("mint");

        sim.buy_listing(listing_id, &p("buyer1")).expect("buy");
        assert_eq!(balances(&sim, &["buyer1", "seller1"]), vec![0, 100]);
        assert_eq!(
            sim.listing(listing_id).map(|l| l.status),
            Some(ListingStatus::Sold)
        );
    }

    #[test]
    fn buy_species_listing_moves_ownership() {
        let mut sim = sim();
        let species_id = sim.mint_species(EcosystemId(1), "Fern", Vec::new(), 3, &p("seller3"));
        let listing_id =
            sim.create_listing(TokenType::Species, species_id.get(), 150, &p("seller3"));
        sim.mint_tokens(200, &p("buyer1"), &p(ADMIN))
            .expect("mint buyer");
        sim.mint_tokens(20, &p("seller3"), &p(ADMIN))
            .expect("mint seller");

        sim.buy_listing(listing_id, &p("buyer1")).expect("buy");
        assert_eq!(balances(&sim, &["buyer1", "seller3"]), vec![50, 170]);
        assert_eq!(sim.owner_of(species_id), Some(&p("buyer1")));
        assert_eq!(
            sim.listing(listing_id).map(|l| l.status),
            Some(ListingStatus::Sold)
        );
    }

    #[test]
    fn insufficient_funds_change_nothing() {
        let mut sim = sim();
        let species_id = sim.mint_species(EcosystemId(1), "Tree", Vec::new(), 9, &p("seller5"));
        let listing_id =
            sim.create_listing(TokenType::Species, species_id.get(), 400, &p("seller5"));
        sim.mint_tokens(300, &p("buyer2"), &p(ADMIN)).expect("mint");

        let err = sim
            .buy_listing(listing_id, &p("buyer2"))
            .expect_err("short of funds");
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert_eq!(balances(&sim, &["buyer2", "seller5"]), vec![300, 0]);
        assert_eq!(sim.owner_of(species_id), Some(&p("seller5")));
        assert_eq!(
            sim.listing(listing_id).map(|l| l.status),
            Some(ListingStatus::Active)
        );
    }

    #[test]
    fn stale_seller_rejects_whole_purchase() {
        let mut sim = sim();
        let species_id = sim.mint_species(EcosystemId(1), "Moth", Vec::new(), 2, &p("seller"));
        let listing_id = sim.create_listing(TokenType::Species, species_id.get(), 60, &p("seller"));
        sim.transfer_species(species_id, &p("seller"), &p("gift"))
            .expect("transfer away");
        sim.mint_tokens(100, &p("buyer"), &p(ADMIN)).expect("mint");

        let err = sim
            .buy_listing(listing_id, &p("buyer"))
            .expect_err("seller no longer owns the species");
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(balances(&sim, &["buyer", "seller"]), vec![100, 0]);
        assert_eq!(sim.owner_of(species_id), Some(&p("gift")));
        assert_eq!(
            sim.listing(listing_id).map(|l| l.status),
            Some(ListingStatus::Active)
        );
    }

    #[test]
    fn ecosystem_purchase_bypasses_creator_check() {
        let mut sim = sim();
        let universe = sim.create_universe("U", "{}", &p("founder"));
        let ecosystem = sim
            .create_ecosystem(universe, "Reef", "{}", &p("founder"))
            .expect("ecosystem");
        // The seller need not be the creator; settlement alone drives the status.
        let listing_id = sim.create_listing(TokenType::Ecosystem, ecosystem.get(), 5, &p("broker"));
        sim.mint_tokens(5, &p("buyer"), &p(ADMIN)).expect("mint");

        sim.buy_listing(listing_id, &p("buyer")).expect("buy");
        assert_eq!(
            sim.ecosystem(ecosystem).map(|e| e.status.clone()),
            Some(EcosystemStatus::Transferred)
        );

        // The public path still enforces the creator check for the buyer.
        let err = sim
            .update_ecosystem_status(ecosystem, "active", &p("buyer"))
            .expect_err("buyer is not creator");
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn sold_and_cancelled_listings_cannot_be_bought() {
        let mut sim = sim();
        let sold = sim.create_listing(TokenType::Species, 1, 0, &p("s"));
        let cancelled = sim.create_listing(TokenType::Species, 2, 0, &p("s"));
        sim.buy_listing(sold, &p("b")).expect("free listing");
        sim.cancel_listing(cancelled, &p("s")).expect("cancel");

        for id in [sold, cancelled] {
            let err = sim.buy_listing(id, &p("b")).expect_err("not active");
            assert_eq!(err.kind(), ErrorKind::InvalidState);
        }
        let err = sim
            .buy_listing(ListingId(77), &p("b"))
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn strict_policy_rejects_unknown_tokens() {
        let mut sim = strict_sim();
        let listing_id = sim.create_listing(TokenType::Ecosystem, 12, 10, &p("seller"));
        sim.mint_tokens(10, &p("buyer"), &p(ADMIN)).expect("mint");
        let err = sim
            .buy_listing(listing_id, &p("buyer"))
            .expect_err("unknown ecosystem");
        assert!(matches!(err, SimulationError::NotFound { entity: "ecosystem", id: 12 }));
        assert_eq!(sim.balance_of(&p("buyer")), 10);
    }

    #[test]
    fn prediction_workflow_scenario() {
        let mut sim = sim();
        let model = sim.register_ai_model("M", "d", "1.0", &p("c1"));
        assert_eq!(model, ModelId(1));
        let prediction = sim
            .create_ecosystem_prediction(model, EcosystemId(42), "{}")
            .expect("prediction");
        assert_eq!(prediction, PredictionId(1));
        assert_eq!(
            sim.prediction(prediction).map(|p| p.status),
            Some(PredictionStatus::Pending)
        );

        sim.validate_prediction(prediction, true, &p(ADMIN))
            .expect("administrator validates");
        assert_eq!(
            sim.prediction(prediction).map(|p| p.status),
            Some(PredictionStatus::Validated)
        );
        let err = sim
            .validate_prediction(prediction, true, &p("c1"))
            .expect_err("creator is not administrator");
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn counters_are_independent_per_registry() {
        let mut sim = sim();
        let universe = sim.create_universe("U", "{}", &p("c"));
        let species: Vec<SpeciesId> = (0..3)
            .map(|_| sim.mint_species(EcosystemId(1), "S", Vec::new(), 1, &p("c")))
            .collect();
        let ecosystem = sim
            .create_ecosystem(universe, "E", "{}", &p("c"))
            .expect("eco");
        let listing = sim.create_listing(TokenType::Species, 1, 1, &p("c"));

        assert_eq!(universe, UniverseId(1));
        assert_eq!(species, vec![SpeciesId(1), SpeciesId(2), SpeciesId(3)]);
        assert_eq!(ecosystem, EcosystemId(1));
        assert_eq!(listing, ListingId(1));
    }

    proptest! {
        #[test]
        fn creator_status_updates_stick(
            statuses in proptest::collection::vec("[a-z]{1,12}", 1..8),
        ) {
            let mut sim = sim();
            let universe = sim.create_universe("U", "{}", &p("creator"));
            let ecosystem = sim
                .create_ecosystem(universe, "E", "{}", &p("creator"))
                .expect("ecosystem");
            for status in &statuses {
                sim.update_ecosystem_status(ecosystem, status.as_str(), &p("creator"))
                    .expect("creator update");
            }
            let last = statuses.last().cloned().expect("non-empty");
            prop_assert_eq!(
                sim.ecosystem(ecosystem).map(|e| e.status.as_str().to_string()),
                Some(last)
            );
        }

        #[test]
        fn non_creator_status_update_always_fails(
            intruder in "[a-z]{1,10}",
            status in "[a-z]{1,10}",
        ) {
            prop_assume!(intruder != "creator");
            let mut sim = sim();
            let universe = sim.create_universe("U", "{}", &p("creator"));
            let ecosystem = sim
                .create_ecosystem(universe, "E", "{}", &p("creator"))
                .expect("ecosystem");
            let err = sim
                .update_ecosystem_status(ecosystem, status.as_str(), &p(&intruder))
                .expect_err("intruder");
            prop_assert_eq!(err.kind(), ErrorKind::Unauthorized);
            prop_assert_eq!(
                sim.ecosystem(ecosystem).map(|e| e.status.clone()),
                Some(EcosystemStatus::Active)
            );
        }

        #[test]
        fn mint_then_read_round_trips(first in 0u64..1_000_000, second in 0u64..1_000_000) {
            let mut sim = sim();
            sim.mint_tokens(first, &p("fresh"), &p(ADMIN)).expect("mint");
            prop_assert_eq!(sim.balance_of(&p("fresh")), first);
            sim.mint_tokens(second, &p("fresh"), &p(ADMIN)).expect("mint");
            prop_assert_eq!(sim.balance_of(&p("fresh")), first + second);
        }

        #[test]
        fn purchase_conserves_balances(
            seller_start in 0u64..10_000,
            price in 0u64..10_000,
            surplus in 0u64..10_000,
        ) {
            let mut sim = sim();
            let species = sim.mint_species(EcosystemId(1), "S", Vec::new(), 1, &p("seller"));
            let listing =
                sim.create_listing(TokenType::Species, species.get(), price, &p("seller"));
            sim.mint_tokens(seller_start, &p("seller"), &p(ADMIN)).expect("mint seller");
            sim.mint_tokens(price + surplus, &p("buyer"), &p(ADMIN)).expect("mint buyer");

            let buyer = p("buyer");
            sim.buy_listing(listing, &buyer).expect("buy");
            prop_assert_eq!(sim.balance_of(&buyer), surplus);
            prop_assert_eq!(sim.balance_of(&p("seller")), seller_start + price);
            prop_assert_eq!(sim.owner_of(species), Some(&buyer));
        }

        #[test]
        fn ids_follow_creation_order(count in 1usize..20) {
            let mut sim = sim();
            let ids: Vec<u64> = (0..count)
                .map(|_| sim.register_ai_model("M", "d", "1", &p("c")).get())
                .collect();
            let expected: Vec<u64> = (1..=count as u64).collect();
            prop_assert_eq!(ids, expected);
        }
    }
}
