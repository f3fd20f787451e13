//! Marketplace listings and the fungible balance ledger.
//!
//! Purchases are split into a read-only [`Marketplace::plan_purchase`] that
//! performs every check, and an infallible [`Marketplace::commit_purchase`]
//! that applies the planned debit, credit and status change. The settlement
//! orchestration in [`crate::simulation`] runs its cross-registry guards
//! between the two.

use crate::error::{SimulationError, SimulationResult};
use crate::identity::IdentityAuthority;
use crate::ids::{EcosystemId, IdCounter, ListingId, Principal, SpeciesId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of token a listing sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Species,
    Ecosystem,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Species => "species",
            TokenType::Ecosystem => "ecosystem",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "species" => Ok(TokenType::Species),
            "ecosystem" => Ok(TokenType::Ecosystem),
            other => Err(format!(
                "unknown token type '{other}', expected 'species' or 'ecosystem'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Cancelled,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Cancelled => "cancelled",
            ListingStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub seller: Principal,
    pub token_type: TokenType,
    /// Advisory reference into the asset or hierarchy registry.
    pub token_id: u64,
    pub price: u64,
    pub status: ListingStatus,
}

impl Listing {
    pub fn species_id(&self) -> Option<SpeciesId> {
        (self.token_type == TokenType::Species).then_some(SpeciesId(self.token_id))
    }

    pub fn ecosystem_id(&self) -> Option<EcosystemId> {
        (self.token_type == TokenType::Ecosystem).then_some(EcosystemId(self.token_id))
    }

    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }
}

/// A fully checked purchase, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPurchase {
    pub listing_id: ListingId,
    pub buyer: Principal,
    pub seller: Principal,
    pub price: u64,
    buyer_after: u64,
    seller_after: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Marketplace {
    listings: BTreeMap<ListingId, Listing>,
    balances: BTreeMap<Principal, u64>,
    listing_ids: IdCounter,
}

impl Marketplace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(
        listings: Vec<Listing>,
        balances: Vec<(Principal, u64)>,
        last_listing_id: u64,
    ) -> Self {
        let listings: BTreeMap<_, _> = listings.into_iter().map(|l| (l.id, l)).collect();
        let max_id = listings.keys().next_back().map_or(0, |id| id.get());
        Self {
            listings,
            balances: balances.into_iter().collect(),
            listing_ids: IdCounter::resume(last_listing_id.max(max_id)),
        }
    }

    /// Open an `active` listing.
    ///
    /// Ownership of the token is not checked here; settlement guards it.
    pub fn create_listing(
        &mut self,
        token_type: TokenType,
        token_id: u64,
        price: u64,
        seller: &Principal,
    ) -> ListingId {
        let id = ListingId(self.listing_ids.assign());
        let listing = Listing {
            id,
            seller: seller.clone(),
            token_type,
            token_id,
            price,
            status: ListingStatus::Active,
        };
        tracing::debug!(
            listing_id = %id,
            token_type = %token_type,
            token_id,
            price,
            seller = %seller,
            "listing created"
        );
        self.listings.insert(id, listing);
        id
    }

    /// Seller-only cancellation.
    ///
    /// Cancelling a cancelled listing is a no-op; a sold listing stays sold.
    pub fn cancel_listing(
        &mut self,
        authority: &impl IdentityAuthority,
        listing_id: ListingId,
        canceller: &Principal,
    ) -> SimulationResult<()> {
        let listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or_else(|| SimulationError::not_found("listing", listing_id))?;
        if !authority.is_owner_of(&listing.seller, canceller) {
            tracing::warn!(
                listing_id = %listing_id,
                canceller = %canceller,
                "cancellation rejected"
            );
            return Err(SimulationError::unauthorized(canceller, "cancel listing"));
        }
        if listing.status == ListingStatus::Sold {
            return Err(SimulationError::InvalidState(format!(
                "listing {listing_id} is already sold"
            )));
        }

        tracing::debug!(listing_id = %listing_id, "listing cancelled");
        listing.status = ListingStatus::Cancelled;
        Ok(())
    }

    /// Administrator-only credit. There is no supply cap.
    pub fn mint_tokens(
        &mut self,
        authority: &impl IdentityAuthority,
        amount: u64,
        recipient: &Principal,
        minter: &Principal,
    ) -> SimulationResult<()> {
        if !authority.is_administrator(minter) {
            tracing::warn!(minter = %minter, "mint rejected");
            return Err(SimulationError::unauthorized(minter, "mint tokens"));
        }
        let updated = self
            .balance_of(recipient)
            .checked_add(amount)
            .ok_or_else(|| {
                SimulationError::InvalidState(format!("balance of {recipient} would overflow"))
            })?;

        tracing::debug!(recipient = %recipient, amount, balance = updated, "tokens minted");
        self.balances.insert(recipient.clone(), updated);
        Ok(())
    }

    /// Check a purchase against the current state without changing it.
    pub fn plan_purchase(
        &self,
        listing_id: ListingId,
        buyer: &Principal,
    ) -> SimulationResult<PlannedPurchase> {
        let listing = self
            .listings
            .get(&listing_id)
            .ok_or_else(|| SimulationError::not_found("listing", listing_id))?;
        if !listing.is_active() {
            return Err(SimulationError::InvalidState(format!(
                "listing {listing_id} is {}",
                listing.status
            )));
        }

        let available = self.balance_of(buyer);
        let buyer_after = available.checked_sub(listing.price).ok_or_else(|| {
            SimulationError::InsufficientBalance {
                principal: buyer.clone(),
                required: listing.price,
                available,
            }
        })?;

        let seller_before = if listing.seller == *buyer {
            buyer_after
        } else {
            self.balance_of(&listing.seller)
        };
        let seller_after = seller_before.checked_add(listing.price).ok_or_else(|| {
            SimulationError::InvalidState(format!("balance of {} would overflow", listing.seller))
        })?;

        Ok(PlannedPurchase {
            listing_id,
            buyer: buyer.clone(),
            seller: listing.seller.clone(),
            price: listing.price,
            buyer_after,
            seller_after,
        })
    }

    /// Apply a purchase produced by [`Marketplace::plan_purchase`].
    ///
    /// Must run against the same state the plan was made from.
    pub(crate) fn commit_purchase(&mut self, purchase: PlannedPurchase) {
        self.balances
            .insert(purchase.buyer.clone(), purchase.buyer_after);
        self.balances
            .insert(purchase.seller.clone(), purchase.seller_after);
        if let Some(listing) = self.listings.get_mut(&purchase.listing_id) {
            listing.status = ListingStatus::Sold;
        }
        tracing::debug!(
            listing_id = %purchase.listing_id,
            buyer = %purchase.buyer,
            seller = %purchase.seller,
            price = purchase.price,
            "listing sold"
        );
    }

    pub fn listing(&self, id: ListingId) -> Option<&Listing> {
        self.listings.get(&id)
    }

    pub fn listings(&self) -> impl Iterator<Item = &Listing> {
        self.listings.values()
    }

    /// Listings still open for purchase, in id order.
    pub fn active_listings(&self) -> impl Iterator<Item = &Listing> {
        self.listings.values().filter(|listing| listing.is_active())
    }

    /// Balance of `principal`; unseen principals hold 0.
    pub fn balance_of(&self, principal: &Principal) -> u64 {
        self.balances.get(principal).copied().unwrap_or(0)
    }

    /// Iterate `(principal, balance)` in principal order.
    pub fn balances(&self) -> impl Iterator<Item = (&Principal, u64)> {
        self.balances
            .iter()
            .map(|(principal, amount)| (principal, *amount))
    }

    pub fn last_listing_id(&self) -> u64 {
        self.listing_ids.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FixedAdministrator;

    const ADMIN: &str = "CONTRACT_OWNER";

    fn admin() -> FixedAdministrator {
        FixedAdministrator::new(ADMIN)
    }

    fn p(name: &str) -> Principal {
        Principal::from(name)
    }

    #[test]
    fn create_listing_is_active() {
        let mut market = Marketplace::new();
        let id = market.create_listing(TokenType::Species, 1, 100, &p("seller1"));
        assert_eq!(id, ListingId(1));
        let listing = market.listing(id).expect("listing exists");
        assert_eq!(listing.token_type, TokenType::Species);
        assert_eq!(listing.price, 100);
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.species_id(), Some(SpeciesId(1)));
        assert_eq!(listing.ecosystem_id(), None);
    }

    #[test]
    fn seller_cancels_listing() {
        let mut market = Marketplace::new();
        let id = market.create_listing(TokenType::Ecosystem, 2, 200, &p("seller2"));
        market
            .cancel_listing(&admin(), id, &p("seller2"))
            .expect("seller may cancel");
        assert_eq!(
            market.listing(id).map(|l| l.status),
            Some(ListingStatus::Cancelled)
        );

        market
            .cancel_listing(&admin(), id, &p("seller2"))
            .expect("repeat cancel is a no-op");
        assert_eq!(market.active_listings().count(), 0);
    }

    #[test]
    fn cancel_by_other_principal_is_unauthorized() {
        let mut market = Marketplace::new();
        let id = market.create_listing(TokenType::Ecosystem, 4, 300, &p("seller4"));
        let err = market
            .cancel_listing(&admin(), id, &p("unauthorized_user"))
            .expect_err("not the seller");
        assert!(matches!(err, SimulationError::Unauthorized { .. }));
        assert_eq!(
            market.listing(id).map(|l| l.status),
            Some(ListingStatus::Active)
        );

        let err = market
            .cancel_listing(&admin(), ListingId(9), &p("seller4"))
            .expect_err("unknown listing");
        assert!(matches!(err, SimulationError::NotFound { entity: "listing", id: 9 }));
    }

    #[test]
    fn sold_listing_cannot_be_cancelled() {
        let mut market = Marketplace::new();
        let id = market.create_listing(TokenType::Species, 3, 10, &p("seller"));
        market
            .mint_tokens(&admin(), 10, &p("buyer"), &p(ADMIN))
            .expect("mint");
        let purchase = market.plan_purchase(id, &p("buyer")).expect("plan");
        market.commit_purchase(purchase);

        let err = market
            .cancel_listing(&admin(), id, &p("seller"))
            .expect_err("sold is terminal");
        assert_eq!(err.kind(), crate::ErrorKind::InvalidState);
        assert_eq!(
            market.listing(id).map(|l| l.status),
            Some(ListingStatus::Sold)
        );
    }

    #[test]
    fn mint_accumulates_and_is_admin_only() {
        let mut market = Marketplace::new();
        market
            .mint_tokens(&admin(), 500, &p("user1"), &p(ADMIN))
            .expect("mint");
        assert_eq!(market.balance_of(&p("user1")), 500);
        market
            .mint_tokens(&admin(), 25, &p("user1"), &p(ADMIN))
            .expect("mint again");
        assert_eq!(market.balance_of(&p("user1")), 525);

        let err = market
            .mint_tokens(&admin(), 1000, &p("user2"), &p("unauthorized_user"))
            .expect_err("not administrator");
        assert!(matches!(err, SimulationError::Unauthorized { .. }));
        assert_eq!(market.balance_of(&p("user2")), 0);
    }

    #[test]
    fn mint_overflow_is_rejected_without_change() {
        let mut market = Marketplace::new();
        market
            .mint_tokens(&admin(), u64::MAX, &p("whale"), &p(ADMIN))
            .expect("mint max");
        let err = market
            .mint_tokens(&admin(), 1, &p("whale"), &p(ADMIN))
            .expect_err("overflow");
        assert_eq!(err.kind(), crate::ErrorKind::InvalidState);
        assert_eq!(market.balance_of(&p("whale")), u64::MAX);
    }

    #[test]
    fn plan_purchase_reports_insufficient_balance() {
        let mut market = Marketplace::new();
        let id = market.create_listing(TokenType::Species, 5, 400, &p("seller5"));
        market
            .mint_tokens(&admin(), 300, &p("buyer2"), &p(ADMIN))
            .expect("mint");
        let err = market.plan_purchase(id, &p("buyer2")).expect_err("short");
        assert_eq!(
            err,
            SimulationError::InsufficientBalance {
                principal: p("buyer2"),
                required: 400,
                available: 300,
            }
        );
    }

    #[test]
    fn plan_purchase_rejects_inactive_listing() {
        let mut market = Marketplace::new();
        let id = market.create_listing(TokenType::Species, 5, 0, &p("seller"));
        market
            .cancel_listing(&admin(), id, &p("seller"))
            .expect("cancel");
        let err = market
            .plan_purchase(id, &p("buyer"))
            .expect_err("cancelled");
        assert_eq!(err.kind(), crate::ErrorKind::InvalidState);
    }

    #[test]
    fn self_purchase_nets_to_zero() {
        let mut market = Marketplace::new();
        let id = market.create_listing(TokenType::Species, 1, 40, &p("trader"));
        market
            .mint_tokens(&admin(), 50, &p("trader"), &p(ADMIN))
            .expect("mint");
        let purchase = market.plan_purchase(id, &p("trader")).expect("plan");
        market.commit_purchase(purchase);
        assert_eq!(market.balance_of(&p("trader")), 50);
    }

    #[test]
    fn token_type_parses_case_insensitively() {
        assert_eq!("Species".parse::<TokenType>(), Ok(TokenType::Species));
        assert_eq!("ecosystem".parse::<TokenType>(), Ok(TokenType::Ecosystem));
        assert!("universe".parse::<TokenType>().is_err());
    }
}
