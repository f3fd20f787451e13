//! # Biosim Kernel
//!
//! Authorization and settlement core for a hierarchical simulation registry.
//!
//! Four id-keyed registries reference each other by id only. A single
//! identity authority decides every permission question, and the
//! marketplace settles purchases across registries as one atomic unit.
//!
//! ## Architecture
//!
//! ```text
//! IdentityAuthority      ← is_administrator / is_owner_of
//!     │
//! HierarchyRegistry      ← universes, ecosystems, status tags
//! AssetRegistry          ← species tokens + owner map
//! PredictionRegistry     ← AI models, predictions, approval workflow
//! Marketplace            ← listings + fungible balances
//!     │
//! Simulation             ← facade; buy_listing orchestrates settlement
//! ```
//!
//! References from species, predictions and listings into other registries
//! are advisory: they are stored as given and never existence-checked at
//! write time.

pub mod assets;
pub mod error;
pub mod hierarchy;
pub mod identity;
pub mod ids;
pub mod market;
pub mod predictions;
pub mod simulation;

pub use assets::{AssetRegistry, Species, SpeciesTrait};
pub use error::{ErrorKind, SimulationError, SimulationResult};
pub use hierarchy::{Ecosystem, EcosystemStatus, HierarchyRegistry, Universe};
pub use identity::{FixedAdministrator, IdentityAuthority};
pub use ids::{
    EcosystemId, IdCounter, ListingId, ModelId, PredictionId, Principal, SpeciesId, UniverseId,
};
pub use market::{Listing, ListingStatus, Marketplace, PlannedPurchase, TokenType};
pub use predictions::{AiModel, EcosystemPrediction, PredictionRegistry, PredictionStatus};
pub use simulation::{Registries, SettlementPolicy, Simulation};
