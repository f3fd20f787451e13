use biosim_kernel::TokenType;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::str::FromStr;

#[derive(Parser)]
#[command(
    name = "biosim",
    about = "Biosim: universes, ecosystems, species tokens, AI predictions and a marketplace",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Path to biosim.toml
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Path to the state snapshot JSONL (overrides config)
    #[arg(long, global = true)]
    pub state: Option<String>,

    /// Administrator principal (overrides config)
    #[arg(long, global = true)]
    pub administrator: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create universes
    Universe {
        #[command(subcommand)]
        command: UniverseCommands,
    },

    /// Create ecosystems, update their status, run interactions
    Ecosystem {
        #[command(subcommand)]
        command: EcosystemCommands,
    },

    /// Mint, transfer and evolve species tokens
    Species {
        #[command(subcommand)]
        command: SpeciesCommands,
    },

    /// Register AI models
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    /// Record and validate ecosystem predictions
    Prediction {
        #[command(subcommand)]
        command: PredictionCommands,
    },

    /// Create, cancel and buy marketplace listings
    Listing {
        #[command(subcommand)]
        command: ListingCommands,
    },

    /// Mint fungible tokens (administrator only)
    Mint {
        /// Amount to credit
        amount: u64,

        /// Principal receiving the tokens
        recipient: String,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },

    /// Show the balance of a principal
    Balance {
        /// Principal to inspect
        principal: String,
    },

    /// Summarize the stored state and its snapshot reference
    Show,
}

#[derive(Subcommand, Clone, Debug)]
pub enum UniverseCommands {
    /// Create a universe
    Create {
        /// Universe name
        name: String,

        /// Opaque parameter payload
        #[arg(long, default_value = "{}")]
        parameters: String,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum EcosystemCommands {
    /// Create an ecosystem inside an existing universe
    Create {
        /// Parent universe id
        universe_id: u64,

        /// Ecosystem name
        name: String,

        /// Opaque parameter payload
        #[arg(long, default_value = "{}")]
        parameters: String,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },

    /// Set the status tag of an ecosystem (creator only)
    Status {
        /// Ecosystem id
        id: u64,

        /// New status tag (active, endangered, thriving, transferred, or any tag)
        status: String,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },

    /// Run an interaction between two ecosystems (administrator only)
    Interact {
        /// First ecosystem id
        first: u64,

        /// Second ecosystem id
        second: u64,

        /// Opaque interaction payload
        #[arg(long, default_value = "{}")]
        data: String,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SpeciesCommands {
    /// Mint a species token owned by the caller
    Mint {
        /// Ecosystem id (advisory)
        ecosystem_id: u64,

        /// Species name
        name: String,

        /// Trait as `name=value` (repeatable, order preserved)
        #[arg(long = "trait")]
        traits: Vec<String>,

        /// Rarity score
        #[arg(long, default_value_t = 1)]
        rarity: u32,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },

    /// Transfer a species token to another principal
    Transfer {
        /// Species id
        id: u64,

        /// Recipient principal
        recipient: String,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },

    /// Replace the traits of a species (original creator only)
    Evolve {
        /// Species id
        id: u64,

        /// Trait as `name=value` (repeatable, order preserved)
        #[arg(long = "trait")]
        traits: Vec<String>,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum ModelCommands {
    /// Register an AI model
    Register {
        /// Model name
        name: String,

        /// Model description
        #[arg(long, default_value = "")]
        description: String,

        /// Model version
        #[arg(long, default_value = "0.1.0")]
        version: String,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum PredictionCommands {
    /// Record a pending prediction from a registered model
    Create {
        /// Model id
        model_id: u64,

        /// Ecosystem id (advisory)
        ecosystem_id: u64,

        /// Opaque prediction payload
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Decide a prediction (administrator only)
    Validate {
        /// Prediction id
        id: u64,

        /// Decision
        #[arg(long, value_enum, default_value = "validated")]
        decision: DecisionArg,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },

    /// List predictions targeting one ecosystem
    List {
        /// Ecosystem id
        ecosystem_id: u64,
    },
}

#[derive(Clone, Debug, ValueEnum)]
pub enum DecisionArg {
    #[value(name = "validated")]
    Validated,
    #[value(name = "rejected")]
    Rejected,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ListingCommands {
    /// Offer a token for a fixed price
    Create {
        /// Token kind: species or ecosystem (case-insensitive)
        #[arg(value_parser = TokenType::from_str)]
        token_type: TokenType,

        /// Token id (advisory until settlement)
        token_id: u64,

        /// Price in balance units
        price: u64,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },

    /// Cancel a listing (seller only)
    Cancel {
        /// Listing id
        id: u64,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },

    /// Buy an active listing
    Buy {
        /// Listing id
        id: u64,

        /// Calling principal
        #[arg(long = "as")]
        caller: String,
    },

    /// List active listings
    Active,
}
