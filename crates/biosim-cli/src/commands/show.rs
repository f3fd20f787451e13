use crate::support::{Context, print_json, read_or_exit};
use biosim_store::snapshot_ref;
use serde_json::json;

struct Summary {
    universes: usize,
    ecosystems: usize,
    species: usize,
    models: usize,
    predictions: usize,
    listings: usize,
    active_listings: usize,
    holders: usize,
    supply: u64,
    snapshot_ref: Result<String, String>,
}

pub fn run(ctx: &Context) {
    let summary = read_or_exit(ctx, |sim| {
        let state = sim.state();
        Summary {
            universes: state.hierarchy.universes().count(),
            ecosystems: state.hierarchy.ecosystems().count(),
            species: state.assets.all_species().count(),
            models: state.predictions.ai_models().count(),
            predictions: state.predictions.predictions().count(),
            listings: state.market.listings().count(),
            active_listings: state.market.active_listings().count(),
            holders: state.market.balances().count(),
            supply: state
                .market
                .balances()
                .fold(0u64, |acc, (_, amount)| acc.saturating_add(amount)),
            snapshot_ref: snapshot_ref(state).map_err(|e| e.to_string()),
        }
    });
    let reference = summary.snapshot_ref.unwrap_or_else(|e| {
        eprintln!("error: failed to hash state: {e}");
        std::process::exit(1);
    });

    if ctx.json {
        print_json(&json!({
            "action": "show",
            "statePath": ctx.state_display(),
            "administrator": ctx.config.administrator.as_str(),
            "snapshotRef": reference,
            "counts": {
                "universes": summary.universes,
                "ecosystems": summary.ecosystems,
                "species": summary.species,
                "aiModels": summary.models,
                "predictions": summary.predictions,
                "listings": summary.listings,
                "activeListings": summary.active_listings,
                "balanceHolders": summary.holders,
            },
            "totalSupply": summary.supply,
        }));
    } else {
        println!(
            "biosim show\n  State: {}\n  Snapshot: {reference}\n  Universes: {}\n  Ecosystems: {}\n  Species: {}\n  AI models: {}\n  Predictions: {}\n  Listings: {} ({} active)\n  Balance holders: {} (supply {})",
            ctx.state_display(),
            summary.universes,
            summary.ecosystems,
            summary.species,
            summary.models,
            summary.predictions,
            summary.listings,
            summary.active_listings,
            summary.holders,
            summary.supply,
        );
    }
}
