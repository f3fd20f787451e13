use crate::cli::SpeciesCommands;
use crate::support::{Context, mutate_or_exit, parse_traits_or_exit, principal, print_json};
use biosim_kernel::{EcosystemId, SpeciesId, SpeciesTrait};
use serde_json::{Value, json};

pub fn run(command: SpeciesCommands, ctx: &Context) {
    match command {
        SpeciesCommands::Mint {
            ecosystem_id,
            name,
            traits,
            rarity,
            caller,
        } => run_mint(EcosystemId(ecosystem_id), name, traits, rarity, caller, ctx),
        SpeciesCommands::Transfer {
            id,
            recipient,
            caller,
        } => run_transfer(SpeciesId(id), recipient, caller, ctx),
        SpeciesCommands::Evolve { id, traits, caller } => {
            run_evolve(SpeciesId(id), traits, caller, ctx)
        }
    }
}

fn traits_json(traits: &[SpeciesTrait]) -> Value {
    Value::Array(
        traits
            .iter()
            .map(|t| json!({ "trait": t.name, "value": t.value }))
            .collect(),
    )
}

fn run_mint(
    ecosystem_id: EcosystemId,
    name: String,
    raw_traits: Vec<String>,
    rarity: u32,
    caller: String,
    ctx: &Context,
) {
    let traits = parse_traits_or_exit(&raw_traits);
    let creator = principal(&caller);
    let minted = traits.clone();
    let id = mutate_or_exit(ctx, |sim| {
        Ok(sim.mint_species(ecosystem_id, name.clone(), minted, rarity, &creator))
    });

    if ctx.json {
        print_json(&json!({
            "action": "species.mint",
            "statePath": ctx.state_display(),
            "species": {
                "id": id.get(),
                "ecosystemId": ecosystem_id.get(),
                "name": name,
                "traits": traits_json(&traits),
                "rarity": rarity,
                "creator": creator.as_str(),
                "owner": creator.as_str(),
            }
        }));
    } else {
        println!(
            "biosim species mint\n  Minted: species {id} \"{name}\" ({} traits, rarity {rarity})\n  Owner: {creator}",
            traits.len()
        );
    }
}

fn run_transfer(id: SpeciesId, recipient: String, caller: String, ctx: &Context) {
    let sender = principal(&caller);
    let recipient = principal(&recipient);
    mutate_or_exit(ctx, |sim| sim.transfer_species(id, &sender, &recipient));

    if ctx.json {
        print_json(&json!({
            "action": "species.transfer",
            "statePath": ctx.state_display(),
            "speciesId": id.get(),
            "from": sender.as_str(),
            "to": recipient.as_str(),
        }));
    } else {
        println!("biosim species transfer\n  Species {id}: {sender} -> {recipient}");
    }
}

fn run_evolve(id: SpeciesId, raw_traits: Vec<String>, caller: String, ctx: &Context) {
    let traits = parse_traits_or_exit(&raw_traits);
    let evolver = principal(&caller);
    let evolved = traits.clone();
    mutate_or_exit(ctx, |sim| sim.evolve_species(id, evolved, &evolver));

    if ctx.json {
        print_json(&json!({
            "action": "species.evolve",
            "statePath": ctx.state_display(),
            "speciesId": id.get(),
            "traits": traits_json(&traits),
        }));
    } else {
        println!(
            "biosim species evolve\n  Species {id}: {} traits",
            traits.len()
        );
    }
}
