use crate::cli::EcosystemCommands;
use crate::support::{Context, mutate_or_exit, mutate_reporting_or_exit, principal, print_json};
use biosim_kernel::{EcosystemId, EcosystemStatus, UniverseId};
use serde_json::json;

pub fn run(command: EcosystemCommands, ctx: &Context) {
    match command {
        EcosystemCommands::Create {
            universe_id,
            name,
            parameters,
            caller,
        } => run_create(UniverseId(universe_id), name, parameters, caller, ctx),
        EcosystemCommands::Status { id, status, caller } => {
            run_status(EcosystemId(id), status, caller, ctx)
        }
        EcosystemCommands::Interact {
            first,
            second,
            data,
            caller,
        } => run_interact(EcosystemId(first), EcosystemId(second), data, caller, ctx),
    }
}

fn run_create(
    universe_id: UniverseId,
    name: String,
    parameters: String,
    caller: String,
    ctx: &Context,
) {
    let creator = principal(&caller);
    let id = mutate_or_exit(ctx, |sim| {
        sim.create_ecosystem(universe_id, name.clone(), parameters.clone(), &creator)
    });

    if ctx.json {
        print_json(&json!({
            "action": "ecosystem.create",
            "statePath": ctx.state_display(),
            "ecosystem": {
                "id": id.get(),
                "universeId": universe_id.get(),
                "name": name,
                "parameters": parameters,
                "creator": creator.as_str(),
                "status": EcosystemStatus::Active.as_str(),
            }
        }));
    } else {
        println!(
            "biosim ecosystem create\n  Created: ecosystem {id} \"{name}\" in universe {universe_id}\n  Status: {}",
            EcosystemStatus::Active
        );
    }
}

fn run_status(id: EcosystemId, status: String, caller: String, ctx: &Context) {
    let updater = principal(&caller);
    let new_status = EcosystemStatus::from(status.as_str());
    let applied = new_status.clone();
    mutate_or_exit(ctx, |sim| {
        sim.update_ecosystem_status(id, applied, &updater)
    });

    if ctx.json {
        print_json(&json!({
            "action": "ecosystem.status",
            "statePath": ctx.state_display(),
            "ecosystemId": id.get(),
            "status": new_status.as_str(),
        }));
    } else {
        println!("biosim ecosystem status\n  Ecosystem {id}: {new_status}");
    }
}

fn run_interact(
    first: EcosystemId,
    second: EcosystemId,
    data: String,
    caller: String,
    ctx: &Context,
) {
    let actor = principal(&caller);
    // Interaction validates and logs only; the snapshot is not rewritten.
    mutate_reporting_or_exit(ctx, |sim| {
        sim.interact_ecosystems(first, second, &data, &actor)
            .map(|()| ((), false))
    });

    if ctx.json {
        print_json(&json!({
            "action": "ecosystem.interact",
            "ecosystems": [first.get(), second.get()],
            "interactionData": data,
        }));
    } else {
        println!("biosim ecosystem interact\n  Interaction accepted: {first} <-> {second}");
    }
}
