use crate::cli::UniverseCommands;
use crate::support::{Context, mutate_or_exit, principal, print_json};
use serde_json::json;

pub fn run(command: UniverseCommands, ctx: &Context) {
    match command {
        UniverseCommands::Create {
            name,
            parameters,
            caller,
        } => run_create(name, parameters, caller, ctx),
    }
}

fn run_create(name: String, parameters: String, caller: String, ctx: &Context) {
    let creator = principal(&caller);
    let id = mutate_or_exit(ctx, |sim| {
        Ok(sim.create_universe(name.clone(), parameters.clone(), &creator))
    });

    if ctx.json {
        print_json(&json!({
            "action": "universe.create",
            "statePath": ctx.state_display(),
            "universe": {
                "id": id.get(),
                "name": name,
                "parameters": parameters,
                "creator": creator.as_str(),
            }
        }));
    } else {
        println!(
            "biosim universe create\n  Created: universe {id} \"{name}\"\n  Creator: {creator}"
        );
    }
}
