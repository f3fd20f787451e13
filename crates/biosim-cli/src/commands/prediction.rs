use crate::cli::{DecisionArg, ModelCommands, PredictionCommands};
use crate::support::{Context, mutate_or_exit, principal, print_json, read_or_exit};
use biosim_kernel::{EcosystemId, ModelId, PredictionId, PredictionStatus};
use serde_json::json;

pub fn run_model(command: ModelCommands, ctx: &Context) {
    match command {
        ModelCommands::Register {
            name,
            description,
            version,
            caller,
        } => {
            let creator = principal(&caller);
            let id = mutate_or_exit(ctx, |sim| {
                Ok(sim.register_ai_model(
                    name.clone(),
                    description.clone(),
                    version.clone(),
                    &creator,
                ))
            });

            if ctx.json {
                print_json(&json!({
                    "action": "model.register",
                    "statePath": ctx.state_display(),
                    "model": {
                        "id": id.get(),
                        "name": name,
                        "description": description,
                        "version": version,
                        "creator": creator.as_str(),
                    }
                }));
            } else {
                println!("biosim model register\n  Registered: model {id} \"{name}\" v{version}");
            }
        }
    }
}

pub fn run(command: PredictionCommands, ctx: &Context) {
    match command {
        PredictionCommands::Create {
            model_id,
            ecosystem_id,
            data,
        } => run_create(ModelId(model_id), EcosystemId(ecosystem_id), data, ctx),
        PredictionCommands::Validate {
            id,
            decision,
            caller,
        } => run_validate(PredictionId(id), decision, caller, ctx),
        PredictionCommands::List { ecosystem_id } => run_list(EcosystemId(ecosystem_id), ctx),
    }
}

fn run_create(model_id: ModelId, ecosystem_id: EcosystemId, data: String, ctx: &Context) {
    let (id, timestamp) = mutate_or_exit(ctx, |sim| {
        let id = sim.create_ecosystem_prediction(model_id, ecosystem_id, data.clone())?;
        let timestamp = sim
            .prediction(id)
            .map(|p| p.timestamp.to_rfc3339())
            .unwrap_or_default();
        Ok((id, timestamp))
    });

    if ctx.json {
        print_json(&json!({
            "action": "prediction.create",
            "statePath": ctx.state_display(),
            "prediction": {
                "id": id.get(),
                "modelId": model_id.get(),
                "ecosystemId": ecosystem_id.get(),
                "predictionData": data,
                "timestamp": timestamp,
                "status": PredictionStatus::Pending.as_str(),
            }
        }));
    } else {
        println!(
            "biosim prediction create\n  Recorded: prediction {id} (model {model_id}, ecosystem {ecosystem_id})\n  Status: {}",
            PredictionStatus::Pending
        );
    }
}

fn run_validate(id: PredictionId, decision: DecisionArg, caller: String, ctx: &Context) {
    let validator = principal(&caller);
    let is_valid = matches!(decision, DecisionArg::Validated);
    let status = mutate_or_exit(ctx, |sim| {
        sim.validate_prediction(id, is_valid, &validator)?;
        Ok(sim
            .prediction(id)
            .map(|p| p.status)
            .unwrap_or(PredictionStatus::Pending))
    });

    if ctx.json {
        print_json(&json!({
            "action": "prediction.validate",
            "statePath": ctx.state_display(),
            "predictionId": id.get(),
            "status": status.as_str(),
        }));
    } else {
        println!("biosim prediction validate\n  Prediction {id}: {status}");
    }
}

fn run_list(ecosystem_id: EcosystemId, ctx: &Context) {
    let rows: Vec<_> = read_or_exit(ctx, |sim| {
        sim.predictions_for(ecosystem_id)
            .map(|p| {
                (
                    p.id,
                    p.model_id,
                    p.status,
                    p.timestamp.to_rfc3339(),
                    p.prediction_data.clone(),
                )
            })
            .collect()
    });

    if ctx.json {
        let items: Vec<_> = rows
            .iter()
            .map(|(id, model_id, status, timestamp, data)| {
                json!({
                    "id": id.get(),
                    "modelId": model_id.get(),
                    "status": status.as_str(),
                    "timestamp": timestamp,
                    "predictionData": data,
                })
            })
            .collect();
        print_json(&json!({
            "action": "prediction.list",
            "ecosystemId": ecosystem_id.get(),
            "count": items.len(),
            "items": items,
        }));
    } else {
        println!("biosim prediction list (ecosystem {ecosystem_id})");
        if rows.is_empty() {
            println!("  (none)");
        }
        for (id, model_id, status, timestamp, _) in rows {
            println!("  #{id} model {model_id} [{status}] {timestamp}");
        }
    }
}
