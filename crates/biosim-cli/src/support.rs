use crate::cli::GlobalArgs;
use crate::config::{BiosimConfig, ResolvedConfig};
use biosim_kernel::{Principal, Simulation, SimulationError, SimulationResult, SpeciesTrait};
use biosim_store::{AtomicStateMutationError, mutate_state_jsonl};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "BIOSIM_LOG";

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub config: ResolvedConfig,
    pub json: bool,
}

impl Context {
    pub fn from_global_or_exit(global: &GlobalArgs) -> Self {
        let config = BiosimConfig::load(global.config.as_deref())
            .and_then(|c| c.resolve(global.state.clone(), global.administrator.clone()))
            .unwrap_or_else(|e| {
                eprintln!("error: {e}");
                std::process::exit(1);
            });
        tracing::debug!(
            state = %config.state_path.display(),
            administrator = %config.administrator,
            strict = config.settlement.strict_token_references,
            "configuration resolved"
        );
        Self {
            config,
            json: global.json,
        }
    }

    pub fn state_display(&self) -> String {
        self.config.state_path.display().to_string()
    }
}

/// Install the stderr subscriber.
///
/// `BIOSIM_LOG` wins, then `RUST_LOG`, then `debug` with `--verbose` or
/// `warn` without it.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run one operation under the state lock; the snapshot is rewritten only
/// when the operation succeeds.
pub fn mutate_or_exit<T>(
    ctx: &Context,
    operation: impl FnOnce(&mut Simulation) -> SimulationResult<T>,
) -> T {
    mutate_reporting_or_exit(ctx, |sim| operation(sim).map(|value| (value, true)))
}

/// Like [`mutate_or_exit`] for operations that report `(value, changed)`.
/// A successful operation that changed nothing leaves the snapshot as is.
pub fn mutate_reporting_or_exit<T>(
    ctx: &Context,
    operation: impl FnOnce(&mut Simulation) -> SimulationResult<(T, bool)>,
) -> T {
    let result = mutate_state_jsonl(
        &ctx.config.state_path,
        ctx.config.authority(),
        ctx.config.settlement,
        operation,
    );
    result.unwrap_or_else(|err| exit_with_mutation_error(err))
}

/// Run a read-only view over the current state, taking the lock so a
/// concurrent writer is never observed half-way.
pub fn read_or_exit<T>(ctx: &Context, view: impl FnOnce(&Simulation) -> T) -> T {
    mutate_reporting_or_exit(ctx, |sim| Ok((view(sim), false)))
}

fn exit_with_mutation_error(err: AtomicStateMutationError<SimulationError>) -> ! {
    match &err {
        AtomicStateMutationError::Mutation(inner) => {
            tracing::debug!(kind = %inner.kind(), "operation rejected");
            eprintln!("error: {}: {inner}", inner.kind());
        }
        other => eprintln!("error: {other}"),
    }
    std::process::exit(1);
}

/// Parse repeated `name=value` trait arguments, keeping their order.
pub fn parse_traits_or_exit(raw: &[String]) -> Vec<SpeciesTrait> {
    parse_traits(raw).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

pub fn parse_traits(raw: &[String]) -> Result<Vec<SpeciesTrait>, String> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok(SpeciesTrait::new(name.trim(), value.trim()))
            }
            _ => Err(format!("invalid trait `{entry}` (expected name=value)")),
        })
        .collect()
}

pub fn principal(raw: &str) -> Principal {
    Principal::from(raw.trim())
}

pub fn print_json(payload: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(payload).expect("json serialization")
    );
}
