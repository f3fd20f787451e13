//! JSONL snapshot of the four registries.
//!
//! The first record carries the id counters, then every entity follows as
//! one tagged line in registry/id order. Output is deterministic for a given
//! state, which makes [`snapshot_ref`] a stable content address.

use crate::record::{BalanceRow, Counters, OwnershipRow, STATE_SNAPSHOT_SCHEMA, StateRecord};
use biosim_kernel::{AssetRegistry, HierarchyRegistry, Marketplace, PredictionRegistry, Registries};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const STATE_SNAPSHOT_REF_PREFIX: &str = "state:sha256:";

/// Errors from snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted substrate: {0}")]
    Corrupt(String),

    #[error("duplicate {kind} record: {id}")]
    Duplicate { kind: &'static str, id: String },
}

/// Read records from a JSONL reader.
pub fn read_records(reader: impl BufRead) -> Result<Vec<StateRecord>, SnapshotError> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SnapshotError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: StateRecord = serde_json::from_str(trimmed)
            .map_err(|e| SnapshotError::Parse(line_no + 1, e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

/// Write records to a JSONL writer.
pub fn write_records(
    writer: &mut impl Write,
    records: &[StateRecord],
) -> Result<(), SnapshotError> {
    for record in records {
        let line =
            serde_json::to_string(record).map_err(|e| SnapshotError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| SnapshotError::Io(0, e.to_string()))?;
    }
    Ok(())
}

/// Flatten registries into snapshot records.
pub fn state_to_records(state: &Registries) -> Vec<StateRecord> {
    let mut records = vec![StateRecord::Counters(Counters {
        schema: STATE_SNAPSHOT_SCHEMA.to_string(),
        universe: state.hierarchy.last_universe_id(),
        ecosystem: state.hierarchy.last_ecosystem_id(),
        species: state.assets.last_species_id(),
        ai_model: state.predictions.last_model_id(),
        prediction: state.predictions.last_prediction_id(),
        listing: state.market.last_listing_id(),
    })];

    records.extend(state.hierarchy.universes().cloned().map(StateRecord::Universe));
    records.extend(state.hierarchy.ecosystems().cloned().map(StateRecord::Ecosystem));
    records.extend(state.assets.all_species().cloned().map(StateRecord::Species));
    records.extend(state.assets.ownership().map(|(species_id, owner)| {
        StateRecord::Ownership(OwnershipRow {
            species_id,
            owner: owner.clone(),
        })
    }));
    records.extend(state.predictions.ai_models().cloned().map(StateRecord::AiModel));
    records.extend(
        state
            .predictions
            .predictions()
            .cloned()
            .map(StateRecord::Prediction),
    );
    records.extend(state.market.listings().cloned().map(StateRecord::Listing));
    records.extend(state.market.balances().map(|(principal, amount)| {
        StateRecord::Balance(BalanceRow {
            principal: principal.clone(),
            amount,
        })
    }));
    records
}

/// Rebuild registries from snapshot records.
///
/// Rejects duplicate ids, ownership rows for unknown species, species
/// without an owner, and counters that trail a stored id.
pub fn records_to_state(records: Vec<StateRecord>) -> Result<Registries, SnapshotError> {
    let mut counters: Option<Counters> = None;
    let mut universes = Vec::new();
    let mut ecosystems = Vec::new();
    let mut species = Vec::new();
    let mut owners = Vec::new();
    let mut models = Vec::new();
    let mut predictions = Vec::new();
    let mut listings = Vec::new();
    let mut balances = Vec::new();
    let mut seen: BTreeSet<(&'static str, String)> = BTreeSet::new();

    for record in records {
        let kind = record.kind();
        let key = match &record {
            StateRecord::Counters(_) => String::new(),
            StateRecord::Universe(row) => row.id.to_string(),
            StateRecord::Ecosystem(row) => row.id.to_string(),
            StateRecord::Species(row) => row.id.to_string(),
            StateRecord::Ownership(row) => row.species_id.to_string(),
            StateRecord::AiModel(row) => row.id.to_string(),
            StateRecord::Prediction(row) => row.id.to_string(),
            StateRecord::Listing(row) => row.id.to_string(),
            StateRecord::Balance(row) => row.principal.to_string(),
        };
        if !seen.insert((kind, key.clone())) {
            return Err(SnapshotError::Duplicate { kind, id: key });
        }

        match record {
            StateRecord::Counters(row) => {
                if row.schema != STATE_SNAPSHOT_SCHEMA {
                    return Err(SnapshotError::Corrupt(format!(
                        "unsupported snapshot schema '{}'",
                        row.schema
                    )));
                }
                counters = Some(row);
            }
            StateRecord::Universe(row) => universes.push(row),
            StateRecord::Ecosystem(row) => ecosystems.push(row),
            StateRecord::Species(row) => species.push(row),
            StateRecord::Ownership(row) => owners.push((row.species_id, row.owner)),
            StateRecord::AiModel(row) => models.push(row),
            StateRecord::Prediction(row) => predictions.push(row),
            StateRecord::Listing(row) => listings.push(row),
            StateRecord::Balance(row) => balances.push((row.principal, row.amount)),
        }
    }

    let species_ids: BTreeSet<_> = species.iter().map(|row| row.id).collect();
    let owned_ids: BTreeSet<_> = owners.iter().map(|(id, _)| *id).collect();
    if let Some(orphan) = owned_ids.difference(&species_ids).next() {
        return Err(SnapshotError::Corrupt(format!("ownership row for unknown species {orphan}")));
    }
    if let Some(unowned) = species_ids.difference(&owned_ids).next() {
        return Err(SnapshotError::Corrupt(format!("species {unowned} has no owner row")));
    }

    let counters = counters.unwrap_or_default();
    check_counter(
        "universe",
        counters.universe,
        universes.iter().map(|r| r.id.get()),
    )?;
    check_counter(
        "ecosystem",
        counters.ecosystem,
        ecosystems.iter().map(|r| r.id.get()),
    )?;
    check_counter(
        "species",
        counters.species,
        species.iter().map(|r| r.id.get()),
    )?;
    check_counter(
        "ai_model",
        counters.ai_model,
        models.iter().map(|r| r.id.get()),
    )?;
    check_counter(
        "prediction",
        counters.prediction,
        predictions.iter().map(|r| r.id.get()),
    )?;
    check_counter(
        "listing",
        counters.listing,
        listings.iter().map(|r| r.id.get()),
    )?;

    Ok(Registries {
        hierarchy: HierarchyRegistry::from_records(
            universes,
            ecosystems,
            counters.universe,
            counters.ecosystem,
        ),
        assets: AssetRegistry::from_records(species, owners, counters.species),
        predictions: PredictionRegistry::from_records(
            models,
            predictions,
            counters.ai_model,
            counters.prediction,
        ),
        market: Marketplace::from_records(listings, balances, counters.listing),
    })
}

/// A counters record is optional, but when present it must not trail ids.
/// Either way the resumed counter must leave room for one more id.
fn check_counter(
    kind: &str,
    last: u64,
    ids: impl Iterator<Item = u64>,
) -> Result<(), SnapshotError> {
    let max = ids.max().unwrap_or(0);
    if last != 0 && max > last {
        return Err(SnapshotError::Corrupt(format!("{kind} counter {last} trails stored id {max}")));
    }
    if last.max(max) == u64::MAX {
        return Err(SnapshotError::Corrupt(format!("{kind} counter is exhausted")));
    }
    Ok(())
}

/// Read registries from a JSONL snapshot path.
pub fn read_state_from_path(path: impl AsRef<Path>) -> Result<Registries, SnapshotError> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).map_err(|e| SnapshotError::Io(0, format!("{}: {e}", path.display())))?;
    validate_substrate_bytes(path, &bytes)?;
    let records = read_records(BufReader::new(bytes.as_slice()))?;
    records_to_state(records)
}

/// Like [`read_state_from_path`], but a missing file yields empty registries.
pub fn read_state_or_empty(path: impl AsRef<Path>) -> Result<Registries, SnapshotError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no snapshot yet; starting empty");
        return Ok(Registries::default());
    }
    read_state_from_path(path)
}

/// Write registries to a JSONL snapshot path via temp file + rename.
pub fn write_state_to_path(
    path: impl AsRef<Path>,
    state: &Registries,
) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| SnapshotError::Io(0, format!("{}: {e}", parent.display())))?;
    }

    let records = state_to_records(state);
    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), SnapshotError> {
        let file = File::create(&tmp_path)
            .map_err(|e| SnapshotError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        let mut writer = BufWriter::new(file);
        write_records(&mut writer, &records)?;
        writer
            .flush()
            .map_err(|e| SnapshotError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        let file = writer
            .into_inner()
            .map_err(|e| SnapshotError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        file.sync_all()
            .map_err(|e| SnapshotError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        SnapshotError::Io(
            0,
            format!("{} -> {}: {e}", tmp_path.display(), path.display()),
        )
    })?;

    tracing::debug!(path = %path.display(), records = records.len(), "snapshot written");
    Ok(())
}

/// Content address of a state: sha256 over its canonical JSONL rendering.
pub fn snapshot_ref(state: &Registries) -> Result<String, SnapshotError> {
    let mut buffer = Vec::new();
    write_records(&mut buffer, &state_to_records(state))?;
    let mut hasher = Sha256::new();
    hasher.update(&buffer);
    let digest = hasher.finalize();
    let mut rendered = String::with_capacity(STATE_SNAPSHOT_REF_PREFIX.len() + digest.len() * 2);
    rendered.push_str(STATE_SNAPSHOT_REF_PREFIX);
    for byte in digest {
        rendered.push_str(format!("{byte:02x}").as_str());
    }
    Ok(rendered)
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_substrate_bytes(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    if bytes.contains(&0) {
        return Err(SnapshotError::Corrupt(format!("{}: contains NUL byte(s)", path.display())));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(SnapshotError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}
