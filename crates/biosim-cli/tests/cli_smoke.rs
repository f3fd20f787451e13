use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

const ADMIN: &str = "CONTRACT_OWNER";

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "biosim-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> String {
        self.path.join("state.jsonl").display().to_string()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_biosim<I, S>(dir: &TempDirGuard, args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_biosim");
    Command::new(bin)
        .current_dir(dir.path())
        .env_remove("BIOSIM_LOG")
        .env_remove("RUST_LOG")
        .arg("--state")
        .arg(dir.state())
        .args(args)
        .output()
        .expect("biosim command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_failure(output: &Output) {
    if output.status.success() {
        panic!(
            "command unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice::<Value>(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "expected valid JSON stdout, got error: {e}\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn balance(dir: &TempDirGuard, principal: &str) -> u64 {
    let output = run_biosim(dir, ["balance", principal, "--json"]);
    assert_success(&output);
    parse_json_stdout(&output)["balance"]
        .as_u64()
        .expect("balance should be a number")
}

#[test]
fn marketplace_purchase_settles_balances() {
    let tmp = TempDirGuard::new("market");

    let output = run_biosim(
        &tmp,
        [
            "listing", "create", "species", "7", "100", "--as", "seller1", "--json",
        ],
    );
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["action"], "listing.create");
    assert_eq!(payload["listing"]["id"], 1);
    assert_eq!(payload["listing"]["status"], "active");

    let output = run_biosim(&tmp, ["mint", "100", "buyer1", "--as", ADMIN]);
    assert_success(&output);
    assert!(stdout_text(&output).contains("Minted: 100 to buyer1"));

    let output = run_biosim(&tmp, ["listing", "buy", "1", "--as", "buyer1", "--json"]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["listing"]["status"], "sold");
    assert_eq!(payload["balances"]["buyer"], 0);
    assert_eq!(payload["balances"]["seller"], 100);

    assert_eq!(balance(&tmp, "buyer1"), 0);
    assert_eq!(balance(&tmp, "seller1"), 100);
}

#[test]
fn rejected_purchase_leaves_state_unchanged() {
    let tmp = TempDirGuard::new("rejected");

    assert_success(&run_biosim(
        &tmp,
        [
            "listing", "create", "species", "5", "400", "--as", "seller5",
        ],
    ));
    assert_success(&run_biosim(&tmp, ["mint", "300", "buyer2", "--as", ADMIN]));
    let before = fs::read_to_string(tmp.state()).expect("state file should exist");

    let output = run_biosim(&tmp, ["listing", "buy", "1", "--as", "buyer2"]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("insufficient_balance"));

    let after = fs::read_to_string(tmp.state()).expect("state file should exist");
    assert_eq!(before, after);
    assert_eq!(balance(&tmp, "buyer2"), 300);
}

#[test]
fn non_administrator_cannot_mint() {
    let tmp = TempDirGuard::new("mint-auth");

    let output = run_biosim(&tmp, ["mint", "100", "mallory", "--as", "mallory"]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("unauthorized"));
    assert_eq!(balance(&tmp, "mallory"), 0);
}

#[test]
fn ecosystem_lifecycle_and_listing_transfer() {
    let tmp = TempDirGuard::new("ecosystem");

    let output = run_biosim(
        &tmp,
        ["universe", "create", "Alpha", "--as", "alice", "--json"],
    );
    assert_success(&output);
    assert_eq!(parse_json_stdout(&output)["universe"]["id"], 1);

    let output = run_biosim(&tmp, ["ecosystem", "create", "2", "Reef", "--as", "alice"]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("not_found"));

    let output = run_biosim(
        &tmp,
        [
            "ecosystem",
            "create",
            "1",
            "Reef",
            "--as",
            "alice",
            "--json",
        ],
    );
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["ecosystem"]["id"], 1);
    assert_eq!(payload["ecosystem"]["status"], "active");

    let output = run_biosim(
        &tmp,
        ["ecosystem", "status", "1", "thriving", "--as", "bob"],
    );
    assert_failure(&output);
    assert!(stderr_text(&output).contains("unauthorized"));

    assert_success(&run_biosim(
        &tmp,
        ["ecosystem", "status", "1", "endangered", "--as", "alice"],
    ));

    assert_success(&run_biosim(
        &tmp,
        [
            "listing",
            "create",
            "Ecosystem",
            "1",
            "50",
            "--as",
            "alice",
        ],
    ));
    assert_success(&run_biosim(&tmp, ["mint", "50", "bob", "--as", ADMIN]));
    assert_success(&run_biosim(&tmp, ["listing", "buy", "1", "--as", "bob"]));

    let output = run_biosim(&tmp, ["show", "--json"]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["counts"]["universes"], 1);
    assert_eq!(payload["counts"]["ecosystems"], 1);
    assert_eq!(payload["counts"]["activeListings"], 0);
    assert_eq!(payload["totalSupply"], 50);
    assert!(
        payload["snapshotRef"]
            .as_str()
            .expect("snapshot ref string")
            .starts_with("state:sha256:")
    );

    let state = fs::read_to_string(tmp.state()).expect("state file should exist");
    assert!(state.contains("\"transferred\""));
}

#[test]
fn species_mint_transfer_and_evolve() {
    let tmp = TempDirGuard::new("species");

    let output = run_biosim(
        &tmp,
        [
            "species",
            "mint",
            "1",
            "Fern",
            "--trait",
            "color=green",
            "--trait",
            "size=small",
            "--rarity",
            "3",
            "--as",
            "alice",
            "--json",
        ],
    );
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["species"]["id"], 1);
    assert_eq!(payload["species"]["traits"][0]["trait"], "color");
    assert_eq!(payload["species"]["traits"][1]["value"], "small");

    let output = run_biosim(&tmp, ["species", "transfer", "1", "carol", "--as", "bob"]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("unauthorized"));

    assert_success(&run_biosim(&tmp, ["species", "transfer", "1", "bob", "--as", "alice"]));

    // Evolution stays with the original creator after a transfer.
    assert_failure(&run_biosim(
        &tmp,
        [
            "species",
            "evolve",
            "1",
            "--trait",
            "color=red",
            "--as",
            "bob",
        ],
    ));
    assert_success(&run_biosim(
        &tmp,
        [
            "species",
            "evolve",
            "1",
            "--trait",
            "color=red",
            "--as",
            "alice",
        ],
    ));

    let output = run_biosim(
        &tmp,
        [
            "species", "mint", "1", "Moss", "--trait", "broken", "--as", "alice",
        ],
    );
    assert_failure(&output);
    assert!(stderr_text(&output).contains("name=value"));
}

#[test]
fn prediction_validation_requires_administrator() {
    let tmp = TempDirGuard::new("prediction");

    assert_success(&run_biosim(&tmp, ["model", "register", "M", "--as", "c1"]));

    let output = run_biosim(&tmp, ["prediction", "create", "2", "42"]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("not_found"));

    let output = run_biosim(&tmp, ["prediction", "create", "1", "42", "--json"]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["prediction"]["id"], 1);
    assert_eq!(payload["prediction"]["status"], "pending");

    let output = run_biosim(&tmp, ["prediction", "validate", "1", "--as", "c1"]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("unauthorized"));

    let output = run_biosim(
        &tmp,
        ["prediction", "validate", "1", "--as", ADMIN, "--json"],
    );
    assert_success(&output);
    assert_eq!(parse_json_stdout(&output)["status"], "validated");

    let output = run_biosim(&tmp, ["prediction", "list", "42", "--json"]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["count"], 1);
    assert_eq!(payload["items"][0]["status"], "validated");
}

#[test]
fn administrator_comes_from_config_file() {
    let tmp = TempDirGuard::new("config");
    fs::write(tmp.path().join("biosim.toml"), "administrator = \"root\"\n")
        .expect("config should be written");

    assert_failure(&run_biosim(&tmp, ["mint", "10", "alice", "--as", ADMIN]));
    assert_success(&run_biosim(&tmp, ["mint", "10", "alice", "--as", "root"]));
    assert_eq!(balance(&tmp, "alice"), 10);

    let output = run_biosim(
        &tmp,
        [
            "--administrator",
            "override",
            "mint",
            "5",
            "alice",
            "--as",
            "override",
        ],
    );
    assert_success(&output);
    assert_eq!(balance(&tmp, "alice"), 15);

    // Surrounding whitespace is dropped, as it is for `--as` callers.
    let output = run_biosim(
        &tmp,
        [
            "--administrator",
            " padded ",
            "mint",
            "5",
            "alice",
            "--as",
            "padded",
        ],
    );
    assert_success(&output);
    assert_eq!(balance(&tmp, "alice"), 20);
}

#[test]
fn listing_token_type_ignores_case() {
    let tmp = TempDirGuard::new("token-type");

    let output = run_biosim(
        &tmp,
        [
            "listing", "create", "SPECIES", "7", "9", "--as", "s", "--json",
        ],
    );
    assert_success(&output);
    assert_eq!(
        parse_json_stdout(&output)["listing"]["tokenType"],
        "species"
    );

    let output = run_biosim(&tmp, ["listing", "create", "fungus", "7", "9", "--as", "s"]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("unknown token type 'fungus'"));
}

#[test]
fn unchanged_state_is_not_rewritten() {
    let tmp = TempDirGuard::new("unchanged");

    assert_success(&run_biosim(&tmp, ["universe", "create", "U", "--as", "alice"]));
    for name in ["Reef", "Kelp"] {
        assert_success(&run_biosim(&tmp, ["ecosystem", "create", "1", name, "--as", "alice"]));
    }
    assert_success(&run_biosim(
        &tmp,
        ["listing", "create", "species", "3", "10", "--as", "alice"],
    ));
    assert_success(&run_biosim(&tmp, ["listing", "cancel", "1", "--as", "alice"]));

    // Rewriting drops comment lines, so a surviving marker means no write happened.
    let mut marked = fs::read_to_string(tmp.state()).expect("state file should exist");
    marked.push_str("# marker\n");
    fs::write(tmp.state(), &marked).expect("marker should be written");

    assert_success(&run_biosim(&tmp, ["ecosystem", "interact", "1", "2", "--as", ADMIN]));
    let output = run_biosim(&tmp, ["listing", "cancel", "1", "--as", "alice", "--json"]);
    assert_success(&output);
    assert_eq!(parse_json_stdout(&output)["changed"], false);
    let after = fs::read_to_string(tmp.state()).expect("state file should exist");
    assert_eq!(after, marked);

    assert_success(&run_biosim(&tmp, ["mint", "1", "bob", "--as", ADMIN]));
    let after = fs::read_to_string(tmp.state()).expect("state file should exist");
    assert!(!after.contains("# marker"));
}
