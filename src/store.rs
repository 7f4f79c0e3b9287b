//! JSON state files holding one ledger snapshot each.

use std::{fs, io::Write, path::Path};

use anyhow::{bail, Context, Result};
use nos_ledger::{Ledger, LedgerSnapshot, Timestamp};
use tempfile::NamedTempFile;
use tracing::debug;

pub fn read_snapshot(path: &Path) -> Result<LedgerSnapshot> {
    let bytes = fs::read(path).with_context(|| format!("reading state {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing state {}", path.display()))
}

/// Loads and verifies a state file for an operation happening at `now`.
///
/// Time may not run backwards past the last committed operation, otherwise
/// expired locks would come back to life.
pub fn load(path: &Path, now: Timestamp) -> Result<Ledger> {
    let snapshot = read_snapshot(path)?;
    if now < snapshot.meta.timestamp {
        bail!(
            "clock {now} is behind the ledger's last operation at {}",
            snapshot.meta.timestamp
        );
    }
    let root = snapshot.state_root_hex();
    let ledger = Ledger::from_snapshot(snapshot, now)
        .with_context(|| format!("verifying state {}", path.display()))?;
    debug!(path = %path.display(), %root, height = ledger.meta().height, "state loaded");
    Ok(ledger)
}

/// Writes `ledger` next to `path` and renames it into place.
pub fn save(path: &Path, ledger: &Ledger) -> Result<()> {
    let staged = stage(path, ledger)?;
    commit(staged, path)
}

/// Persists both sides of an opt-in.
///
/// Both files are staged before either is replaced. The target is replaced
/// first; if the source then cannot be replaced, the previous target is put
/// back so the credit never outlives a failed vacate.
pub fn save_migration(source: (&Path, &Ledger), target: (&Path, &Ledger)) -> Result<()> {
    let previous_target = fs::read(target.0)
        .with_context(|| format!("reading state {}", target.0.display()))?;
    let staged_source = stage(source.0, source.1)?;
    let staged_target = stage(target.0, target.1)?;

    commit(staged_target, target.0)?;
    if let Err(err) = commit(staged_source, source.0) {
        let restored =
            stage_bytes(target.0, &previous_target).and_then(|staged| commit(staged, target.0));
        return Err(match restored {
            Ok(()) => err.context(format!("{} restored", target.0.display())),
            Err(restore) => err.context(format!(
                "{} is credited but could not be restored: {restore:#}",
                target.0.display()
            )),
        });
    }
    Ok(())
}

pub fn create(path: &Path, ledger: &Ledger, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    save(path, ledger)
}

fn stage(path: &Path, ledger: &Ledger) -> Result<NamedTempFile> {
    let snapshot = ledger.snapshot();
    let json = serde_json::to_vec_pretty(&snapshot)?;
    let staged = stage_bytes(path, &json)?;
    debug!(
        path = %path.display(),
        staged = %staged.path().display(),
        root = %snapshot.state_root_hex(),
        "state staged"
    );
    Ok(staged)
}

/// Uniquely named file in `path`'s directory.
fn stage_bytes(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("staging next to {}", path.display()))?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

fn commit(staged: NamedTempFile, path: &Path) -> Result<()> {
    staged
        .persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nos_ledger::{Address, CallContext, LedgerConfig, NOS_SCALE};

    const NOW: Timestamp = 1_700_000_000;

    fn ledger() -> Ledger {
        Ledger::new(LedgerConfig {
            address: Address::derive(b"nos-1"),
            owner: Address::derive(b"owner"),
            name: "NOS Coin".into(),
            symbol: "NOS".into(),
            initial_supply: 1_000 * NOS_SCALE,
        })
    }

    #[test]
    fn save_then_load_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/nos.json");
        let mut ledger = ledger();
        let owner = CallContext::new(Address::derive(b"owner"), NOW);
        ledger
            .transfer(&owner, Address::derive(b"user0"), 10 * NOS_SCALE)
            .unwrap();
        save(&path, &ledger).unwrap();

        let loaded = load(&path, NOW).unwrap();
        assert_eq!(loaded.snapshot(), ledger.snapshot());
        let names: Vec<_> = fs::read_dir(dir.path().join("state"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("nos.json")]);
    }

    #[test]
    fn load_rejects_a_clock_behind_the_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nos.json");
        let mut ledger = ledger();
        let owner = CallContext::new(Address::derive(b"owner"), NOW);
        ledger
            .transfer(&owner, Address::derive(b"user0"), 1)
            .unwrap();
        save(&path, &ledger).unwrap();
        assert!(load(&path, NOW - 1).is_err());
    }

    #[test]
    fn load_rejects_edited_balances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nos.json");
        save(&path, &ledger()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let edited = text.replace("100000000000", "100000000001");
        assert_ne!(edited, text);
        fs::write(&path, edited).unwrap();
        assert!(load(&path, NOW).is_err());
    }

    #[test]
    fn create_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nos.json");
        create(&path, &ledger(), false).unwrap();
        assert!(create(&path, &ledger(), false).is_err());
        create(&path, &ledger(), true).unwrap();
    }

    #[test]
    fn staged_files_never_share_a_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nos.json");
        let first = stage(&path, &ledger()).unwrap();
        let second = stage(&path, &ledger()).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn failed_source_write_restores_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("v2.json");
        save(&target, &ledger()).unwrap();
        let original = fs::read(&target).unwrap();

        // A non-empty directory cannot be replaced by a file.
        let blocked = dir.path().join("v1.json");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), b"x").unwrap();

        let mut credited = ledger();
        let owner = CallContext::new(Address::derive(b"owner"), NOW);
        credited
            .transfer(&owner, Address::derive(b"user0"), NOS_SCALE)
            .unwrap();
        assert!(save_migration((&blocked, &ledger()), (&target, &credited)).is_err());

        assert_eq!(fs::read(&target).unwrap(), original);
        let mut names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                std::ffi::OsString::from("v1.json"),
                std::ffi::OsString::from("v2.json")
            ]
        );
    }
}
