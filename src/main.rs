// Command-line front end for NOS ledger state files.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use nos_ledger::{
    format_amount, parse_amount, Address, Amount, CallContext, Ledger, LedgerError, LedgerEvent,
    MigrationCoordinator, OperatorId, PlayerId, Timestamp,
};
use rand::{rngs::OsRng, RngCore};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod store;

use config::InstanceConfig;

#[derive(Parser)]
#[command(name = "nos")]
#[command(version, about = "NOS ledger: balances, time locks, operator associations and migration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a ledger state file from a TOML config
    Init {
        /// Instance config (owner, address, name, symbol, initial_supply)
        #[arg(short, long)]
        config: PathBuf,

        /// State file to create
        #[arg(short, long, default_value = "nos.json")]
        state: PathBuf,

        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Generate an ed25519 key pair and its ledger address
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Apply one mutating operation as `--caller`
    Exec {
        #[arg(short, long, default_value = "nos.json")]
        state: PathBuf,

        #[arg(long)]
        caller: Address,

        /// Unix seconds; defaults to the wall clock
        #[arg(long)]
        now: Option<Timestamp>,

        #[command(subcommand)]
        op: ExecOp,
    },

    /// Move the caller's account from a predecessor instance to its successor
    OptIn {
        #[arg(long)]
        source: PathBuf,

        #[arg(long)]
        target: PathBuf,

        #[arg(long)]
        caller: Address,

        #[arg(long)]
        now: Option<Timestamp>,
    },

    /// Read-only queries
    Show {
        #[arg(short, long, default_value = "nos.json")]
        state: PathBuf,

        #[arg(long)]
        now: Option<Timestamp>,

        #[command(subcommand)]
        query: Query,
    },

    /// Check a state file's root and invariants
    Verify {
        #[arg(short, long, default_value = "nos.json")]
        state: PathBuf,
    },
}

#[derive(Subcommand)]
enum ExecOp {
    Transfer {
        to: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    TransferFrom {
        from: Address,
        to: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    Approve {
        spender: Address,
        /// Zero clears the allowance
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    Burn {
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    IncreaseLock {
        #[arg(value_parser = parse_amount)]
        amount: Amount,
        /// Unix seconds
        expiry: Timestamp,
    },
    DecreaseLock {
        account: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
        expiry: Timestamp,
    },
    Associate {
        operator: OperatorId,
        player: PlayerId,
    },
    SetAssociation {
        account: Address,
        operator: OperatorId,
        player: PlayerId,
    },
    SetOwner {
        owner: Address,
    },
    SetEmployee {
        employee: Address,
        /// Operator scope; `0x` + 64 zeros for unassociated accounts
        scope: OperatorId,
        #[arg(long)]
        revoke: bool,
    },
    SetOperator {
        operator: OperatorId,
        #[arg(long)]
        revoke: bool,
    },
    SetMigrateFrom {
        source: Address,
    },
    SetMigrateTo {
        target: Address,
    },
}

impl ExecOp {
    fn apply(self, ledger: &mut Ledger, ctx: &CallContext) -> Result<(), LedgerError> {
        match self {
            ExecOp::Transfer { to, amount } => ledger.transfer(ctx, to, amount),
            ExecOp::TransferFrom { from, to, amount } => ledger.transfer_from(ctx, from, to, amount),
            ExecOp::Approve { spender, amount } => ledger.approve(ctx, spender, amount),
            ExecOp::Burn { amount } => ledger.burn_tokens(ctx, amount),
            ExecOp::IncreaseLock { amount, expiry } => ledger.increase_lock(ctx, amount, expiry),
            ExecOp::DecreaseLock {
                account,
                amount,
                expiry,
            } => ledger.decrease_lock(ctx, account, amount, expiry),
            ExecOp::Associate { operator, player } => ledger.associate(ctx, operator, player),
            ExecOp::SetAssociation {
                account,
                operator,
                player,
            } => ledger.set_association(ctx, account, operator, player),
            ExecOp::SetOwner { owner } => ledger.set_owner(ctx, owner),
            ExecOp::SetEmployee {
                employee,
                scope,
                revoke,
            } => ledger.set_employee(ctx, employee, scope, !revoke),
            ExecOp::SetOperator { operator, revoke } => ledger.set_operator(ctx, operator, !revoke),
            ExecOp::SetMigrateFrom { source } => ledger.set_migrate_from(ctx, source),
            ExecOp::SetMigrateTo { target } => ledger.set_migrate_to(ctx, target),
        }
    }
}

#[derive(Subcommand)]
enum Query {
    Balance { account: Address },
    Unlocked { account: Address },
    Lock { account: Address },
    Allowance { owner: Address, spender: Address },
    Association { account: Address },
    Supply,
    Roles,
    Links,
    /// Print the event log as JSON lines
    Events {
        /// Only the last N events
        #[arg(long)]
        tail: Option<usize>,
    },
}

//==================== helpers ====================//

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_now(now: Option<Timestamp>) -> Result<Timestamp> {
    match now {
        Some(now) => Ok(now),
        None => Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock before unix epoch")?
            .as_secs()),
    }
}

fn print_events(events: &[LedgerEvent]) -> Result<()> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn write_all(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

//==================== commands ====================//

fn init_cmd(config: &Path, state: &Path, force: bool) -> Result<()> {
    let ledger_config = InstanceConfig::load(config)?.to_ledger_config()?;
    let ledger = Ledger::new(ledger_config);
    store::create(state, &ledger, force)?;
    info!(
        address = %ledger.address(),
        owner = %ledger.access().owner(),
        supply = %format_amount(ledger.total_supply()),
        "ledger initialised"
    );
    println!("{} → {}", ledger.address(), state.display());
    Ok(())
}

fn keygen_cmd(out_dir: &Path) -> Result<Address> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut sk_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut sk_bytes);
    let sk = SigningKey::from_bytes(&sk_bytes);
    let pk = sk.verifying_key();
    let address = Address::derive(pk.as_bytes());

    write_all(&out_dir.join("sk.hex"), hex::encode(sk_bytes).as_bytes())?;
    write_all(&out_dir.join("pk.hex"), hex::encode(pk.as_bytes()).as_bytes())?;
    write_all(&out_dir.join("address"), address.to_string().as_bytes())?;
    println!("{address} → {}", out_dir.display());
    Ok(address)
}

fn exec_cmd(state: &Path, caller: Address, now: Timestamp, op: ExecOp) -> Result<()> {
    let mut ledger = store::load(state, now)?;
    let ctx = CallContext::new(caller, now);
    let seen = ledger.events().len();
    op.apply(&mut ledger, &ctx).context("operation rejected")?;
    store::save(state, &ledger)?;
    print_events(&ledger.events()[seen..])
}

fn opt_in_cmd(source: &Path, target: &Path, caller: Address, now: Timestamp) -> Result<()> {
    let same_file = fs::canonicalize(source)
        .with_context(|| format!("resolving {}", source.display()))?
        == fs::canonicalize(target).with_context(|| format!("resolving {}", target.display()))?;
    if same_file {
        bail!("{} is both source and target", source.display());
    }
    let mut from = store::load(source, now)?;
    let mut into = store::load(target, now)?;
    let ctx = CallContext::new(caller, now);
    let receipt = MigrationCoordinator::new(&mut from, &mut into)
        .opt_in(&ctx)
        .context("opt-in rejected")?;
    store::save_migration((source, &from), (target, &into))?;
    print_events(&receipt)
}

fn show_cmd(state: &Path, now: Timestamp, query: Query) -> Result<()> {
    let ledger = store::load(state, now)?;
    match query {
        Query::Balance { account } => println!("{}", format_amount(ledger.balance_of(&account))),
        Query::Unlocked { account } => println!(
            "{}",
            format_amount(ledger.unlocked_balance_of(&account, now))
        ),
        Query::Lock { account } => println!(
            "{} until {}",
            format_amount(ledger.locked_value_of(&account, now)),
            ledger.locked_end_time_of(&account)
        ),
        Query::Allowance { owner, spender } => {
            println!("{}", format_amount(ledger.allowance(&owner, &spender)))
        }
        Query::Association { account } => {
            let association = ledger.association_of(&account);
            println!("{} {}", association.operator_id, association.player_id)
        }
        Query::Supply => println!("{}", format_amount(ledger.total_supply())),
        Query::Roles => println!("{}", serde_json::to_string_pretty(ledger.access())?),
        Query::Links => println!(
            "{}",
            serde_json::to_string_pretty(&ledger.migration_links())?
        ),
        Query::Events { tail } => {
            let events = ledger.events();
            let skip = tail.map_or(0, |n| events.len().saturating_sub(n));
            print_events(&events[skip..])?;
        }
    }
    Ok(())
}

fn verify_cmd(state: &Path) -> Result<()> {
    let snapshot = store::read_snapshot(state)?;
    let root = snapshot.state_root_hex();
    let at = snapshot.meta.timestamp;
    let ledger = Ledger::from_snapshot(snapshot, at)
        .with_context(|| format!("verifying state {}", state.display()))?;
    println!(
        "verify: OK (root {root}, height {}, {} accounts)",
        ledger.meta().height,
        ledger.accounts().count()
    );
    Ok(())
}

//==================== main ====================//

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init {
            config,
            state,
            force,
        } => init_cmd(&config, &state, force),
        Commands::Keygen { out_dir } => keygen_cmd(&out_dir).map(|_| ()),
        Commands::Exec {
            state,
            caller,
            now,
            op,
        } => exec_cmd(&state, caller, resolve_now(now)?, op),
        Commands::OptIn {
            source,
            target,
            caller,
            now,
        } => opt_in_cmd(&source, &target, caller, resolve_now(now)?),
        Commands::Show { state, now, query } => show_cmd(&state, resolve_now(now)?, query),
        Commands::Verify { state } => verify_cmd(&state),
    }
}
