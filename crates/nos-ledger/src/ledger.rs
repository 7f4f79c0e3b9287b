use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::access::AccessControlStore;
use crate::balance::Account;
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::migration::MigrationLinks;
use crate::types::{Address, Amount, Timestamp, NOS_DECIMALS};

/// Authenticated caller and the block time an operation executes at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub now: Timestamp,
}

impl CallContext {
    pub fn new(caller: Address, now: Timestamp) -> Self {
        Self { caller, now }
    }
}

/// Genesis parameters for a ledger instance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    pub address: Address,
    pub owner: Address,
    pub name: String,
    pub symbol: String,
    /// Credited to `owner` at genesis. Successor instances start at zero.
    pub initial_supply: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerMeta {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    /// Number of committed mutating operations.
    pub height: u64,
    /// Block time of the last committed operation.
    pub timestamp: Timestamp,
}

/// One ledger instance.
#[derive(Clone, Debug)]
pub struct Ledger {
    pub(crate) meta: LedgerMeta,
    pub(crate) access: AccessControlStore,
    pub(crate) accounts: BTreeMap<Address, Account>,
    pub(crate) allowances: BTreeMap<(Address, Address), Amount>,
    pub(crate) total_supply: Amount,
    pub(crate) links: MigrationLinks,
    pub(crate) events: Vec<LedgerEvent>,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        let mut accounts = BTreeMap::new();
        if config.initial_supply > 0 {
            accounts.insert(
                config.owner,
                Account {
                    balance: config.initial_supply,
                    ..Account::default()
                },
            );
        }
        debug!(
            address = %config.address,
            owner = %config.owner,
            supply = config.initial_supply,
            "ledger genesis"
        );
        Self {
            meta: LedgerMeta {
                address: config.address,
                name: config.name,
                symbol: config.symbol,
                decimals: NOS_DECIMALS,
                height: 0,
                timestamp: 0,
            },
            access: AccessControlStore::new(config.owner),
            accounts,
            allowances: BTreeMap::new(),
            total_supply: config.initial_supply,
            links: MigrationLinks::default(),
            events: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.meta.address
    }

    pub fn meta(&self) -> &LedgerMeta {
        &self.meta
    }

    pub fn access(&self) -> &AccessControlStore {
        &self.access
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Accounts that have ever been written, in address order.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Absent accounts read as all-zero.
    pub fn account(&self, address: &Address) -> Account {
        self.accounts.get(address).copied().unwrap_or_default()
    }

    pub(crate) fn account_mut(&mut self, address: &Address) -> &mut Account {
        self.accounts.entry(*address).or_default()
    }

    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        debug!(
            ledger = %self.meta.address,
            event = event.name(),
            "event emitted"
        );
        self.events.push(event);
    }

    /// Closes a committed operation.
    pub(crate) fn seal(&mut self, now: Timestamp) {
        self.meta.height += 1;
        self.meta.timestamp = now;
    }

    pub(crate) fn commit(&mut self, ctx: &CallContext, event: LedgerEvent) {
        self.emit(event);
        self.seal(ctx.now);
    }

    /// Conservation of supply and lock soundness at time `now`.
    pub fn check_invariants(&self, now: Timestamp) -> Result<(), LedgerError> {
        let mut sum: Amount = 0;
        for (address, account) in &self.accounts {
            sum = sum.checked_add(account.balance).ok_or(LedgerError::Overflow)?;
            let locked = account.lock.effective_amount(now);
            if locked > account.balance {
                return Err(LedgerError::InvariantBroken(format!(
                    "{address} locks {locked} of a {} balance",
                    account.balance
                )));
            }
        }
        if sum != self.total_supply {
            return Err(LedgerError::InvariantBroken(format!(
                "balances sum to {sum} but total supply is {}",
                self.total_supply
            )));
        }
        Ok(())
    }
}

/// Logs a rejected validation step and passes the result through.
pub(crate) fn traced<T>(
    op: &'static str,
    ctx: &CallContext,
    result: Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    if let Err(err) = &result {
        debug!(op, caller = %ctx.caller, error = %err, "operation rejected");
    }
    result
}
