use serde::{Deserialize, Serialize};

use crate::association::Association;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::lock::LockState;
use crate::types::{Address, Amount, Timestamp};

/// Per-address state. An address that was never written reads as
/// `Account::default()`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Account {
    pub balance: Amount,
    pub lock: LockState,
    pub association: Association,
}

impl Account {
    /// Portion of the balance that may leave the account at `now`.
    pub fn unlocked(&self, now: Timestamp) -> Amount {
        self.balance - self.lock.effective_amount(now).min(self.balance)
    }
}

impl Ledger {
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.account(account).balance
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn unlocked_balance_of(&self, account: &Address, now: Timestamp) -> Amount {
        self.account(account).unlocked(now)
    }

    pub(crate) fn require_unlocked(
        &self,
        account: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        let available = self.unlocked_balance_of(account, now);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                account: *account,
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    /// Callers validate with `require_unlocked` first.
    pub(crate) fn debit_account(&mut self, account: &Address, amount: Amount) {
        let entry = self.account_mut(account);
        entry.balance -= amount;
    }

    /// Never overflows: every balance is bounded by `total_supply`.
    pub(crate) fn credit_account(&mut self, account: &Address, amount: Amount) {
        let entry = self.account_mut(account);
        entry.balance += amount;
    }

    pub(crate) fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }
}
