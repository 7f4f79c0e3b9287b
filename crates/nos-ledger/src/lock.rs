//! Time-locked sub-balances.
//!
//! Each account carries at most one lock: an amount that cannot leave the
//! account until `expiry`. Holders may only strengthen their own lock;
//! weakening it is reserved for employees scoped to the account's operator.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LedgerError, LockViolation};
use crate::events::LedgerEvent;
use crate::ledger::{traced, CallContext, Ledger};
use crate::types::{Address, Amount, Timestamp};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LockState {
    pub amount: Amount,
    pub expiry: Timestamp,
}

impl LockState {
    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.expiry
    }

    /// Stored amount while active, zero once expired.
    pub fn effective_amount(&self, now: Timestamp) -> Amount {
        if self.is_active(now) {
            self.amount
        } else {
            0
        }
    }
}

impl Ledger {
    pub fn lock_of(&self, account: &Address) -> LockState {
        self.account(account).lock
    }

    pub fn locked_value_of(&self, account: &Address, now: Timestamp) -> Amount {
        self.lock_of(account).effective_amount(now)
    }

    pub fn locked_end_time_of(&self, account: &Address) -> Timestamp {
        self.lock_of(account).expiry
    }

    /// Raises or extends the caller's own lock.
    pub fn increase_lock(
        &mut self,
        ctx: &CallContext,
        amount: Amount,
        expiry: Timestamp,
    ) -> Result<(), LedgerError> {
        traced(
            "increase_lock",
            ctx,
            self.check_increase_lock(ctx, amount, expiry),
        )?;
        let user = ctx.caller;
        self.account_mut(&user).lock = LockState { amount, expiry };
        debug!(%user, amount, expiry, "lock increased");
        self.commit(
            ctx,
            LedgerEvent::LockIncreased {
                user,
                amount,
                expiry,
            },
        );
        Ok(())
    }

    fn check_increase_lock(
        &self,
        ctx: &CallContext,
        amount: Amount,
        expiry: Timestamp,
    ) -> Result<(), LedgerError> {
        let user = ctx.caller;
        let account = self.account(&user);
        let current = account.lock.effective_amount(ctx.now);
        let violation = if amount > account.balance {
            Some(LockViolation::ExceedsBalance)
        } else if expiry <= ctx.now {
            Some(LockViolation::ExpiryNotInFuture)
        } else if amount < current {
            Some(LockViolation::AmountShrinks)
        } else if expiry < account.lock.expiry {
            Some(LockViolation::ExpiryShortens)
        } else if amount == current && expiry == account.lock.expiry {
            Some(LockViolation::Unchanged)
        } else {
            None
        };
        match violation {
            Some(violation) => Err(LedgerError::lock(user, violation)),
            None => Ok(()),
        }
    }

    /// Lowers or shortens `account`'s active lock on behalf of an employee.
    pub fn decrease_lock(
        &mut self,
        ctx: &CallContext,
        account: Address,
        amount: Amount,
        expiry: Timestamp,
    ) -> Result<(), LedgerError> {
        traced(
            "decrease_lock",
            ctx,
            self.check_decrease_lock(ctx, &account, amount, expiry),
        )?;
        self.account_mut(&account).lock = LockState { amount, expiry };
        debug!(user = %account, employee = %ctx.caller, amount, expiry, "lock decreased");
        self.commit(
            ctx,
            LedgerEvent::LockDecreased {
                user: account,
                employee: ctx.caller,
                amount,
                expiry,
            },
        );
        Ok(())
    }

    fn check_decrease_lock(
        &self,
        ctx: &CallContext,
        account: &Address,
        amount: Amount,
        expiry: Timestamp,
    ) -> Result<(), LedgerError> {
        let state = self.account(account);
        self.access
            .require_employee_for(&ctx.caller, &state.association.operator_id)?;
        let lock = state.lock;
        let violation = if !lock.is_active(ctx.now) {
            Some(LockViolation::AlreadyExpired)
        } else if amount > lock.amount {
            Some(LockViolation::AmountGrows)
        } else if expiry > lock.expiry {
            Some(LockViolation::ExpiryExtends)
        } else if amount == lock.amount && expiry == lock.expiry {
            Some(LockViolation::Unchanged)
        } else {
            None
        };
        match violation {
            Some(violation) => Err(LedgerError::lock(*account, violation)),
            None => Ok(()),
        }
    }
}
