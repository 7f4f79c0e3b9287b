use tracing::debug;

use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::ledger::{traced, CallContext, Ledger};
use crate::types::{Address, Amount};

impl Ledger {
    /// Moves `amount` of the caller's unlocked balance to `to`.
    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let from = ctx.caller;
        traced(
            "transfer",
            ctx,
            self.require_unlocked(&from, amount, ctx.now),
        )?;
        self.move_balance(ctx, from, to, amount);
        Ok(())
    }

    /// Spends an allowance `from` granted to the caller.
    pub fn transfer_from(
        &mut self,
        ctx: &CallContext,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        traced(
            "transfer_from",
            ctx,
            self.check_transfer_from(ctx, &from, amount),
        )?;
        let remaining = self.allowance(&from, &ctx.caller) - amount;
        self.set_allowance(from, ctx.caller, remaining);
        self.move_balance(ctx, from, to, amount);
        Ok(())
    }

    fn check_transfer_from(
        &self,
        ctx: &CallContext,
        from: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.require_unlocked(from, amount, ctx.now)?;
        let allowed = self.allowance(from, &ctx.caller);
        if amount > allowed {
            return Err(LedgerError::InsufficientBalance {
                account: *from,
                requested: amount,
                available: allowed,
            });
        }
        Ok(())
    }

    /// An existing non-zero allowance must be reset to zero before it can be
    /// set to another non-zero value.
    pub fn approve(
        &mut self,
        ctx: &CallContext,
        spender: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let owner = ctx.caller;
        let current = self.allowance(&owner, &spender);
        if current != 0 && amount != 0 {
            return traced(
                "approve",
                ctx,
                Err(LedgerError::AllowanceInvariant {
                    owner,
                    spender,
                    current,
                }),
            );
        }
        self.set_allowance(owner, spender, amount);
        debug!(%owner, %spender, amount, "allowance set");
        self.commit(
            ctx,
            LedgerEvent::Approval {
                owner,
                spender,
                value: amount,
            },
        );
        Ok(())
    }

    /// Destroys unlocked tokens, shrinking the total supply.
    pub fn burn_tokens(&mut self, ctx: &CallContext, amount: Amount) -> Result<(), LedgerError> {
        let owner = ctx.caller;
        traced(
            "burn_tokens",
            ctx,
            self.require_unlocked(&owner, amount, ctx.now),
        )?;
        self.debit_account(&owner, amount);
        self.total_supply -= amount;
        debug!(%owner, amount, supply = self.total_supply, "tokens burned");
        self.commit(ctx, LedgerEvent::Burn { owner, value: amount });
        Ok(())
    }

    fn move_balance(&mut self, ctx: &CallContext, from: Address, to: Address, amount: Amount) {
        self.debit_account(&from, amount);
        self.credit_account(&to, amount);
        debug!(%from, %to, amount, "transfer committed");
        self.commit(
            ctx,
            LedgerEvent::Transfer {
                from,
                to,
                value: amount,
            },
        );
    }
}
