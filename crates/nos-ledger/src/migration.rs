//! One-way migration of accounts from a predecessor instance to its
//! successor.
//!
//! Each instance owner links their side once (`set_migrate_to` on the source,
//! `set_migrate_from` on the target). After that any holder can opt in on the
//! target: the coordinator vacates the source balance, credits the target,
//! merges an active lock and carries the association over when the target has
//! none. Opting in again later migrates only what arrived on the source since.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::association::Association;
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::ledger::{traced, CallContext, Ledger};
use crate::lock::LockState;
use crate::types::{Address, Amount};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MigrationLinks {
    pub migrate_from: Option<Address>,
    pub migrate_to: Option<Address>,
}

impl Ledger {
    pub fn migration_links(&self) -> MigrationLinks {
        self.links
    }

    /// Names the predecessor this instance accepts opt-ins from.
    pub fn set_migrate_from(
        &mut self,
        ctx: &CallContext,
        source: Address,
    ) -> Result<(), LedgerError> {
        traced(
            "set_migrate_from",
            ctx,
            self.access.require_owner(&ctx.caller),
        )?;
        self.links.migrate_from = Some(source);
        info!(ledger = %self.meta.address, %source, "migration source linked");
        self.commit(ctx, LedgerEvent::MigrateFrom { source });
        Ok(())
    }

    /// Names the successor this instance releases accounts to.
    pub fn set_migrate_to(&mut self, ctx: &CallContext, target: Address) -> Result<(), LedgerError> {
        traced(
            "set_migrate_to",
            ctx,
            self.access.require_owner(&ctx.caller),
        )?;
        self.links.migrate_to = Some(target);
        info!(ledger = %self.meta.address, %target, "migration target linked");
        self.commit(ctx, LedgerEvent::MigrateTo { target });
        Ok(())
    }
}

/// What `opt_in` will write, computed before anything is touched.
struct MigrationPlan {
    value: Amount,
    lock: Option<LockState>,
    association: Option<Association>,
}

/// Exclusive handle on a linked source/target pair.
pub struct MigrationCoordinator<'a> {
    source: &'a mut Ledger,
    target: &'a mut Ledger,
}

impl<'a> MigrationCoordinator<'a> {
    pub fn new(source: &'a mut Ledger, target: &'a mut Ledger) -> Self {
        Self { source, target }
    }

    /// Moves the caller's balance, lock and association from source to target.
    ///
    /// Returns the events in protocol order: `Vacate` (source), `OptIn`, then
    /// optionally `LockIncreased` and `Associate` (target).
    pub fn opt_in(&mut self, ctx: &CallContext) -> Result<Vec<LedgerEvent>, LedgerError> {
        let plan = traced("opt_in", ctx, self.plan(ctx))?;
        let owner = ctx.caller;
        let mut receipt = Vec::with_capacity(4);

        // Source: vacate balance, clear lock and association.
        let vacated = self.source.account_mut(&owner);
        vacated.balance = 0;
        vacated.lock = LockState::default();
        vacated.association = Association::default();
        self.source.total_supply -= plan.value;
        let vacate = LedgerEvent::Vacate {
            owner,
            value: plan.value,
        };
        self.source.emit(vacate.clone());
        self.source.seal(ctx.now);
        receipt.push(vacate);

        // Target: credit, then merge lock and association.
        self.target.credit_account(&owner, plan.value);
        self.target.total_supply += plan.value;
        let opt_in = LedgerEvent::OptIn {
            owner,
            value: plan.value,
        };
        self.target.emit(opt_in.clone());
        receipt.push(opt_in);

        if let Some(lock) = plan.lock {
            self.target.account_mut(&owner).lock = lock;
            let event = LedgerEvent::LockIncreased {
                user: owner,
                amount: lock.amount,
                expiry: lock.expiry,
            };
            self.target.emit(event.clone());
            receipt.push(event);
        }
        if let Some(association) = plan.association {
            self.target.account_mut(&owner).association = association;
            let event = LedgerEvent::Associate {
                user: owner,
                agent: owner,
                operator_id: association.operator_id,
                player_id: association.player_id,
            };
            self.target.emit(event.clone());
            receipt.push(event);
        }
        self.target.seal(ctx.now);

        info!(
            %owner,
            value = plan.value,
            source = %self.source.meta.address,
            target = %self.target.meta.address,
            lock_merged = plan.lock.is_some(),
            association_copied = plan.association.is_some(),
            "account migrated"
        );
        Ok(receipt)
    }

    fn plan(&self, ctx: &CallContext) -> Result<MigrationPlan, LedgerError> {
        // Two copies of one instance would each see the other as linked.
        if self.source.meta.address == self.target.meta.address {
            return Err(LedgerError::MigrationState(
                "source and target are the same instance",
            ));
        }
        if self.target.links.migrate_from != Some(self.source.meta.address) {
            return Err(LedgerError::MigrationState(
                "target does not migrate from this source",
            ));
        }
        if self.source.links.migrate_to != Some(self.target.meta.address) {
            return Err(LedgerError::MigrationState(
                "source does not migrate to this target",
            ));
        }

        let from = self.source.account(&ctx.caller);
        if from.balance == 0 {
            return Err(LedgerError::MigrationState("nothing to migrate"));
        }
        let into = self.target.account(&ctx.caller);
        self.target
            .total_supply
            .checked_add(from.balance)
            .ok_or(LedgerError::Overflow)?;
        let balance = into.balance + from.balance;

        let source_locked = from.lock.effective_amount(ctx.now);
        let lock = if source_locked > 0 {
            let merged = into
                .lock
                .effective_amount(ctx.now)
                .saturating_add(source_locked)
                .min(balance);
            Some(LockState {
                amount: merged,
                expiry: into.lock.expiry.max(from.lock.expiry),
            })
        } else {
            None
        };

        let association = if into.association.is_unset() && !from.association.is_unset() {
            Some(from.association)
        } else {
            None
        };

        Ok(MigrationPlan {
            value: from.balance,
            lock,
            association,
        })
    }
}
