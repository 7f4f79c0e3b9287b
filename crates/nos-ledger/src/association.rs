//! Operator/player bindings.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LedgerError, LockViolation};
use crate::events::LedgerEvent;
use crate::ledger::{traced, CallContext, Ledger};
use crate::types::{Address, OperatorId, PlayerId};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Association {
    pub operator_id: OperatorId,
    pub player_id: PlayerId,
}

impl Association {
    pub fn new(operator_id: OperatorId, player_id: PlayerId) -> Self {
        Self {
            operator_id,
            player_id,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.operator_id.is_zero() && self.player_id.is_zero()
    }

    /// A player id only makes sense under an operator.
    fn validate(&self) -> Result<(), LedgerError> {
        if self.operator_id.is_zero() && !self.player_id.is_zero() {
            return Err(LedgerError::AssociationInvariant);
        }
        Ok(())
    }
}

impl Ledger {
    pub fn association_of(&self, account: &Address) -> Association {
        self.account(account).association
    }

    /// Self-service binding of the caller to an approved operator.
    ///
    /// While the caller's lock is active a bound player id is frozen; only an
    /// employee can change it through [`Ledger::set_association`].
    pub fn associate(
        &mut self,
        ctx: &CallContext,
        operator_id: OperatorId,
        player_id: PlayerId,
    ) -> Result<(), LedgerError> {
        let association = Association::new(operator_id, player_id);
        traced(
            "associate",
            ctx,
            self.check_associate(ctx, &association),
        )?;
        self.bind(ctx, ctx.caller, association);
        Ok(())
    }

    fn check_associate(
        &self,
        ctx: &CallContext,
        association: &Association,
    ) -> Result<(), LedgerError> {
        association.validate()?;
        if !association.operator_id.is_zero() && !self.access.is_approved(&association.operator_id)
        {
            return Err(LedgerError::UnapprovedOperator {
                operator_id: association.operator_id,
            });
        }
        let account = self.account(&ctx.caller);
        let frozen = account.lock.is_active(ctx.now) && !account.association.player_id.is_zero();
        if frozen && account.association != *association {
            return Err(LedgerError::lock(
                ctx.caller,
                LockViolation::AssociationFrozen,
            ));
        }
        Ok(())
    }

    /// Employee override. Scope is checked against the association the
    /// account has before this call, and neither the operator allow-list nor
    /// the lock freeze applies.
    pub fn set_association(
        &mut self,
        ctx: &CallContext,
        account: Address,
        operator_id: OperatorId,
        player_id: PlayerId,
    ) -> Result<(), LedgerError> {
        let association = Association::new(operator_id, player_id);
        traced(
            "set_association",
            ctx,
            self.check_set_association(ctx, &account, &association),
        )?;
        self.bind(ctx, account, association);
        Ok(())
    }

    fn check_set_association(
        &self,
        ctx: &CallContext,
        account: &Address,
        association: &Association,
    ) -> Result<(), LedgerError> {
        let current = self.association_of(account);
        self.access
            .require_employee_for(&ctx.caller, &current.operator_id)?;
        association.validate()
    }

    fn bind(&mut self, ctx: &CallContext, user: Address, association: Association) {
        self.account_mut(&user).association = association;
        debug!(
            %user,
            agent = %ctx.caller,
            operator = %association.operator_id,
            player = %association.player_id,
            "association bound"
        );
        self.commit(
            ctx,
            LedgerEvent::Associate {
                user,
                agent: ctx.caller,
                operator_id: association.operator_id,
                player_id: association.player_id,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::ledger::test_support::*;
    use crate::types::Id32;

    fn operator_ledger() -> Ledger {
        let mut ledger = funded_ledger();
        let owner = ctx("owner");
        for op in ["CashBet", "Acme", "Initrode"] {
            ledger.set_operator(&owner, id(op), true).unwrap();
        }
        ledger
            .set_employee(&owner, addr("empl"), id("CashBet"), true)
            .unwrap();
        ledger
    }

    fn pair(op: &str, player: &str) -> Association {
        Association::new(id(op), id(player))
    }

    #[test]
    fn initial_association_is_unset() {
        let ledger = operator_ledger();
        assert!(ledger.association_of(&addr("user0")).is_unset());
    }

    #[test]
    fn holder_rebinds_freely_while_unlocked() {
        let mut ledger = operator_ledger();
        let user = ctx("user0");
        ledger.associate(&user, id("CashBet"), id("4242")).unwrap();
        assert_eq!(ledger.association_of(&user.caller), pair("CashBet", "4242"));
        assert_eq!(
            ledger.events().last(),
            Some(&LedgerEvent::Associate {
                user: user.caller,
                agent: user.caller,
                operator_id: id("CashBet"),
                player_id: id("4242"),
            })
        );

        ledger.associate(&user, id("CashBet"), id("4243")).unwrap();
        ledger.associate(&user, id("Acme"), id("4244")).unwrap();
        ledger.associate(&user, id("Acme"), Id32::ZERO).unwrap();
        ledger.associate(&user, Id32::ZERO, Id32::ZERO).unwrap();
        assert!(ledger.association_of(&user.caller).is_unset());
    }

    #[test]
    fn player_without_operator_is_rejected_for_everyone() {
        let mut ledger = operator_ledger();
        ledger
            .associate(&ctx("user0"), id("CashBet"), id("4245"))
            .unwrap();
        assert_matches!(
            ledger.associate(&ctx("user0"), Id32::ZERO, id("4246")),
            Err(LedgerError::AssociationInvariant)
        );
        assert_matches!(
            ledger.set_association(&ctx("empl"), addr("user0"), Id32::ZERO, id("4246")),
            Err(LedgerError::AssociationInvariant)
        );
        assert_eq!(
            ledger.association_of(&addr("user0")),
            pair("CashBet", "4245")
        );
    }

    #[test]
    fn unapproved_operator_is_rejected_for_holders() {
        let mut ledger = operator_ledger();
        let owner = ctx("owner");
        assert_matches!(
            ledger.associate(&ctx("user0"), id("BadBad"), id("4444")),
            Err(LedgerError::UnapprovedOperator { operator_id }) if operator_id == id("BadBad")
        );
        ledger.set_operator(&owner, id("BadBad"), true).unwrap();
        ledger
            .associate(&ctx("user1"), id("BadBad"), id("4444"))
            .unwrap();
        ledger.set_operator(&owner, id("BadBad"), false).unwrap();
        assert_matches!(
            ledger.associate(&ctx("user0"), id("BadBad"), id("4445")),
            Err(LedgerError::UnapprovedOperator { .. })
        );
    }

    #[test]
    fn active_lock_freezes_a_bound_player() {
        let mut ledger = operator_ledger();
        let user = ctx("user0");
        ledger.associate(&user, id("CashBet"), id("4343")).unwrap();
        ledger
            .increase_lock(&user, tokens(1000), NOW + 30 * DAY)
            .unwrap();

        assert_matches!(
            ledger.associate(&user, id("CashBet"), id("4444")),
            Err(LedgerError::LockInvariant {
                violation: LockViolation::AssociationFrozen,
                ..
            })
        );
        assert_matches!(
            ledger.associate(&user, id("Acme"), id("4444")),
            Err(LedgerError::LockInvariant { .. })
        );
        assert_eq!(ledger.association_of(&user.caller), pair("CashBet", "4343"));

        // Employee override, then the holder may fill an emptied player id once.
        ledger
            .set_association(&ctx("empl"), user.caller, id("CashBet"), id("4444"))
            .unwrap();
        ledger
            .set_association(&ctx("empl"), user.caller, id("CashBet"), Id32::ZERO)
            .unwrap();
        ledger.associate(&user, id("CashBet"), id("4646")).unwrap();
        assert_matches!(
            ledger.associate(&user, id("CashBet"), id("4747")),
            Err(LedgerError::LockInvariant { .. })
        );
        assert_eq!(ledger.association_of(&user.caller), pair("CashBet", "4646"));

        // Expiry lifts the freeze.
        let later = CallContext::new(user.caller, NOW + 30 * DAY);
        ledger.associate(&later, id("CashBet"), id("4747")).unwrap();
    }

    #[test]
    fn set_association_is_employee_only() {
        let mut ledger = operator_ledger();
        assert_matches!(
            ledger.set_association(&ctx("user0"), addr("user0"), id("CashBet"), id("1")),
            Err(LedgerError::Authorization { .. })
        );
        assert_matches!(
            ledger.set_association(&ctx("owner"), addr("user0"), id("CashBet"), id("1")),
            Err(LedgerError::Authorization { .. })
        );
    }

    #[test]
    fn employee_scope_is_evaluated_before_the_change() {
        let mut ledger = operator_ledger();
        let owner = ctx("owner");
        let empl = ctx("empl");
        let user5 = addr("user5");

        // Unassociated account needs the ZERO scope.
        assert_matches!(
            ledger.set_association(&empl, user5, id("BadBad"), id("4446")),
            Err(LedgerError::Authorization { .. })
        );
        ledger
            .set_employee(&owner, empl.caller, Id32::ZERO, true)
            .unwrap();
        ledger
            .set_association(&empl, user5, id("BadBad"), id("4446"))
            .unwrap();
        assert_eq!(
            ledger.events().last(),
            Some(&LedgerEvent::Associate {
                user: user5,
                agent: empl.caller,
                operator_id: id("BadBad"),
                player_id: id("4446"),
            })
        );

        // Now under BadBad, out of this employee's reach until granted.
        assert_matches!(
            ledger.set_association(&empl, user5, id("BadBad"), id("4447")),
            Err(LedgerError::Authorization { .. })
        );
        ledger
            .set_employee(&owner, empl.caller, id("BadBad"), true)
            .unwrap();
        ledger
            .set_association(&empl, user5, id("BadBad"), id("4448"))
            .unwrap();
        assert_eq!(ledger.association_of(&user5), pair("BadBad", "4448"));
    }

    #[test]
    fn association_needs_no_balance() {
        let mut ledger = operator_ledger();
        let newcomer = ctx("newcomer");
        ledger.associate(&newcomer, id("Acme"), id("7")).unwrap();
        assert_eq!(ledger.balance_of(&newcomer.caller), 0);
        ledger
            .transfer(&ctx("owner"), newcomer.caller, tokens(1))
            .unwrap();
        assert_eq!(ledger.association_of(&newcomer.caller), pair("Acme", "7"));
    }
}
