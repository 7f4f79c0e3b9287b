//! Owner and operator-scoped employee roles.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::ledger::{traced, CallContext, Ledger};
use crate::types::{Address, OperatorId};

/// Ledger-global role state.
///
/// Employee grants are keyed by operator scope: a grant for `Id32::ZERO`
/// covers accounts that have no operator, a grant for a concrete operator
/// covers only that operator's accounts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessControlStore {
    owner: Address,
    employees: BTreeSet<(Address, OperatorId)>,
    approved_operators: BTreeSet<OperatorId>,
}

impl AccessControlStore {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            employees: BTreeSet::new(),
            approved_operators: BTreeSet::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        *caller == self.owner
    }

    /// `scope` is the target account's current operator id.
    pub fn is_employee_for(&self, caller: &Address, scope: &OperatorId) -> bool {
        self.employees.contains(&(*caller, *scope))
    }

    pub fn is_approved(&self, operator_id: &OperatorId) -> bool {
        self.approved_operators.contains(operator_id)
    }

    pub fn employees(&self) -> impl Iterator<Item = &(Address, OperatorId)> {
        self.employees.iter()
    }

    pub fn approved_operators(&self) -> impl Iterator<Item = &OperatorId> {
        self.approved_operators.iter()
    }

    pub fn require_owner(&self, caller: &Address) -> Result<(), LedgerError> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(LedgerError::unauthorized(*caller, "owner only"))
        }
    }

    pub fn require_employee_for(
        &self,
        caller: &Address,
        scope: &OperatorId,
    ) -> Result<(), LedgerError> {
        if self.is_employee_for(caller, scope) {
            Ok(())
        } else {
            Err(LedgerError::unauthorized(
                *caller,
                "not an employee for the account's operator",
            ))
        }
    }

    fn grant(&mut self, employee: Address, scope: OperatorId, allowed: bool) {
        if allowed {
            self.employees.insert((employee, scope));
        } else {
            self.employees.remove(&(employee, scope));
        }
    }

    fn approve(&mut self, operator_id: OperatorId, allowed: bool) {
        if allowed {
            self.approved_operators.insert(operator_id);
        } else {
            self.approved_operators.remove(&operator_id);
        }
    }
}

impl Ledger {
    pub fn set_owner(&mut self, ctx: &CallContext, new_owner: Address) -> Result<(), LedgerError> {
        traced("set_owner", ctx, self.access.require_owner(&ctx.caller))?;
        let previous = self.access.owner;
        self.access.owner = new_owner;
        info!(%previous, owner = %new_owner, "ownership transferred");
        self.commit(
            ctx,
            LedgerEvent::OwnerChanged {
                previous,
                owner: new_owner,
            },
        );
        Ok(())
    }

    /// Grants or revokes `employee` for accounts under `scope`. Repeating the
    /// same grant succeeds and emits again.
    pub fn set_employee(
        &mut self,
        ctx: &CallContext,
        employee: Address,
        scope: OperatorId,
        allowed: bool,
    ) -> Result<(), LedgerError> {
        traced("set_employee", ctx, self.access.require_owner(&ctx.caller))?;
        self.access.grant(employee, scope, allowed);
        info!(%employee, %scope, allowed, "employee scope updated");
        self.commit(
            ctx,
            LedgerEvent::Employee {
                employee,
                operator_id: scope,
                allowed,
            },
        );
        Ok(())
    }

    pub fn set_operator(
        &mut self,
        ctx: &CallContext,
        operator_id: OperatorId,
        allowed: bool,
    ) -> Result<(), LedgerError> {
        traced("set_operator", ctx, self.check_set_operator(ctx, &operator_id))?;
        self.access.approve(operator_id, allowed);
        info!(%operator_id, allowed, "operator approval updated");
        self.commit(
            ctx,
            LedgerEvent::Operator {
                operator_id,
                allowed,
            },
        );
        Ok(())
    }

    fn check_set_operator(
        &self,
        ctx: &CallContext,
        operator_id: &OperatorId,
    ) -> Result<(), LedgerError> {
        self.access.require_owner(&ctx.caller)?;
        // ZERO marks "no operator" and can never be an approved operator.
        if operator_id.is_zero() {
            return Err(LedgerError::AssociationInvariant);
        }
        Ok(())
    }
}
