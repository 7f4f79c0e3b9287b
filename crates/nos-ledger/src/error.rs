use thiserror::Error;

use crate::types::{Address, Amount, OperatorId};

/// Canonical error type returned by every ledger operation.
///
/// A returned error always means the operation was rejected as a whole and
/// the ledger was left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Caller lacks the owner role or the employee scope the call needs.
    #[error("{caller} is not authorized: {reason}")]
    Authorization {
        caller: Address,
        reason: &'static str,
    },

    /// Amount exceeds the unlocked balance or the spender's allowance.
    #[error("insufficient balance for {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: Address,
        requested: Amount,
        available: Amount,
    },

    /// Lock amount or expiry moved in a disallowed direction.
    #[error("lock invariant violated for {account}: {violation}")]
    LockInvariant {
        account: Address,
        violation: LockViolation,
    },

    /// Operator cleared while a player id is still set.
    #[error("operator id cannot be empty while player id is set")]
    AssociationInvariant,

    /// Allowance has to be reset to zero before taking a new value.
    #[error("allowance for {spender} on {owner} is {current}; reset it to zero first")]
    AllowanceInvariant {
        owner: Address,
        spender: Address,
        current: Amount,
    },

    #[error("operator {operator_id} is not approved")]
    UnapprovedOperator { operator_id: OperatorId },

    /// Migration invoked before both links are configured, or with nothing to move.
    #[error("migration rejected: {0}")]
    MigrationState(&'static str),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Stored state root does not match the recomputed one.
    #[error("snapshot root mismatch: stored {stored}, computed {computed}")]
    SnapshotMismatch { stored: String, computed: String },

    #[error("ledger invariant broken: {0}")]
    InvariantBroken(String),
}

/// Which lock rule a rejected `increase_lock`/`decrease_lock`/`associate` hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockViolation {
    #[error("lock amount exceeds balance")]
    ExceedsBalance,
    #[error("lock expiry must be in the future")]
    ExpiryNotInFuture,
    #[error("lock amount cannot shrink")]
    AmountShrinks,
    #[error("lock expiry cannot move earlier")]
    ExpiryShortens,
    #[error("lock amount cannot grow")]
    AmountGrows,
    #[error("lock expiry cannot move later")]
    ExpiryExtends,
    #[error("lock is unchanged")]
    Unchanged,
    #[error("lock has already expired")]
    AlreadyExpired,
    #[error("association is frozen while the lock is active")]
    AssociationFrozen,
}

impl LedgerError {
    pub(crate) fn lock(account: Address, violation: LockViolation) -> Self {
        LedgerError::LockInvariant { account, violation }
    }

    pub(crate) fn unauthorized(caller: Address, reason: &'static str) -> Self {
        LedgerError::Authorization { caller, reason }
    }
}
