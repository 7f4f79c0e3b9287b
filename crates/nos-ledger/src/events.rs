use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, OperatorId, PlayerId, Timestamp};

/// Domain events appended to a ledger instance's log, one per committed
/// operation (migration appends several, split across both instances).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Transfer {
        from: Address,
        to: Address,
        value: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: Amount,
    },
    Burn {
        owner: Address,
        value: Amount,
    },
    LockIncreased {
        user: Address,
        amount: Amount,
        expiry: Timestamp,
    },
    LockDecreased {
        user: Address,
        employee: Address,
        amount: Amount,
        expiry: Timestamp,
    },
    Associate {
        user: Address,
        agent: Address,
        operator_id: OperatorId,
        player_id: PlayerId,
    },
    Employee {
        employee: Address,
        operator_id: OperatorId,
        allowed: bool,
    },
    Operator {
        operator_id: OperatorId,
        allowed: bool,
    },
    OwnerChanged {
        previous: Address,
        owner: Address,
    },
    MigrateFrom {
        source: Address,
    },
    MigrateTo {
        target: Address,
    },
    Vacate {
        owner: Address,
        value: Amount,
    },
    OptIn {
        owner: Address,
        value: Amount,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::Transfer { .. } => "Transfer",
            LedgerEvent::Approval { .. } => "Approval",
            LedgerEvent::Burn { .. } => "Burn",
            LedgerEvent::LockIncreased { .. } => "LockIncreased",
            LedgerEvent::LockDecreased { .. } => "LockDecreased",
            LedgerEvent::Associate { .. } => "Associate",
            LedgerEvent::Employee { .. } => "Employee",
            LedgerEvent::Operator { .. } => "Operator",
            LedgerEvent::OwnerChanged { .. } => "OwnerChanged",
            LedgerEvent::MigrateFrom { .. } => "MigrateFrom",
            LedgerEvent::MigrateTo { .. } => "MigrateTo",
            LedgerEvent::Vacate { .. } => "Vacate",
            LedgerEvent::OptIn { .. } => "OptIn",
        }
    }
}
