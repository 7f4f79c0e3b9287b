//! Accounting ledger for the BlockNet NOS unit.
//!
//! A ledger instance tracks three coupled pieces of per-account state on top
//! of plain balances:
//!
//! * [`lock`] holds a single time-locked sub-balance per account that cannot be
//!   transferred or burned until it expires.
//! * [`association`] is the operator/player pair an account is bound to, plus
//!   the owner-maintained allow-list of operators.
//! * [`access`] provides owner and operator-scoped employee roles that gate every
//!   privileged write.
//!
//! [`migration`] moves an account's balance, lock and association from a
//! predecessor instance onto its successor in one step, and [`snapshot`]
//! turns an instance into a self-verifying serializable image.
//!
//! Every operation takes `&mut Ledger` and validates completely before it
//! writes, so a rejected call leaves the instance untouched.

pub mod access;
pub mod association;
pub mod balance;
pub mod events;
pub mod ledger;
pub mod lock;
pub mod migration;
pub mod snapshot;
pub mod transfer;
pub mod types;

mod error;

pub use access::AccessControlStore;
pub use association::Association;
pub use balance::Account;
pub use error::{LedgerError, LockViolation};
pub use events::LedgerEvent;
pub use ledger::{CallContext, Ledger, LedgerConfig, LedgerMeta};
pub use lock::LockState;
pub use migration::{MigrationCoordinator, MigrationLinks};
pub use snapshot::LedgerSnapshot;
pub use types::{
    format_amount, parse_amount, Address, Amount, Id32, OperatorId, PlayerId, Timestamp,
    NOS_DECIMALS, NOS_SCALE,
};
