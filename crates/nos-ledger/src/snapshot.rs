use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::access::AccessControlStore;
use crate::balance::Account;
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::ledger::{Ledger, LedgerMeta};
use crate::migration::MigrationLinks;
use crate::types::{Address, Amount, Timestamp};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllowanceEntry {
    pub owner: Address,
    pub spender: Address,
    pub value: Amount,
}

/// Serializable image of one ledger instance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: LedgerMeta,
    pub access: AccessControlStore,
    pub links: MigrationLinks,
    pub total_supply: Amount,
    pub accounts: BTreeMap<Address, Account>,
    pub allowances: Vec<AllowanceEntry>,
    pub events: Vec<LedgerEvent>,
    #[serde(with = "hex_root")]
    pub state_root: [u8; 32],
}

impl LedgerSnapshot {
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }
}

impl Ledger {
    pub fn snapshot(&self) -> LedgerSnapshot {
        let allowances = self
            .allowances
            .iter()
            .map(|((owner, spender), value)| AllowanceEntry {
                owner: *owner,
                spender: *spender,
                value: *value,
            })
            .collect::<Vec<_>>();
        let state_root = compute_state_root(
            &self.meta,
            &self.access,
            &self.links,
            self.total_supply,
            &self.accounts,
            &allowances,
            &self.events,
        );
        LedgerSnapshot {
            meta: self.meta.clone(),
            access: self.access.clone(),
            links: self.links,
            total_supply: self.total_supply,
            accounts: self.accounts.clone(),
            allowances,
            events: self.events.clone(),
            state_root,
        }
    }

    /// Restores an instance, rejecting images whose root or invariants do not
    /// hold at `now`.
    pub fn from_snapshot(snapshot: LedgerSnapshot, now: Timestamp) -> Result<Self, LedgerError> {
        let computed = compute_state_root(
            &snapshot.meta,
            &snapshot.access,
            &snapshot.links,
            snapshot.total_supply,
            &snapshot.accounts,
            &snapshot.allowances,
            &snapshot.events,
        );
        if computed != snapshot.state_root {
            return Err(LedgerError::SnapshotMismatch {
                stored: hex::encode(snapshot.state_root),
                computed: hex::encode(computed),
            });
        }
        let allowances = snapshot
            .allowances
            .into_iter()
            .map(|entry| ((entry.owner, entry.spender), entry.value))
            .collect();
        let ledger = Ledger {
            meta: snapshot.meta,
            access: snapshot.access,
            accounts: snapshot.accounts,
            allowances,
            total_supply: snapshot.total_supply,
            links: snapshot.links,
            events: snapshot.events,
        };
        ledger.check_invariants(now)?;
        Ok(ledger)
    }
}

fn compute_state_root(
    meta: &LedgerMeta,
    access: &AccessControlStore,
    links: &MigrationLinks,
    total_supply: Amount,
    accounts: &BTreeMap<Address, Account>,
    allowances: &[AllowanceEntry],
    events: &[LedgerEvent],
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();

    let mut hasher = Sha256::new();
    hasher.update(b"meta");
    hasher.update(meta.address.as_bytes());
    hasher.update(meta.name.as_bytes());
    hasher.update([0u8]);
    hasher.update(meta.symbol.as_bytes());
    hasher.update([0u8]);
    hasher.update(meta.decimals.to_le_bytes());
    hasher.update(meta.height.to_le_bytes());
    hasher.update(meta.timestamp.to_le_bytes());
    hasher.update(total_supply.to_le_bytes());
    leaves.push(hasher.finalize().into());

    let mut hasher = Sha256::new();
    hasher.update(b"link");
    for link in [links.migrate_from, links.migrate_to] {
        match link {
            Some(address) => {
                hasher.update([1u8]);
                hasher.update(address.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }
    leaves.push(hasher.finalize().into());

    let mut hasher = Sha256::new();
    hasher.update(b"role");
    hasher.update(access.owner().as_bytes());
    for (employee, scope) in access.employees() {
        hasher.update(b"empl");
        hasher.update(employee.as_bytes());
        hasher.update(scope.as_bytes());
    }
    for operator in access.approved_operators() {
        hasher.update(b"oper");
        hasher.update(operator.as_bytes());
    }
    leaves.push(hasher.finalize().into());

    for (address, account) in accounts {
        let mut hasher = Sha256::new();
        hasher.update(b"acct");
        hasher.update(address.as_bytes());
        hasher.update(account.balance.to_le_bytes());
        hasher.update(account.lock.amount.to_le_bytes());
        hasher.update(account.lock.expiry.to_le_bytes());
        hasher.update(account.association.operator_id.as_bytes());
        hasher.update(account.association.player_id.as_bytes());
        leaves.push(hasher.finalize().into());
    }
    for entry in allowances {
        let mut hasher = Sha256::new();
        hasher.update(b"allow");
        hasher.update(entry.owner.as_bytes());
        hasher.update(entry.spender.as_bytes());
        hasher.update(entry.value.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (index, event) in events.iter().enumerate() {
        leaves.push(event_leaf(index as u64, event));
    }
    build_merkle(leaves)
}

fn event_leaf(index: u64, event: &LedgerEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"evnt");
    hasher.update(index.to_le_bytes());
    hasher.update(event.name().as_bytes());
    hasher.update([0u8]);
    match event {
        LedgerEvent::Transfer { from, to, value } => {
            hasher.update(from.as_bytes());
            hasher.update(to.as_bytes());
            hasher.update(value.to_le_bytes());
        }
        LedgerEvent::Approval {
            owner,
            spender,
            value,
        } => {
            hasher.update(owner.as_bytes());
            hasher.update(spender.as_bytes());
            hasher.update(value.to_le_bytes());
        }
        LedgerEvent::Burn { owner, value }
        | LedgerEvent::Vacate { owner, value }
        | LedgerEvent::OptIn { owner, value } => {
            hasher.update(owner.as_bytes());
            hasher.update(value.to_le_bytes());
        }
        LedgerEvent::LockIncreased {
            user,
            amount,
            expiry,
        } => {
            hasher.update(user.as_bytes());
            hasher.update(amount.to_le_bytes());
            hasher.update(expiry.to_le_bytes());
        }
        LedgerEvent::LockDecreased {
            user,
            employee,
            amount,
            expiry,
        } => {
            hasher.update(user.as_bytes());
            hasher.update(employee.as_bytes());
            hasher.update(amount.to_le_bytes());
            hasher.update(expiry.to_le_bytes());
        }
        LedgerEvent::Associate {
            user,
            agent,
            operator_id,
            player_id,
        } => {
            hasher.update(user.as_bytes());
            hasher.update(agent.as_bytes());
            hasher.update(operator_id.as_bytes());
            hasher.update(player_id.as_bytes());
        }
        LedgerEvent::Employee {
            employee,
            operator_id,
            allowed,
        } => {
            hasher.update(employee.as_bytes());
            hasher.update(operator_id.as_bytes());
            hasher.update([u8::from(*allowed)]);
        }
        LedgerEvent::Operator {
            operator_id,
            allowed,
        } => {
            hasher.update(operator_id.as_bytes());
            hasher.update([u8::from(*allowed)]);
        }
        LedgerEvent::OwnerChanged { previous, owner } => {
            hasher.update(previous.as_bytes());
            hasher.update(owner.as_bytes());
        }
        LedgerEvent::MigrateFrom { source: linked } | LedgerEvent::MigrateTo { target: linked } => {
            hasher.update(linked.as_bytes());
        }
    }
    hasher.finalize().into()
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"nos-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod hex_root {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(root: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(root))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(&s).map_err(de::Error::custom)?;
        raw.try_into()
            .map_err(|_| de::Error::custom("state root must be 32 bytes"))
    }
}
