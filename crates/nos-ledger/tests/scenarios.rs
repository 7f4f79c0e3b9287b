//! End-to-end flows across the public API of a pair of ledger instances.

use assert_matches::assert_matches;
use nos_ledger::{
    Address, CallContext, Id32, Ledger, LedgerConfig, LedgerError, LedgerEvent,
    MigrationCoordinator, Timestamp, NOS_SCALE,
};

const NOW: Timestamp = 1_700_000_000;
const DAY: Timestamp = 86_400;

fn addr(label: &str) -> Address {
    Address::derive(label.as_bytes())
}

fn at(label: &str) -> CallContext {
    CallContext::new(addr(label), NOW)
}

fn tokens(n: u64) -> u64 {
    n * NOS_SCALE
}

fn op(text: &str) -> Id32 {
    Id32::from_text(text).unwrap()
}

fn instance(label: &str, supply: u64) -> Ledger {
    Ledger::new(LedgerConfig {
        address: addr(label),
        owner: addr("owner"),
        name: "NOS Coin".into(),
        symbol: "NOS".into(),
        initial_supply: supply,
    })
}

fn funded(users: &[(&str, u64)]) -> Ledger {
    let mut ledger = instance("nos-1", tokens(430_000_000));
    for (user, amount) in users {
        ledger
            .transfer(&at("owner"), addr(user), tokens(*amount))
            .unwrap();
    }
    ledger
}

#[test]
fn locked_thousand_leaves_four_thousand_transferable() {
    let mut ledger = funded(&[("user0", 5000)]);
    let user = at("user0");
    assert_eq!(ledger.balance_of(&user.caller), 500_000_000_000);

    ledger
        .increase_lock(&user, 100_000_000_000, NOW + 2_592_000)
        .unwrap();

    let before = ledger.snapshot();
    assert_matches!(
        ledger.transfer(&user, addr("user1"), tokens(4001)),
        Err(LedgerError::InsufficientBalance { .. })
    );
    assert_eq!(ledger.snapshot(), before);

    ledger.transfer(&user, addr("user1"), tokens(1)).unwrap();
    assert_eq!(ledger.balance_of(&user.caller), tokens(4999));
}

#[test]
fn allowance_must_be_zeroed_before_replacing() {
    let mut ledger = funded(&[("user0", 5000)]);
    let user = at("user0");
    ledger.approve(&user, addr("user1"), tokens(5000)).unwrap();
    assert_matches!(
        ledger.approve(&user, addr("user1"), tokens(4000)),
        Err(LedgerError::AllowanceInvariant { .. })
    );
}

#[test]
fn player_association_freezes_under_lock_but_not_for_employees() {
    let mut ledger = funded(&[("user0", 5000)]);
    let owner = at("owner");
    let user = at("user0");
    ledger.set_operator(&owner, op("CashBet"), true).unwrap();
    ledger
        .set_employee(&owner, addr("empl"), op("CashBet"), true)
        .unwrap();

    ledger.associate(&user, op("CashBet"), op("4242")).unwrap();
    let association = ledger.association_of(&user.caller);
    assert_eq!(association.operator_id.to_string(), "CashBet");
    assert_eq!(association.player_id.to_string(), "4242");

    ledger.associate(&user, op("CashBet"), op("4243")).unwrap();
    ledger
        .increase_lock(&user, tokens(1000), NOW + 30 * DAY)
        .unwrap();
    assert_matches!(
        ledger.associate(&user, op("CashBet"), op("4244")),
        Err(LedgerError::LockInvariant { .. })
    );
    ledger
        .set_association(&at("empl"), user.caller, op("CashBet"), op("4244"))
        .unwrap();
    assert_eq!(
        ledger.association_of(&user.caller).player_id,
        op("4244")
    );
}

#[test]
fn employee_reach_grows_with_each_scope_grant() {
    let mut ledger = funded(&[("user0", 3000), ("user1", 3000), ("user2", 3000)]);
    let owner = at("owner");
    let empl = at("empl");
    for name in ["CashBet", "Acme"] {
        ledger.set_operator(&owner, op(name), true).unwrap();
    }
    ledger
        .associate(&at("user1"), op("CashBet"), op("1"))
        .unwrap();
    ledger.associate(&at("user2"), op("Acme"), op("2")).unwrap();
    let exp = NOW + 30 * DAY;
    for user in ["user0", "user1", "user2"] {
        ledger.increase_lock(&at(user), tokens(1000), exp).unwrap();
    }

    let reachable = |ledger: &mut Ledger, user: &str, amount: u64| {
        ledger
            .decrease_lock(&empl, addr(user), tokens(amount), exp)
            .is_ok()
    };

    assert!(!reachable(&mut ledger, "user0", 900));
    assert!(!reachable(&mut ledger, "user1", 900));
    assert!(!reachable(&mut ledger, "user2", 900));

    ledger
        .set_employee(&owner, empl.caller, Id32::ZERO, true)
        .unwrap();
    assert!(reachable(&mut ledger, "user0", 900));
    assert!(!reachable(&mut ledger, "user1", 900));
    assert!(!reachable(&mut ledger, "user2", 900));

    ledger
        .set_employee(&owner, empl.caller, op("CashBet"), true)
        .unwrap();
    assert!(reachable(&mut ledger, "user0", 800));
    assert!(reachable(&mut ledger, "user1", 800));
    assert!(!reachable(&mut ledger, "user2", 800));

    ledger
        .set_employee(&owner, empl.caller, op("Acme"), true)
        .unwrap();
    assert!(reachable(&mut ledger, "user2", 700));

    ledger
        .set_employee(&owner, empl.caller, Id32::ZERO, false)
        .unwrap();
    assert!(!reachable(&mut ledger, "user0", 600));
    assert!(reachable(&mut ledger, "user1", 600));
}

#[test]
fn full_migration_drains_the_predecessor() {
    let users = [
        ("user0", 5000),
        ("user1", 3000),
        ("user2", 2000),
        ("user3", 1000),
        ("user4", 1000),
    ];
    let mut v1 = funded(&users);
    let mut v2 = instance("nos-2", 0);
    let owner = at("owner");
    v2.set_migrate_from(&owner, v1.address()).unwrap();
    v1.set_migrate_to(&owner, v2.address()).unwrap();

    v1.increase_lock(&at("user0"), tokens(2000), NOW + 30 * DAY)
        .unwrap();

    let combined = v1.total_supply() + v2.total_supply();
    for holder in ["user2", "owner", "user0", "user1"] {
        let caller = at(holder);
        let before = v1.balance_of(&caller.caller);
        let receipt = MigrationCoordinator::new(&mut v1, &mut v2)
            .opt_in(&caller)
            .unwrap();
        assert_eq!(
            receipt.first(),
            Some(&LedgerEvent::Vacate {
                owner: caller.caller,
                value: before,
            })
        );
        assert_eq!(v1.balance_of(&caller.caller), 0);
        assert_eq!(v1.total_supply() + v2.total_supply(), combined);
    }
    assert_eq!(v2.locked_value_of(&addr("user0"), NOW), tokens(2000));

    // user4 hands its balance to user3 on the old instance; user3 migrates both.
    v1.transfer(&at("user4"), addr("user3"), tokens(1000)).unwrap();
    MigrationCoordinator::new(&mut v1, &mut v2)
        .opt_in(&at("user3"))
        .unwrap();

    assert_eq!(v1.total_supply(), 0);
    assert_eq!(v2.total_supply(), tokens(430_000_000));
    assert_eq!(v2.balance_of(&addr("user3")), tokens(2000));
    v1.check_invariants(NOW).unwrap();
    v2.check_invariants(NOW).unwrap();
}
