mod common;

use moira::prelude::*;

use common::{TestRepo, setup_moira, setup_moira_with, test_lock_id};

#[test]
fn test_create_starts_new_and_unreserved() {
    let env = setup_moira();
    let fate = env.fate_store();

    let fate_id = fate.create(FateInstanceType::User).unwrap();
    let record = fate.read(fate_id).unwrap().unwrap();
    assert_eq!(record.status, Some(TStatus::New));
    assert!(record.reservation.is_none());
    assert!(record.create_time_millis.is_some());
    assert!(record.repos.is_empty());

    assert_eq!(fate.list().unwrap().len(), 1);
}

#[test]
fn test_reservation_is_exclusive() {
    let env = setup_moira();
    let fate = env.fate_store();
    let fate_id = fate.create(FateInstanceType::User).unwrap();

    let tx = fate.try_reserve(fate_id, &test_lock_id("L1")).unwrap().unwrap();
    assert!(fate.try_reserve(fate_id, &test_lock_id("L2")).unwrap().is_none());
    // not reentrant either
    assert!(fate.try_reserve(fate_id, &test_lock_id("L1")).unwrap().is_none());

    tx.unreserve().unwrap();
    let tx = fate.try_reserve(fate_id, &test_lock_id("L2")).unwrap().unwrap();
    assert_eq!(tx.reservation().lock_id().node(), "L2");
}

#[test]
fn test_missing_transaction_cannot_be_reserved() {
    let env = setup_moira();
    let fate = env.fate_store();
    let fate_id = FateId::random(FateInstanceType::User);
    assert!(fate.try_reserve(fate_id, &test_lock_id("L1")).unwrap().is_none());
    assert!(fate.read(fate_id).unwrap().is_none());
}

#[test]
fn test_push_and_pop_follow_status() {
    let env = setup_moira();
    let fate = env.fate_store();
    let fate_id = fate.create(FateInstanceType::User).unwrap();
    let tx = fate.try_reserve(fate_id, &test_lock_id("L1")).unwrap().unwrap();

    tx.push(&TestRepo::new("first")).unwrap();
    tx.set_status(TStatus::Submitted).unwrap();
    // pushing is only allowed while NEW or IN_PROGRESS
    assert!(matches!(tx.push(&TestRepo::new("nope")), Err(MoiraError::IllegalState(_))));

    tx.set_status(TStatus::InProgress).unwrap();
    tx.push(&TestRepo::new("second")).unwrap();
    tx.push(&TestRepo::new("third")).unwrap();
    assert_eq!(tx.top::<TestRepo>().unwrap(), Some(TestRepo::new("third")));

    // popping is only allowed while unwinding or done
    assert!(tx.pop().is_err());
    tx.set_status(TStatus::FailedInProgress).unwrap();
    tx.pop().unwrap();
    assert_eq!(tx.top::<TestRepo>().unwrap(), Some(TestRepo::new("second")));
    tx.pop().unwrap();
    tx.pop().unwrap();
    assert_eq!(tx.top::<TestRepo>().unwrap(), None);
    assert!(tx.pop().is_err());

    let record = fate.read(fate_id).unwrap().unwrap();
    assert!(record.repos.is_empty());
    assert_eq!(record.status, Some(TStatus::FailedInProgress));
}

#[test]
fn test_stack_has_a_maximum_depth() {
    let config = MoiraConfig {
        max_repos: 3,
        ..Default::default()
    };
    let env = setup_moira_with(config);
    let fate = env.fate_store();
    let fate_id = fate.create(FateInstanceType::Meta).unwrap();
    let tx = fate.try_reserve(fate_id, &test_lock_id("L1")).unwrap().unwrap();

    for i in 0..3 {
        tx.push(&TestRepo::new(&format!("step{i}"))).unwrap();
    }
    assert!(matches!(
        tx.push(&TestRepo::new("one too many")),
        Err(MoiraError::StackOverflow { max: 3, .. })
    ));
    assert_eq!(fate.read(fate_id).unwrap().unwrap().repos.len(), 3);
}

#[test]
fn test_delete_only_when_not_running() {
    let env = setup_moira();
    let fate = env.fate_store();
    let fate_id = fate.create(FateInstanceType::User).unwrap();

    let tx = fate.try_reserve(fate_id, &test_lock_id("L1")).unwrap().unwrap();
    tx.set_status(TStatus::InProgress).unwrap();
    assert!(tx.delete().is_err());
    assert!(fate.read(fate_id).unwrap().is_some());

    // the failed delete consumed the handle, the reservation is still held
    let held = fate.read(fate_id).unwrap().unwrap().reservation.unwrap();
    let released = fate.delete_dead_reservations(|_| false).unwrap();
    assert_eq!(released, 1);
    assert!(fate.read(fate_id).unwrap().unwrap().reservation.is_none());
    assert_eq!(held.lock_id(), &test_lock_id("L1"));

    let tx = fate.try_reserve(fate_id, &test_lock_id("L2")).unwrap().unwrap();
    tx.set_status(TStatus::Successful).unwrap();
    tx.set_tx_info(TxInfo::ReturnValue, "done").unwrap();
    assert_eq!(
        fate.read(fate_id).unwrap().unwrap().return_value.as_deref(),
        Some("done")
    );
    tx.delete().unwrap();
    assert!(fate.read(fate_id).unwrap().is_none());
}

#[test]
fn test_stolen_reservation_blocks_writes() {
    let env = setup_moira();
    let fate = env.fate_store();
    let fate_id = fate.create(FateInstanceType::User).unwrap();
    let tx = fate.try_reserve(fate_id, &test_lock_id("L1")).unwrap().unwrap();

    // the holder's lock is declared dead and someone else takes over
    assert_eq!(fate.delete_dead_reservations(|lock| lock.node() != "L1").unwrap(), 1);
    let thief = fate.try_reserve(fate_id, &test_lock_id("L2")).unwrap().unwrap();

    assert!(tx.push(&TestRepo::new("late")).is_err());
    assert!(tx.set_status(TStatus::Submitted).is_err());
    assert!(tx.unreserve().is_err());

    thief.push(&TestRepo::new("first")).unwrap();
    assert_eq!(thief.status().unwrap(), Some(TStatus::New));
}

#[test]
fn test_live_reservations_are_kept() {
    let env = setup_moira();
    let fate = env.fate_store();
    let a = fate.create(FateInstanceType::User).unwrap();
    let b = fate.create(FateInstanceType::User).unwrap();
    let _unreserved = fate.create(FateInstanceType::User).unwrap();

    let _ta = fate.try_reserve(a, &test_lock_id("alive")).unwrap().unwrap();
    let _tb = fate.try_reserve(b, &test_lock_id("dead")).unwrap().unwrap();

    let released = fate.delete_dead_reservations(|lock| lock.node() == "alive").unwrap();
    assert_eq!(released, 1);
    assert!(fate.read(a).unwrap().unwrap().reservation.is_some());
    assert!(fate.read(b).unwrap().unwrap().reservation.is_none());
}

#[test]
fn test_create_survives_an_unknown_outcome() {
    let env = setup_moira();
    let fate = env.fate_store();

    env.fate_records.inject_fault(InjectedFault::ApplyThenUnknown);
    let fate_id = fate.create(FateInstanceType::User).unwrap();
    assert_eq!(fate.read(fate_id).unwrap().unwrap().status, Some(TStatus::New));

    env.fate_records.inject_fault(InjectedFault::DropThenUnknown);
    assert!(matches!(
        fate.create(FateInstanceType::User),
        Err(MoiraError::IllegalState(_))
    ));
    assert_eq!(fate.list().unwrap().len(), 1);
}

#[test]
fn test_push_above_highest_position_is_refused() {
    let env = setup_moira();
    let fate = env.fate_store();
    let fate_id = fate.create(FateInstanceType::User).unwrap();
    fate.mutator(fate_id)
        .put_repo(u32::MAX, &TestRepo::new("last"))
        .unwrap()
        .mutate()
        .unwrap();

    let tx = fate.try_reserve(fate_id, &test_lock_id("L1")).unwrap().unwrap();
    assert!(matches!(
        tx.push(&TestRepo::new("no room")),
        Err(MoiraError::StackOverflow { .. })
    ));

    let record = fate.read(fate_id).unwrap().unwrap();
    assert_eq!(record.repos.len(), 1);
    assert_eq!(record.top_position(), Some(u32::MAX));
}
