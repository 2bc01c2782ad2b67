mod common;

use std::sync::Arc;

use moira::prelude::*;
use uuid::Uuid;

use common::{TestRepo, test_lock_id};

fn store() -> Arc<dyn RecordStore> {
    Arc::new(MemRecordStore::new())
}

fn mutator(store: &Arc<dyn RecordStore>, fate_id: FateId) -> FateMutator {
    FateMutator::new(Arc::clone(store), fate_id)
}

fn row_count(store: &Arc<dyn RecordStore>) -> usize {
    dump_store(&**store, &ScanRange::all()).unwrap().num_rows()
}

#[test]
fn test_put_repo_never_overwrites_a_position() {
    let store = store();
    let fate_id = FateId::from(FateInstanceType::from_namespace_or_table_name("ns.table"), Uuid::new_v4());

    for position in [100, 99, 98] {
        mutator(&store, fate_id)
            .put_repo(position, &TestRepo::new("test"))
            .unwrap()
            .mutate()
            .unwrap();
    }

    for position in [98, 99] {
        let result = mutator(&store, fate_id)
            .put_repo(position, &TestRepo::new("test"))
            .unwrap()
            .mutate();
        assert!(
            matches!(result, Err(MoiraError::IllegalState(_))),
            "repo at {position} already exists and must not be written again"
        );
    }

    let record = FateStore::new(Arc::clone(&store), 100).read(fate_id).unwrap().unwrap();
    let positions: Vec<u32> = record.repos.iter().map(|(pos, _)| *pos).collect();
    assert_eq!(positions, vec![100, 99, 98]);
    assert_eq!(record.top::<TestRepo>().unwrap(), Some(TestRepo::new("test")));
}

#[test]
fn test_require_status_on_missing_record() {
    let store = store();
    let fate_id = FateId::random(FateInstanceType::User);

    // every status listed, but the status column is absent
    let result = mutator(&store, fate_id)
        .require_status(&TStatus::ALL)
        .put_status(TStatus::New)
        .mutate();
    assert!(matches!(result, Err(MoiraError::IllegalState(_))));
    assert_eq!(row_count(&store), 0);

    let status = mutator(&store, fate_id)
        .require_status(&TStatus::ALL)
        .put_status(TStatus::New)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Rejected);
    assert_eq!(row_count(&store), 0);
}

#[test]
fn test_require_status_transitions() {
    let store = store();
    let fate_id = FateId::random(FateInstanceType::User);

    // no statuses means the status column must be absent
    let status = mutator(&store, fate_id)
        .require_status(&[])
        .put_status(TStatus::New)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Accepted);

    assert!(
        mutator(&store, fate_id)
            .require_status(&[])
            .put_status(TStatus::New)
            .mutate()
            .is_err()
    );
    let status = mutator(&store, fate_id)
        .require_status(&[])
        .put_status(TStatus::New)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Rejected);

    let status = mutator(&store, fate_id)
        .require_status(&[TStatus::New])
        .put_status(TStatus::Submitted)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Accepted);

    // none of these is the current status
    assert!(
        mutator(&store, fate_id)
            .require_status(&[TStatus::New, TStatus::Unknown])
            .put_status(TStatus::Submitted)
            .mutate()
            .is_err()
    );
    let status = mutator(&store, fate_id)
        .require_status(&[TStatus::New, TStatus::Unknown])
        .put_status(TStatus::Submitted)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Rejected);

    let status = mutator(&store, fate_id)
        .require_status(&[TStatus::Unknown, TStatus::Submitted])
        .put_status(TStatus::InProgress)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Accepted);

    let status = mutator(&store, fate_id)
        .require_status(&[TStatus::InProgress])
        .put_status(TStatus::FailedInProgress)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Accepted);

    let record = FateStore::new(Arc::clone(&store), 100).read(fate_id).unwrap().unwrap();
    assert_eq!(record.status, Some(TStatus::FailedInProgress));
}

#[test]
fn test_reservations() {
    let store = store();
    let fate_id = FateId::random(FateInstanceType::User);
    let lock_id = test_lock_id("L1");
    let reservation = FateReservation::from(lock_id.clone(), Uuid::new_v4());
    let wrong = FateReservation::from(lock_id, Uuid::new_v4());

    let try_mutate = |m: FateMutator| m.try_mutate().unwrap();

    // reserving is the only thing that can happen first
    assert_eq!(try_mutate(mutator(&store, fate_id).put_unreserve_tx(&reservation)), MutationStatus::Rejected);
    assert_eq!(try_mutate(mutator(&store, fate_id).put_reserved_tx(&reservation)), MutationStatus::Accepted);

    // already reserved, by anyone including the holder
    assert_eq!(try_mutate(mutator(&store, fate_id).put_reserved_tx(&wrong)), MutationStatus::Rejected);
    assert_eq!(try_mutate(mutator(&store, fate_id).put_reserved_tx(&reservation)), MutationStatus::Rejected);

    assert_eq!(try_mutate(mutator(&store, fate_id).put_unreserve_tx(&wrong)), MutationStatus::Rejected);
    assert_eq!(try_mutate(mutator(&store, fate_id).put_unreserve_tx(&reservation)), MutationStatus::Accepted);
    assert_eq!(try_mutate(mutator(&store, fate_id).put_unreserve_tx(&reservation)), MutationStatus::Rejected);
}

#[test]
fn test_require_reserved_gates_other_writes() {
    let store = store();
    let fate_id = FateId::random(FateInstanceType::Meta);
    let reservation = FateReservation::new(test_lock_id("L1"));
    let other = FateReservation::new(test_lock_id("L2"));

    mutator(&store, fate_id)
        .require_absent()
        .put_status(TStatus::New)
        .put_reserved_tx(&reservation)
        .mutate()
        .unwrap();

    let status = mutator(&store, fate_id)
        .require_reserved(&other)
        .put_status(TStatus::Submitted)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Rejected);

    let status = mutator(&store, fate_id)
        .require_reserved(&reservation)
        .put_status(TStatus::Submitted)
        .put_name("compact")
        .put_auto_clean(true)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Accepted);

    let record = FateStore::new(Arc::clone(&store), 100).read(fate_id).unwrap().unwrap();
    assert_eq!(record.status, Some(TStatus::Submitted));
    assert_eq!(record.name.as_deref(), Some("compact"));
    assert_eq!(record.auto_clean, Some(true));
    assert_eq!(record.reservation, Some(reservation));
}

#[test]
fn test_rejected_mutation_writes_nothing() {
    let store = store();
    let fate_id = FateId::random(FateInstanceType::User);

    // the repo write would be fine, the status condition is not
    let status = mutator(&store, fate_id)
        .require_status(&[TStatus::InProgress])
        .put_repo(1, &TestRepo::new("first"))
        .unwrap()
        .put_exception("boom")
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Rejected);
    assert_eq!(row_count(&store), 0);
}

#[test]
fn test_empty_mutation_is_an_error() {
    let store = store();
    let fate_id = FateId::random(FateInstanceType::User);
    let result = mutator(&store, fate_id).require_status(&[TStatus::New]).try_mutate();
    assert!(matches!(result, Err(MoiraError::IllegalState(_))));
}

#[test]
fn test_unknown_outcome_is_verified_by_reading_back() {
    let mem = Arc::new(MemRecordStore::new());
    let store: Arc<dyn RecordStore> = mem.clone();
    let fate_id = FateId::random(FateInstanceType::User);

    mem.inject_fault(InjectedFault::ApplyThenUnknown);
    let status = mutator(&store, fate_id)
        .require_status(&[])
        .put_status(TStatus::New)
        .try_mutate_verified(|r| r.is_some_and(|r| r.status == Some(TStatus::New)))
        .unwrap();
    assert_eq!(status, MutationStatus::Accepted);

    mem.inject_fault(InjectedFault::DropThenUnknown);
    let status = mutator(&store, fate_id)
        .require_status(&[TStatus::New])
        .put_status(TStatus::Submitted)
        .try_mutate_verified(|r| r.is_some_and(|r| r.status == Some(TStatus::Submitted)))
        .unwrap();
    assert_eq!(status, MutationStatus::Rejected);

    // without a verifier the store's answer is passed through
    mem.inject_fault(InjectedFault::DropThenUnknown);
    let status = mutator(&store, fate_id)
        .require_status(&[TStatus::New])
        .put_status(TStatus::Submitted)
        .try_mutate()
        .unwrap();
    assert_eq!(status, MutationStatus::Unknown);
}

#[test]
fn test_delete_removes_the_record() {
    let store = store();
    let fate_id = FateId::random(FateInstanceType::User);
    mutator(&store, fate_id)
        .require_absent()
        .put_status(TStatus::Successful)
        .put_repo(1, &TestRepo::new("only"))
        .unwrap()
        .mutate()
        .unwrap();
    assert!(row_count(&store) > 0);

    mutator(&store, fate_id)
        .require_status(&[TStatus::Successful])
        .delete()
        .mutate()
        .unwrap();
    assert_eq!(row_count(&store), 0);
    assert!(store.read(&fate_id.canonical()).unwrap().is_none());
}
