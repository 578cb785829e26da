use chrono::{TimeZone, Utc};
use finder_core::model::Score;
use finder_core::storage::Store;
use std::collections::{BTreeMap, HashMap, HashSet};
use tempfile::tempdir;

#[test]
fn test_storage_smoke_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("finder.db");

    let store = Store::open(&db_path)?;
    store.init_schema()?;
    // Idempotent on an existing database.
    store.init_schema()?;

    assert!(store.last_iteration()?.is_none());
    assert!(store.previous_address_totals()?.is_empty());

    // First iteration: two addresses.
    let t1 = Utc.with_ymd_and_hms(2025, 8, 25, 12, 0, 0).unwrap();
    let mut deltas: BTreeMap<String, u64> = BTreeMap::new();
    deltas.insert("alice".into(), 3);
    deltas.insert("bob".into(), 1);
    let mut totals: HashMap<String, u64> = HashMap::new();
    totals.insert("alice".into(), 3);
    totals.insert("bob".into(), 1);
    let it1 = store.store_iteration(t1, 4, &deltas, &totals)?;

    let last = store.last_iteration()?.unwrap();
    assert_eq!(last.id, it1);
    assert_eq!(last.run_timestamp, t1);
    assert_eq!(last.submissions_fetched, 4);

    // Second iteration: totals climb, only alice moved.
    let t2 = Utc.with_ymd_and_hms(2025, 8, 25, 13, 0, 0).unwrap();
    let mut deltas2: BTreeMap<String, u64> = BTreeMap::new();
    deltas2.insert("alice".into(), 2);
    let mut totals2 = totals.clone();
    totals2.insert("alice".into(), 5);
    let it2 = store.store_iteration(t2, 2, &deltas2, &totals2)?;
    assert!(it2 > it1);

    let previous = store.previous_address_totals()?;
    assert_eq!(previous.get("alice"), Some(&5));
    // bob's total comes from the first iteration; it never decreases.
    assert_eq!(previous.get("bob"), Some(&1));

    Ok(())
}

#[test]
fn test_round_and_evaluation_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = Store::open(&dir.path().join("finder.db"))?;
    store.init_schema()?;

    let round = store.create_round("automated")?;

    // Open rounds are invisible to scoring.
    assert!(store.latest_completed_round()?.is_none());
    let open = store.round(round)?.unwrap();
    assert!(open.completed_at.is_none());
    assert_eq!(open.evaluator, "automated");

    store.insert_evaluation(round, 11, "alice", Score::Valid(80), Some("clear call"))?;
    store.insert_evaluation(round, 12, "alice", Score::Invalid, Some("not a prediction"))?;
    store.insert_evaluation(round, 13, "bob", Score::Valid(40), None)?;

    store.complete_round(round)?;
    let completed = store.latest_completed_round()?.unwrap();
    assert_eq!(completed.id, round);
    assert!(completed.completed_at.is_some());

    let evals = store.round_evaluations(round)?;
    assert_eq!(evals.len(), 3);
    // Ordered by submission id.
    assert_eq!(
        evals.iter().map(|e| e.submission_id).collect::<Vec<_>>(),
        vec![11, 12, 13]
    );
    assert_eq!(evals[1].score, Score::Invalid);
    assert_eq!(evals[1].rationale.as_deref(), Some("not a prediction"));

    let seen = store.evaluated_submission_ids()?;
    assert!(seen.contains(&11) && seen.contains(&12) && seen.contains(&13));
    assert!(!seen.contains(&99));

    let stats = store.stats()?;
    assert_eq!(stats.total_evaluations, 3);
    assert_eq!(stats.invalid_evaluations, 1);
    assert_eq!(stats.completed_rounds, 1);
    // Average ignores the invalid sentinel: (80 + 40) / 2.
    assert!((stats.average_valid_score - 60.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_reconcile_finders_deactivates_without_deleting() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = Store::open(&dir.path().join("finder.db"))?;
    store.init_schema()?;

    let t = Utc.with_ymd_and_hms(2025, 8, 26, 0, 0, 0).unwrap();
    let deltas: BTreeMap<String, u64> = [("alice".to_string(), 1)].into();
    let totals: HashMap<String, u64> = [("alice".to_string(), 1)].into();
    let it1 = store.store_iteration(t, 1, &deltas, &totals)?;

    let active: HashSet<String> = ["alice".to_string()].into();
    let permitted = vec!["alice".to_string(), "bob".to_string()];
    store.reconcile_finders(it1, &active, &permitted)?;

    let finders = store.finders()?;
    assert_eq!(finders.len(), 2);
    let alice = finders.iter().find(|f| f.address == "alice").unwrap();
    assert!(alice.active && alice.has_permission);
    assert_eq!(alice.last_active_iteration_id, Some(it1));
    let bob = finders.iter().find(|f| f.address == "bob").unwrap();
    assert!(!bob.active && bob.has_permission);
    assert_eq!(bob.last_active_iteration_id, None);

    // Alice loses permission: the row stays, flags drop, history remains.
    let it2 = store.store_iteration(
        Utc.with_ymd_and_hms(2025, 8, 26, 1, 0, 0).unwrap(),
        0,
        &BTreeMap::new(),
        &totals,
    )?;
    store.reconcile_finders(it2, &HashSet::new(), &["bob".to_string()])?;

    let finders = store.finders()?;
    assert_eq!(finders.len(), 2);
    let alice = finders.iter().find(|f| f.address == "alice").unwrap();
    assert!(!alice.active && !alice.has_permission);
    assert_eq!(alice.last_active_iteration_id, Some(it1));

    Ok(())
}
