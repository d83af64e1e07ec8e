//! Integration tests for the dispatch engine: fill-down, skips, fan-out,
//! refresh, delete and error propagation.

use std::time::{Duration, SystemTime};

use tier_cascade::backends::{BackendOp, InMemoryBackend, RecordingBackend};
use tier_cascade::metrics::{LookupOutcome, WriteReason};
use tier_cascade::{
    Backend, CacheItem, CallOptions, CascadeError, Capability, Chain, Expiry, Tier, TierSelector,
};

#[derive(Clone, Debug, PartialEq)]
struct User {
    id: u32,
    name: String,
}

impl CacheItem for User {
    const TYPE_NAME: &'static str = "User";
}

fn user(id: u32, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
    }
}

fn key(s: &str) -> String {
    s.to_string()
}

/// l1 reports `InProcess`, l2 reports `Durable`.
fn recording_pair() -> (RecordingBackend<User>, RecordingBackend<User>) {
    (
        RecordingBackend::new(),
        RecordingBackend::with_capabilities(Capability::Durable.into()),
    )
}

fn chain_of(l1: &RecordingBackend<User>, l2: &RecordingBackend<User>) -> Chain<String, User> {
    Chain::builder()
        .tier(Tier::new("l1", l1.clone()))
        .tier(Tier::new("l2", l2.clone()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_fills_down_on_miss() {
    let l1 = InMemoryBackend::<User>::new();
    let l2 = InMemoryBackend::<User>::new();
    l2.set_one("42", &user(42, "ada"), Expiry::NEVER).await.unwrap();

    let chain = Chain::builder()
        .tier(Tier::new("l1", l1.clone()))
        .tier(Tier::new("l2", l2.clone()))
        .build()
        .unwrap();

    let found = chain.head().get(&key("42"), &CallOptions::new()).await.unwrap();
    assert_eq!(found, Some(user(42, "ada")));
    assert_eq!(l1.get_one("42").await.unwrap(), Some(user(42, "ada")));

    let metrics = chain.metrics();
    assert_eq!(metrics.lookups("l1", LookupOutcome::Miss), 1);
    assert_eq!(metrics.lookups("l2", LookupOutcome::Hit), 1);
    assert_eq!(metrics.writes("l1", WriteReason::Backfill), 1);
}

#[tokio::test]
async fn test_get_without_downstream_does_not_fill() {
    let (l1, l2) = recording_pair();
    l2.store().set_one("42", &user(42, "ada"), Expiry::NEVER).await.unwrap();
    let chain = chain_of(&l1, &l2);

    let opts = CallOptions::new().downstream(false);
    let found = chain.head().get(&key("42"), &opts).await.unwrap();

    assert_eq!(found, Some(user(42, "ada")));
    assert!(l1.writes().is_empty());
}

#[tokio::test]
async fn test_miss_everywhere_returns_none() {
    let (l1, l2) = recording_pair();
    let chain = chain_of(&l1, &l2);

    let found = chain.head().get(&key("nope"), &CallOptions::new()).await.unwrap();
    assert_eq!(found, None);
    assert_eq!(l1.reads(), vec![BackendOp::GetOne("nope".to_string())]);
    assert_eq!(l2.reads(), vec![BackendOp::GetOne("nope".to_string())]);
    assert!(l1.writes().is_empty());
}

#[tokio::test]
async fn test_skip_read_applies_to_one_call_only() {
    let (l1, l2) = recording_pair();
    l1.store().set_one("7", &user(7, "stale"), Expiry::NEVER).await.unwrap();
    l2.store().set_one("7", &user(7, "fresh"), Expiry::NEVER).await.unwrap();
    let chain = chain_of(&l1, &l2);

    let opts = CallOptions::new().skip_read(TierSelector::Index(0));
    let found = chain.head().get(&key("7"), &opts).await.unwrap();
    assert_eq!(found, Some(user(7, "fresh")));
    assert!(l1.reads().is_empty());
    assert_eq!(l1.writes(), vec![BackendOp::SetOne("7".to_string())]);
    assert_eq!(chain.metrics().lookups("l1", LookupOutcome::Skip), 1);

    l1.clear_operations();
    l2.clear_operations();

    let found = chain.head().get(&key("7"), &CallOptions::new()).await.unwrap();
    assert_eq!(found, Some(user(7, "fresh")));
    assert_eq!(l1.reads(), vec![BackendOp::GetOne("7".to_string())]);
    assert!(l2.operations().is_empty());
}

#[tokio::test]
async fn test_skip_write_suppresses_backfill() {
    let (l1, l2) = recording_pair();
    l2.store().set_one("1", &user(1, "x"), Expiry::NEVER).await.unwrap();
    let chain = chain_of(&l1, &l2);

    let opts = CallOptions::new().skip_write(Capability::InProcess);
    let found = chain.head().get(&key("1"), &opts).await.unwrap();

    assert_eq!(found, Some(user(1, "x")));
    assert!(l1.writes().is_empty());
    assert_eq!(l1.store().get_one("1").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_is_local_by_default() {
    let (l1, l2) = recording_pair();
    let chain = chain_of(&l1, &l2);

    chain
        .head()
        .set(&key("5"), &user(5, "eve"), &CallOptions::new())
        .await
        .unwrap();

    assert_eq!(l1.writes(), vec![BackendOp::SetOne("5".to_string())]);
    assert!(l2.operations().is_empty());
}

#[tokio::test]
async fn test_set_downstream_writes_every_tier() {
    let (l1, l2) = recording_pair();
    let chain = chain_of(&l1, &l2);

    let opts = CallOptions::new().downstream(true);
    chain.head().set(&key("5"), &user(5, "eve"), &opts).await.unwrap();

    assert_eq!(l1.writes(), vec![BackendOp::SetOne("5".to_string())]);
    assert_eq!(l2.writes(), vec![BackendOp::SetOne("5".to_string())]);
    assert_eq!(l2.store().get_one("5").await.unwrap(), Some(user(5, "eve")));
}

#[tokio::test]
async fn test_set_downstream_honours_skip_write() {
    let (l1, l2) = recording_pair();
    let chain = chain_of(&l1, &l2);

    let opts = CallOptions::new().downstream(true).skip_write("l1");
    chain.head().set(&key("5"), &user(5, "eve"), &opts).await.unwrap();

    assert!(l1.writes().is_empty());
    assert_eq!(l2.writes(), vec![BackendOp::SetOne("5".to_string())]);
}

#[tokio::test]
async fn test_set_is_idempotent() {
    let l1 = InMemoryBackend::<User>::new();
    let chain = Chain::builder()
        .tier(Tier::new("l1", l1.clone()))
        .build()
        .unwrap();
    let opts = CallOptions::new();

    chain.head().set(&key("3"), &user(3, "bo"), &opts).await.unwrap();
    chain.head().set(&key("3"), &user(3, "bo"), &opts).await.unwrap();

    assert_eq!(l1.len().await, 1);
    assert_eq!(
        chain.head().get(&key("3"), &opts).await.unwrap(),
        Some(user(3, "bo"))
    );
}

#[tokio::test]
async fn test_delete_local_and_downstream() {
    let (l1, l2) = recording_pair();
    for backend in [&l1, &l2] {
        backend.store().set_one("9", &user(9, "z"), Expiry::NEVER).await.unwrap();
    }
    let chain = chain_of(&l1, &l2);

    chain.head().delete(&key("9"), &CallOptions::new()).await.unwrap();
    assert_eq!(l1.store().get_one("9").await.unwrap(), None);
    assert_eq!(l2.store().get_one("9").await.unwrap(), Some(user(9, "z")));

    chain
        .head()
        .delete(&key("9"), &CallOptions::new().downstream(true))
        .await
        .unwrap();
    assert_eq!(l2.store().get_one("9").await.unwrap(), None);
    assert_eq!(l2.operations(), vec![BackendOp::Delete("9".to_string())]);
}

#[tokio::test]
async fn test_refresh_reads_from_tail_and_rewrites() {
    let (l1, l2) = recording_pair();
    l1.store().set_one("8", &user(8, "old"), Expiry::NEVER).await.unwrap();
    l2.store().set_one("8", &user(8, "new"), Expiry::NEVER).await.unwrap();
    let chain = chain_of(&l1, &l2);

    let found = chain.head().refresh(&key("8"), &CallOptions::new()).await.unwrap();

    assert_eq!(found, Some(user(8, "new")));
    assert!(l1.reads().is_empty());
    assert_eq!(l1.writes(), vec![BackendOp::SetOne("8".to_string())]);
    assert_eq!(l1.store().get_one("8").await.unwrap(), Some(user(8, "new")));
}

#[tokio::test]
async fn test_refresh_on_last_tier_is_a_get() {
    let (l1, l2) = recording_pair();
    l2.store().set_one("8", &user(8, "new"), Expiry::NEVER).await.unwrap();
    let chain = chain_of(&l1, &l2);

    let tail = chain.tier(1).unwrap();
    let found = tail.refresh(&key("8"), &CallOptions::new()).await.unwrap();

    assert_eq!(found, Some(user(8, "new")));
    assert!(l1.operations().is_empty());
    assert!(l2.writes().is_empty());
}

#[tokio::test]
async fn test_calls_from_inner_tier_leave_head_alone() {
    let (l1, l2) = recording_pair();
    let chain = chain_of(&l1, &l2);

    let inner = chain.tier_by_name("l2").unwrap();
    inner
        .set(&key("1"), &user(1, "a"), &CallOptions::new().downstream(true))
        .await
        .unwrap();
    inner.get(&key("1"), &CallOptions::new()).await.unwrap();

    assert!(l1.operations().is_empty());
}

#[tokio::test]
async fn test_read_failure_aborts_the_cascade() {
    let (l1, l2) = recording_pair();
    l1.fail_when(BackendOp::is_read);
    let chain = chain_of(&l1, &l2);

    let err = chain
        .head()
        .get(&key("1"), &CallOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CascadeError::Backend { ref backend, .. } if backend == "recording"));
    assert!(l2.operations().is_empty());
}

#[tokio::test]
async fn test_backfill_failure_is_returned() {
    let (l1, l2) = recording_pair();
    l2.store().set_one("1", &user(1, "a"), Expiry::NEVER).await.unwrap();
    l1.fail_when(BackendOp::is_write);
    let chain = chain_of(&l1, &l2);

    let result = chain.head().get(&key("1"), &CallOptions::new()).await;
    assert!(matches!(result, Err(CascadeError::Backend { .. })));

    l1.stop_failing();
    let found = chain.head().get(&key("1"), &CallOptions::new()).await.unwrap();
    assert_eq!(found, Some(user(1, "a")));
}

#[tokio::test]
async fn test_collection_keys_per_tier() {
    let (l1, l2) = recording_pair();
    let chain: Chain<String, User> = Chain::builder()
        .tier(Tier::new("l1", l1.clone()))
        .tier(
            Tier::new("l2", l2.clone())
                .with_list_key("users:recent")
                .with_all_key("users"),
        )
        .build()
        .unwrap();
    let opts = CallOptions::new();

    chain.head().get_list("X", &opts).await.unwrap();
    chain.head().get_all(&opts).await.unwrap();

    assert_eq!(
        l1.reads(),
        vec![
            BackendOp::GetList("User:X".to_string()),
            BackendOp::GetAll("User".to_string()),
        ]
    );
    assert_eq!(
        l2.reads(),
        vec![
            BackendOp::GetList("users:recent".to_string()),
            BackendOp::GetAll("users".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_empty_collection_falls_through() {
    let (l1, l2) = recording_pair();
    let items = vec![user(1, "a"), user(2, "b")];
    let chain = chain_of(&l1, &l2);

    chain
        .tier(1)
        .unwrap()
        .set_list("today", &items, &CallOptions::new())
        .await
        .unwrap();

    let found = chain.head().get_list("today", &CallOptions::new()).await.unwrap();
    assert_eq!(found, items);
    assert!(l1.writes().contains(&BackendOp::SetList("User:today".to_string())));

    let found = chain.head().get_list("tomorrow", &CallOptions::new()).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_set_all_fans_out_with_downstream() {
    let (l1, l2) = recording_pair();
    let chain = chain_of(&l1, &l2);
    let items = vec![user(1, "a")];

    chain
        .head()
        .set_all(&items, &CallOptions::new().downstream(true))
        .await
        .unwrap();

    assert_eq!(l1.writes(), vec![BackendOp::SetAll("User".to_string())]);
    assert_eq!(l2.writes(), vec![BackendOp::SetAll("User".to_string())]);
    assert_eq!(l2.store().get_all("User").await.unwrap(), items);
}

#[tokio::test]
async fn test_expiry_is_computed_per_write() {
    let l1 = RecordingBackend::<User>::new();
    let now = SystemTime::now();
    let ttl = Duration::from_secs(600);
    let absolute = now + Duration::from_secs(300);

    let chain = Chain::builder()
        .tier(
            Tier::new("l1", l1.clone())
                .with_ttl(ttl)
                .with_absolute_expiration(absolute),
        )
        .build()
        .unwrap();

    chain
        .head()
        .set(&key("1"), &user(1, "a"), &CallOptions::new())
        .await
        .unwrap();

    let expiries = l1.expiries();
    assert_eq!(expiries.len(), 1);
    assert_eq!(expiries[0].deadline, Some(absolute));
}

#[tokio::test]
async fn test_ttl_only_expiry() {
    let l1 = RecordingBackend::<User>::new();
    let chain = Chain::builder()
        .tier(Tier::new("l1", l1.clone()).with_ttl(Duration::from_secs(60)))
        .build()
        .unwrap();

    let before = SystemTime::now();
    chain
        .head()
        .set(&key("1"), &user(1, "a"), &CallOptions::new())
        .await
        .unwrap();
    let after = SystemTime::now();

    let deadline = l1.expiries()[0].deadline.unwrap();
    assert!(deadline >= before + Duration::from_secs(60));
    assert!(deadline <= after + Duration::from_secs(60));
}

#[tokio::test]
async fn test_concurrent_calls_do_not_share_skips() {
    let (l1, l2) = recording_pair();
    for backend in [&l1, &l2] {
        backend.store().set_one("1", &user(1, "a"), Expiry::NEVER).await.unwrap();
    }
    let chain = Chain::builder()
        .tier(Tier::new("l1", l1.clone()))
        .tier(Tier::new("l2", l2.clone()))
        .build_shared()
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let chain = chain.clone();
        handles.push(tokio::spawn(async move {
            let opts = if i % 2 == 0 {
                CallOptions::new().skip_read(0usize).downstream(false)
            } else {
                CallOptions::new()
            };
            chain.head().get(&key("1"), &opts).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Some(user(1, "a")));
    }

    assert_eq!(l1.reads().len(), 8);
    assert_eq!(l2.reads().len(), 8);
}

/// l1 `InProcess`, l2 `Distributed`, l3 `Durable`.
fn recording_trio() -> [RecordingBackend<User>; 3] {
    [
        RecordingBackend::new(),
        RecordingBackend::with_capabilities(Capability::Distributed.into()),
        RecordingBackend::with_capabilities(Capability::Durable.into()),
    ]
}

fn chain_of_three(tiers: &[RecordingBackend<User>; 3]) -> Chain<String, User> {
    Chain::builder()
        .tier(Tier::new("l1", tiers[0].clone()))
        .tier(Tier::new("l2", tiers[1].clone()))
        .tier(Tier::new("l3", tiers[2].clone()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_refresh_rewrites_every_tier_above_the_tail() {
    let [l1, l2, l3] = recording_trio();
    l1.store().set_one("8", &user(8, "old"), Expiry::NEVER).await.unwrap();
    l2.store().set_one("8", &user(8, "old"), Expiry::NEVER).await.unwrap();
    l3.store().set_one("8", &user(8, "new"), Expiry::NEVER).await.unwrap();
    let chain = chain_of_three(&[l1.clone(), l2.clone(), l3.clone()]);

    let found = chain.head().refresh(&key("8"), &CallOptions::new()).await.unwrap();

    assert_eq!(found, Some(user(8, "new")));
    for tier in [&l1, &l2] {
        assert!(tier.reads().is_empty());
        assert_eq!(tier.writes(), vec![BackendOp::SetOne("8".to_string())]);
        assert_eq!(tier.store().get_one("8").await.unwrap(), Some(user(8, "new")));
    }
    assert!(l3.writes().is_empty());
}

#[tokio::test]
async fn test_refresh_does_not_count_passed_tiers_as_skips() {
    let [l1, l2, l3] = recording_trio();
    l3.store().set_one("8", &user(8, "new"), Expiry::NEVER).await.unwrap();
    let chain = chain_of_three(&[l1, l2, l3]);

    chain.head().refresh(&key("8"), &CallOptions::new()).await.unwrap();

    let metrics = chain.metrics();
    for tier in ["l1", "l2"] {
        assert_eq!(metrics.lookups(tier, LookupOutcome::Skip), 0);
        assert_eq!(metrics.lookups(tier, LookupOutcome::Miss), 0);
        assert_eq!(metrics.writes(tier, WriteReason::Backfill), 1);
    }
    assert_eq!(metrics.lookups("l3", LookupOutcome::Hit), 1);
}

#[tokio::test]
async fn test_backfill_runs_from_the_source_side_first() {
    let [l1, l2, l3] = recording_trio();
    l3.store().set_one("5", &user(5, "x"), Expiry::NEVER).await.unwrap();
    let chain = chain_of_three(&[l1.clone(), l2.clone(), l3.clone()]);

    // l2 is back-filled before l1, so its failure leaves l1 untouched.
    l2.fail_when(BackendOp::is_write);
    let err = chain.head().get(&key("5"), &CallOptions::new()).await.unwrap_err();
    assert!(matches!(err, CascadeError::Backend { .. }));
    assert!(l1.writes().is_empty());

    // And with l1 failing instead, l2 has already been filled.
    l2.stop_failing();
    l1.fail_when(BackendOp::is_write);
    chain.head().get(&key("5"), &CallOptions::new()).await.unwrap_err();
    assert_eq!(l2.store().get_one("5").await.unwrap(), Some(user(5, "x")));
    assert_eq!(l1.store().get_one("5").await.unwrap(), None);
}

#[tokio::test]
async fn test_skip_write_on_middle_tier_still_fills_head() {
    let [l1, l2, l3] = recording_trio();
    l3.store().set_one("5", &user(5, "x"), Expiry::NEVER).await.unwrap();
    let chain = chain_of_three(&[l1.clone(), l2.clone(), l3.clone()]);

    let opts = CallOptions::new().skip_write(TierSelector::Name("l2".to_string()));
    let found = chain.head().get(&key("5"), &opts).await.unwrap();

    assert_eq!(found, Some(user(5, "x")));
    assert_eq!(l2.reads(), vec![BackendOp::GetOne("5".to_string())]);
    assert!(l2.writes().is_empty());
    assert_eq!(l1.writes(), vec![BackendOp::SetOne("5".to_string())]);
    assert_eq!(l1.store().get_one("5").await.unwrap(), Some(user(5, "x")));
}
