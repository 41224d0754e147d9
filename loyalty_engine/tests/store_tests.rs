//! Integration tests for the persistent store, run against a live PostgreSQL instance.
//!
//! These are ignored by default. Point `LPG_TEST_DATABASE_URL` at a scratch database and run
//! `cargo test -p loyalty_engine -- --ignored` to exercise them. The schema is created on first
//! use; all test data carries randomised logins and order numbers so runs do not collide.

use lpg_common::Money;
use loyalty_engine::{
    db_types::{AccrualReply, AccrualStatus, OrderStatus, OrderTag},
    traits::{AccrualSink, RescueSource},
    PointsStore, StoreConfig, StoreError,
};
use tokio::sync::mpsc;

async fn test_store(use_luhn: bool) -> (PointsStore, mpsc::Receiver<OrderTag>) {
    let _ = env_logger::try_init();
    let url = std::env::var("LPG_TEST_DATABASE_URL")
        .expect("LPG_TEST_DATABASE_URL must point at a PostgreSQL instance");
    let (tags_tx, tags_rx) = mpsc::channel(20);
    let config = StoreConfig { connection_string: url, use_luhn, ..StoreConfig::default() };
    let store = PointsStore::connect(&config, tags_tx).await.expect("error connecting to the database");
    store.create_schema().await.expect("error creating the schema");
    (store, tags_rx)
}

fn unique_login() -> String {
    format!("user_{:x}", rand::random::<u64>())
}

fn unique_order_num() -> String {
    format!("{}", rand::random::<u64>())
}

async fn register(store: &PointsStore) -> i64 {
    store
        .register_user(&unique_login(), "digest", "salt")
        .await
        .expect("error registering a fresh user")
}

fn processed(order: &str, accrual: i64) -> AccrualReply {
    AccrualReply { order: order.into(), status: AccrualStatus::Processed, accrual: Some(accrual.into()) }
}

fn reply(order: &str, status: AccrualStatus) -> AccrualReply {
    AccrualReply { order: order.into(), status, accrual: None }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn registering_the_same_login_twice_fails() {
    let (store, _tags) = test_store(false).await;
    let login = unique_login();
    store.register_user(&login, "digest", "salt").await.unwrap();
    let err = store.register_user(&login, "digest2", "salt2").await.unwrap_err();
    assert!(matches!(err, StoreError::UserAlreadyExists), "{err}");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn duplicate_orders_report_who_owns_them() {
    let (store, mut tags) = test_store(false).await;
    let owner = register(&store).await;
    let other = register(&store).await;
    let order_num = unique_order_num();

    store.add_order(owner, &order_num).await.unwrap();
    assert_eq!(tags.try_recv().unwrap().order_num, order_num, "a fresh order must be offered to the pool");

    let err = store.add_order(owner, &order_num).await.unwrap_err();
    assert!(matches!(err, StoreError::OrderAlreadyExists), "{err}");
    let err = store.add_order(other, &order_num).await.unwrap_err();
    assert!(matches!(err, StoreError::OrderOtherUser), "{err}");
    assert!(tags.try_recv().is_err(), "duplicates must not enqueue more work");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn luhn_gate_rejects_invalid_numbers_when_enabled() {
    let (store, _tags) = test_store(true).await;
    let user = register(&store).await;

    let err = store.add_order(user, "79927398710").await.unwrap_err();
    assert!(matches!(err, StoreError::OrderLuhnCheckFailed), "{err}");

    // Build a random number with a correct check digit so reruns never collide.
    let body = format!("9{}", rand::random::<u64>());
    let check = (0..10).find(|d| loyalty_engine::helpers::luhn_valid(&format!("{body}{d}"))).unwrap();
    store.add_order(user, &format!("{body}{check}")).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn processed_reply_credits_the_balance_exactly_once() {
    let (store, _tags) = test_store(false).await;
    let user = register(&store).await;
    let order_num = unique_order_num();
    store.add_order(user, &order_num).await.unwrap();

    store.apply_accrual_response(&processed(&order_num, 20050)).await.unwrap();
    let err = store.apply_accrual_response(&processed(&order_num, 20050)).await.unwrap_err();
    assert!(matches!(err, StoreError::NoDataChanged), "{err}");

    let balance = store.balance(user).await.unwrap();
    assert_eq!(balance.current, Money::from(20050), "a duplicated reply must credit exactly once");
    assert_eq!(balance.withdrawn, Money::from(0));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn replies_about_final_orders_change_nothing() {
    let (store, _tags) = test_store(false).await;
    let user = register(&store).await;
    let order_num = unique_order_num();
    store.add_order(user, &order_num).await.unwrap();
    store.apply_accrual_response(&processed(&order_num, 72998)).await.unwrap();

    for status in [AccrualStatus::Processing, AccrualStatus::Invalid] {
        let err = store.apply_accrual_response(&reply(&order_num, status)).await.unwrap_err();
        assert!(matches!(err, StoreError::NoDataChanged), "{status:?} downgraded a final order");
    }

    let orders = store.orders_for_user(user).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Processed);
    assert_eq!(orders[0].accrual, Some(Money::from(72998)));
    assert_eq!(store.balance(user).await.unwrap().current, Money::from(72998));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn invalid_is_terminal_and_never_credits() {
    let (store, _tags) = test_store(false).await;
    let user = register(&store).await;
    let order_num = unique_order_num();
    store.add_order(user, &order_num).await.unwrap();

    store.apply_accrual_response(&reply(&order_num, AccrualStatus::Invalid)).await.unwrap();
    let err = store.apply_accrual_response(&processed(&order_num, 100)).await.unwrap_err();
    assert!(matches!(err, StoreError::NoDataChanged), "{err}");

    let orders = store.orders_for_user(user).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Invalid);
    assert_eq!(orders[0].accrual, None);
    assert_eq!(store.balance(user).await.unwrap().current, Money::from(0));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn registered_reply_is_a_no_op() {
    let (store, _tags) = test_store(false).await;
    let user = register(&store).await;
    let order_num = unique_order_num();
    store.add_order(user, &order_num).await.unwrap();

    store.apply_accrual_response(&reply(&order_num, AccrualStatus::Registered)).await.unwrap();
    let orders = store.orders_for_user(user).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::New);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn unknown_reply_status_is_an_error() {
    let (store, _tags) = test_store(false).await;
    let user = register(&store).await;
    let order_num = unique_order_num();
    store.add_order(user, &order_num).await.unwrap();

    let err = store.apply_accrual_response(&reply(&order_num, AccrualStatus::Unknown)).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownAccrualStatus(_)), "{err}");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn unhandled_orders_lists_only_non_terminal_ones() {
    let (store, _tags) = test_store(false).await;
    let user = register(&store).await;
    let fresh = unique_order_num();
    let in_flight = unique_order_num();
    let done = unique_order_num();
    let rejected = unique_order_num();
    for num in [&fresh, &in_flight, &done, &rejected] {
        store.add_order(user, num).await.unwrap();
    }
    store.apply_accrual_response(&reply(&in_flight, AccrualStatus::Processing)).await.unwrap();
    store.apply_accrual_response(&processed(&done, 100)).await.unwrap();
    store.apply_accrual_response(&reply(&rejected, AccrualStatus::Invalid)).await.unwrap();

    let unhandled = store.unhandled_orders().await.unwrap();
    assert!(unhandled.contains(&fresh));
    assert!(unhandled.contains(&in_flight));
    assert!(!unhandled.contains(&done));
    assert!(!unhandled.contains(&rejected));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn withdrawal_debits_and_records_atomically() {
    let (store, _tags) = test_store(false).await;
    let user = register(&store).await;
    let order_num = unique_order_num();
    store.add_order(user, &order_num).await.unwrap();
    store.apply_accrual_response(&processed(&order_num, 10050)).await.unwrap();

    // Insufficient funds: no debit, no withdrawals row.
    let err = store.withdraw(user, "2377225624", Money::from(15000)).await.unwrap_err();
    assert!(matches!(err, StoreError::WithdrawNotEnough), "{err}");
    assert!(store.withdrawals_for_user(user).await.unwrap().is_empty());
    assert_eq!(store.balance(user).await.unwrap().current, Money::from(10050));

    store.withdraw(user, "2377225624", Money::from_points(100)).await.unwrap();
    let balance = store.balance(user).await.unwrap();
    assert_eq!(balance.current, Money::from(50));
    assert_eq!(balance.withdrawn, Money::from_points(100));
    let withdrawals = store.withdrawals_for_user(user).await.unwrap();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].order_num, "2377225624");
    assert_eq!(withdrawals[0].sum, Money::from_points(100));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set LPG_TEST_DATABASE_URL)"]
async fn balance_stays_consistent_under_concurrent_accruals_and_duplicates() {
    let (store, _tags) = test_store(false).await;
    let user = register(&store).await;

    let mut order_nums = Vec::new();
    for _ in 0..50 {
        let num = unique_order_num();
        store.add_order(user, &num).await.unwrap();
        order_nums.push(num);
    }

    // Every order is credited concurrently, and every reply is delivered twice.
    let mut tasks = Vec::new();
    for (i, num) in order_nums.iter().enumerate() {
        for _ in 0..2 {
            let store = store.clone();
            let reply = processed(num, (i + 1) as i64);
            tasks.push(tokio::spawn(async move { store.apply_accrual_response(&reply).await }));
        }
    }
    let mut credited = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => credited += 1,
            Err(StoreError::NoDataChanged) => {},
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(credited, 50, "each order must be credited exactly once");

    let expected: i64 = (1..=50).sum();
    assert_eq!(store.balance(user).await.unwrap().current, Money::from(expected));
}
