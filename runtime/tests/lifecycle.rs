//! End-to-end lifecycle coordination tests.
//!
//! Wires the intake path, the fulfillment listener, and the reconciliation
//! scheduler together over in-memory collaborators and drives orders through
//! the full `Init → Paid → Brewing → Brewed → Taken` lifecycle.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use brewline_core::{
    EventBus, Money, OrderStatus, OrderStore, WORK_COMPLETED_TOPIC, WorkEvent, WorkEventKind,
    WorkerId,
};
use brewline_runtime::{
    BulkheadConfig, CircuitBreakerConfig, FulfillmentListener, OrderClient, OrderIntake,
    ReconciliationScheduler, ResilienceGate, TrackingSet,
};
use brewline_testing::mocks::{InMemoryEventBus, InMemoryOrderStore};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: Arc<InMemoryOrderStore>,
    bus: Arc<InMemoryEventBus>,
    tracking: TrackingSet,
    intake: OrderIntake,
    scheduler: ReconciliationScheduler,
}

fn harness() -> Harness {
    brewline_testing::init_tracing();
    let store = Arc::new(InMemoryOrderStore::new());
    let bus = Arc::new(InMemoryEventBus::new());
    let tracking = TrackingSet::new();

    let intake = OrderIntake::new(
        Arc::clone(&store) as Arc<dyn OrderStore>,
        Arc::clone(&bus) as Arc<dyn EventBus>,
        tracking.clone(),
    );

    let gate = Arc::new(ResilienceGate::new(
        "order",
        CircuitBreakerConfig::builder()
            .window_size(5)
            .failure_threshold(0.5)
            .min_calls(100) // headroom: these tests exercise flow, not the breaker
            .build(),
        BulkheadConfig::builder()
            .max_concurrent(4)
            .max_wait(Duration::from_millis(200))
            .build(),
    ));
    let client = OrderClient::new(Arc::clone(&store) as Arc<dyn OrderStore>, gate);
    let scheduler =
        ReconciliationScheduler::new(tracking.clone(), client, Duration::from_millis(20));

    Harness {
        store,
        bus,
        tracking,
        intake,
        scheduler,
    }
}

fn spawn_listener(h: &Harness) -> tokio::task::JoinHandle<()> {
    let listener = FulfillmentListener::new(
        Arc::clone(&h.store) as Arc<dyn OrderStore>,
        Arc::clone(&h.bus) as Arc<dyn EventBus>,
        WorkerId::new("barista-1"),
    );
    tokio::spawn(async move {
        listener.run().await.unwrap();
    })
}

#[tokio::test]
async fn latte_reaches_taken_through_the_whole_pipeline() {
    let h = harness();
    let listener = spawn_listener(&h);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut completed = h.bus.subscribe(&[WORK_COMPLETED_TOPIC]).await.unwrap();

    let order = h
        .intake
        .place("alice", vec!["latte".into()], Money::new(450, "USD").unwrap())
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Init);

    h.intake.pay(order.id).await.unwrap();
    assert!(h.tracking.contains(order.id).await);

    // The fulfillment side brews and announces completion.
    let event = completed.next().await.unwrap().unwrap();
    assert_eq!(event.order_id, order.id);
    assert_eq!(event.kind, WorkEventKind::WorkCompleted);

    let brewed = h.store.expect_order(order.id).await;
    assert_eq!(brewed.status, OrderStatus::Brewed);
    assert_eq!(brewed.fulfilled_by, Some(WorkerId::new("barista-1")));

    // The scheduler's polling path, not the completion event, finishes it.
    let handle = h.scheduler.spawn();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(h.store.expect_order(order.id).await.status, OrderStatus::Taken);
    assert!(!h.tracking.contains(order.id).await);

    handle.shutdown().await;
    h.bus.close().await;
    listener.await.unwrap();
}

#[tokio::test]
async fn order_is_not_untracked_before_brewed_is_observed() {
    let h = harness();
    // No listener: the order never reaches Brewed.

    let order = h
        .intake
        .place("bob", vec!["espresso".into()], Money::zero("USD"))
        .await
        .unwrap();
    h.intake.pay(order.id).await.unwrap();

    for _ in 0..5 {
        h.scheduler.run_pass().await;
    }

    // Still Paid remotely, still tracked locally.
    assert_eq!(h.store.expect_order(order.id).await.status, OrderStatus::Paid);
    assert!(h.tracking.contains(order.id).await);
}

#[tokio::test]
async fn redelivered_new_work_does_not_refulfill() {
    let h = harness();
    let listener = spawn_listener(&h);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let order = h
        .intake
        .place("carol", vec!["flat white".into()], Money::zero("USD"))
        .await
        .unwrap();
    h.intake.pay(order.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let first = h.store.expect_order(order.id).await;
    assert_eq!(first.status, OrderStatus::Brewed);

    // At-least-once delivery: the same signal arrives again.
    let mut completed = h.bus.subscribe(&[WORK_COMPLETED_TOPIC]).await.unwrap();
    h.bus
        .publish(
            WorkEventKind::NewWork.topic(),
            &WorkEvent::new(order.id, WorkEventKind::NewWork),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = h.store.expect_order(order.id).await;
    assert_eq!(second.status, OrderStatus::Brewed);
    assert_eq!(first.updated_at, second.updated_at);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), completed.next())
            .await
            .is_err(),
        "redelivery must not publish a second completion"
    );

    h.bus.close().await;
    listener.await.unwrap();
}

#[tokio::test]
async fn transient_remote_failures_only_delay_the_pickup() {
    let h = harness();
    let listener = spawn_listener(&h);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let order = h
        .intake
        .place("dave", vec!["cortado".into()], Money::zero("USD"))
        .await
        .unwrap();
    h.intake.pay(order.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.store.expect_order(order.id).await.status, OrderStatus::Brewed);

    // The next two remote calls fail; the order must stay tracked.
    h.store.fail_next(2).await;
    h.scheduler.run_pass().await;
    assert!(h.tracking.contains(order.id).await);

    h.scheduler.run_pass().await;
    h.scheduler.run_pass().await;
    assert_eq!(h.store.expect_order(order.id).await.status, OrderStatus::Taken);
    assert!(!h.tracking.contains(order.id).await);

    h.bus.close().await;
    listener.await.unwrap();
}

#[tokio::test]
async fn many_orders_drain_within_a_few_ticks() {
    let h = harness();
    let listener = spawn_listener(&h);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut ids = Vec::new();
    for i in 0..12 {
        let order = h
            .intake
            .place(
                &format!("customer-{i}"),
                vec!["latte".into()],
                Money::zero("USD"),
            )
            .await
            .unwrap();
        h.intake.pay(order.id).await.unwrap();
        ids.push(order.id);
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let handle = h.scheduler.spawn();
    tokio::time::sleep(Duration::from_millis(400)).await;
    handle.shutdown().await;

    for id in ids {
        assert_eq!(h.store.expect_order(id).await.status, OrderStatus::Taken);
        assert!(!h.tracking.contains(id).await);
    }

    h.bus.close().await;
    listener.await.unwrap();
}
