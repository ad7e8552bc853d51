//! End-to-end flows through the settlement ledger: order lifecycle, webhook idempotency, version races, media
//! dedup and price replacement, all against a real (throwaway) SQLite database.
use agt_common::Cents;
use agrotoken_engine::{
    db_types::{LedgerEvent, NewMediaAsset, NewOrder, OrderId, OrderStatusType, PinStatus, PriceQuote, WebhookOutcome},
    events::EventProducers,
    IngestOutcome,
    MediaApi,
    PriceApi,
    SettlementApi,
    SettlementLedgerDatabase,
    SettlementLedgerError,
    TransitionOutcome,
    WebhookNotification,
};
use chrono::Utc;

mod support;

fn new_order(id: &str) -> NewOrder {
    NewOrder::new(OrderId(id.into()), "buyer-1".into(), "crop-7".into(), Cents::from_whole(125))
}

fn captured_event(event_id: &str, order_id: &str) -> WebhookNotification {
    WebhookNotification {
        event_id: event_id.into(),
        event_type: "payment.captured".into(),
        order_id: OrderId(order_id.into()),
        payment_ref: Some("pay_abc".into()),
        payload_digest: "digest".into(),
    }
}

#[tokio::test]
async fn order_lifecycle_happy_path() {
    let db = support::prepare_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());

    let (order, inserted) = api.create_order(new_order("ord-1")).await.unwrap();
    assert!(inserted);
    assert_eq!(order.status, OrderStatusType::Created);
    assert_eq!(order.version, 0);

    let order = api.submit_order(&order.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatusType::AwaitingPayment);
    assert_eq!(order.version, 1);

    let outcome = api.ingest_webhook(captured_event("evt-1", "ord-1")).await.unwrap();
    let order = match outcome {
        IngestOutcome::Accepted(order) => order,
        other => panic!("expected Accepted, got {other:?}"),
    };
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.version, 2);
    assert_eq!(order.payment_ref.as_deref(), Some("pay_abc"));
    assert!(order.mint_txid.is_none(), "mint reference must be null before Minted");

    let claimed = api.claim_for_minting(&order).await.unwrap().expect("claim should succeed");
    assert_eq!(claimed.status, OrderStatusType::Minting);
    assert_eq!(claimed.version, 3);
    assert!(claimed.mint_txid.is_none());

    let minted = api.complete_mint(&claimed.order_id, "0xdeadbeef".into()).await.unwrap();
    assert_eq!(minted.status, OrderStatusType::Minted);
    assert_eq!(minted.version, 4);
    assert_eq!(minted.mint_txid.as_deref(), Some("0xdeadbeef"));
}

#[tokio::test]
async fn repeated_deliveries_of_one_event_id_are_deduplicated() {
    let db = support::prepare_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let (order, _) = api.create_order(new_order("ord-2")).await.unwrap();
    api.submit_order(&order.order_id).await.unwrap();

    let first = api.ingest_webhook(captured_event("evt-dup", "ord-2")).await.unwrap();
    assert!(matches!(first, IngestOutcome::Accepted(_)));
    for _ in 0..3 {
        let redelivery = api.ingest_webhook(captured_event("evt-dup", "ord-2")).await.unwrap();
        assert!(matches!(redelivery, IngestOutcome::Duplicate));
    }

    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.version, 2);
    let audit = db.fetch_webhook_event("evt-dup").await.unwrap().unwrap();
    assert_eq!(audit.outcome, WebhookOutcome::Accepted);
}

#[tokio::test]
async fn a_distinct_capture_for_a_paid_order_is_a_noop_success() {
    let db = support::prepare_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let (order, _) = api.create_order(new_order("ord-3")).await.unwrap();
    api.submit_order(&order.order_id).await.unwrap();
    api.ingest_webhook(captured_event("evt-a", "ord-3")).await.unwrap();

    // The gateway sent a second capture event with its own id. Same order, no state change.
    let outcome = api.ingest_webhook(captured_event("evt-b", "ord-3")).await.unwrap();
    let order = match outcome {
        IngestOutcome::Accepted(order) => order,
        other => panic!("expected Accepted, got {other:?}"),
    };
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.version, 2, "a no-op must not bump the version");
}

#[tokio::test]
async fn unknown_event_types_and_orders_are_rejected_and_audited() {
    let db = support::prepare_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let (order, _) = api.create_order(new_order("ord-4")).await.unwrap();
    api.submit_order(&order.order_id).await.unwrap();

    let mut unknown_type = captured_event("evt-x", "ord-4");
    unknown_type.event_type = "payment.refunded".into();
    assert!(matches!(api.ingest_webhook(unknown_type).await.unwrap(), IngestOutcome::Rejected(_)));
    assert_eq!(db.fetch_webhook_event("evt-x").await.unwrap().unwrap().outcome, WebhookOutcome::Rejected);

    let unknown_order = captured_event("evt-y", "no-such-order");
    assert!(matches!(api.ingest_webhook(unknown_order).await.unwrap(), IngestOutcome::Rejected(_)));

    // The order is untouched by either rejection.
    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::AwaitingPayment);
    assert_eq!(order.version, 1);
}

#[tokio::test]
async fn failure_event_for_a_terminal_order_is_rejected_but_acknowledged() {
    let db = support::prepare_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let (order, _) = api.create_order(new_order("ord-5")).await.unwrap();
    api.submit_order(&order.order_id).await.unwrap();
    api.ingest_webhook(captured_event("evt-c", "ord-5")).await.unwrap();
    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    let claimed = api.claim_for_minting(&order).await.unwrap().unwrap();
    api.complete_mint(&claimed.order_id, "0x01".into()).await.unwrap();

    let failed = WebhookNotification {
        event_id: "evt-late-failure".into(),
        event_type: "payment.failed".into(),
        order_id: order.order_id.clone(),
        payment_ref: None,
        payload_digest: "digest".into(),
    };
    assert!(matches!(api.ingest_webhook(failed).await.unwrap(), IngestOutcome::Rejected(_)));
    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Minted);
}

#[tokio::test]
async fn only_one_transition_succeeds_per_version() {
    let db = support::prepare_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let (order, _) = api.create_order(new_order("ord-6")).await.unwrap();

    let d1 = db.clone();
    let d2 = db.clone();
    let oid1 = order.order_id.clone();
    let oid2 = order.order_id.clone();
    let t1 = tokio::spawn(async move { d1.transition(&oid1, LedgerEvent::Submit, 0).await });
    let t2 = tokio::spawn(async move { d2.transition(&oid2, LedgerEvent::Submit, 0).await });
    let (r1, r2) = (t1.await.unwrap(), t2.await.unwrap());

    let winners = [&r1, &r2].iter().filter(|r| matches!(r, Ok(TransitionOutcome::Applied(_)))).count();
    let conflicts =
        [&r1, &r2].iter().filter(|r| matches!(r, Err(SettlementLedgerError::VersionConflict(_)))).count();
    assert_eq!(winners, 1, "exactly one concurrent transition may win");
    assert_eq!(conflicts, 1);
    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.version, 1);
}

#[tokio::test]
async fn a_transition_reports_the_state_it_wrote() {
    let db = support::prepare_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let (order, _) = api.create_order(new_order("ord-9")).await.unwrap();
    api.submit_order(&order.order_id).await.unwrap();
    api.ingest_webhook(captured_event("evt-snap", "ord-9")).await.unwrap();
    let paid = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(paid.version, 2);

    // A confirmer hammers the next version so it lands the instant the claim commits.
    let d = db.clone();
    let oid = order.order_id.clone();
    let confirmer = tokio::spawn(async move {
        loop {
            let ev = LedgerEvent::MintConfirmed { txid: "0xlate".into() };
            match d.transition(&oid, ev, 3).await {
                Ok(_) => break,
                Err(_) => tokio::task::yield_now().await,
            }
        }
    });
    let claimed = api.claim_for_minting(&paid).await.unwrap().expect("the claim must succeed");
    confirmer.await.unwrap();

    // The claim reports the row it wrote, never the confirmer's follow-up write.
    assert_eq!(claimed.status, OrderStatusType::Minting);
    assert_eq!(claimed.version, 3);
    assert!(claimed.mint_txid.is_none());
    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Minted);
    assert_eq!(order.version, 4);
}

#[tokio::test]
async fn concurrent_duplicate_deliveries_yield_one_paid_transition() {
    let db = support::prepare_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let (order, _) = api.create_order(new_order("ord-7")).await.unwrap();
    api.submit_order(&order.order_id).await.unwrap();

    let a1 = SettlementApi::new(db.clone(), EventProducers::default());
    let a2 = SettlementApi::new(db.clone(), EventProducers::default());
    let t1 = tokio::spawn(async move { a1.ingest_webhook(captured_event("evt-race", "ord-7")).await });
    let t2 = tokio::spawn(async move { a2.ingest_webhook(captured_event("evt-race", "ord-7")).await });
    let (r1, r2) = (t1.await.unwrap().unwrap(), t2.await.unwrap().unwrap());

    // Both deliveries are acknowledged; the order was paid exactly once.
    for r in [&r1, &r2] {
        assert!(!matches!(r, IngestOutcome::Rejected(_)), "neither delivery may be rejected: {r:?}");
    }
    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.version, 2);
    let audit = db.fetch_webhook_event("evt-race").await.unwrap().unwrap();
    assert_eq!(audit.outcome, WebhookOutcome::Accepted);
}

#[tokio::test]
async fn requeue_returns_a_failed_order_to_the_mint_queue() {
    let db = support::prepare_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let (order, _) = api.create_order(new_order("ord-8")).await.unwrap();
    api.submit_order(&order.order_id).await.unwrap();
    api.ingest_webhook(captured_event("evt-d", "ord-8")).await.unwrap();
    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    let claimed = api.claim_for_minting(&order).await.unwrap().unwrap();
    let failed = api.fail_mint(&claimed.order_id).await.unwrap();
    assert_eq!(failed.status, OrderStatusType::Failed);

    let requeued = api.requeue_failed_mint(&failed.order_id).await.unwrap();
    assert_eq!(requeued.status, OrderStatusType::Paid);
    assert!(requeued.mint_txid.is_none());
}

#[tokio::test]
async fn identical_media_content_registers_exactly_once() {
    let db = support::prepare_test_db().await;
    let api = MediaApi::new(db.clone());
    let asset = NewMediaAsset {
        content_id: "b2-aabbcc".into(),
        crop_id: "crop-7".into(),
        size: 2048,
        mime_type: "image/jpeg".into(),
        pin_status: PinStatus::Pinned,
    };
    let (first, inserted) = api.register_pinned(asset.clone()).await.unwrap();
    assert!(inserted);
    let (second, inserted) = api.register_pinned(asset).await.unwrap();
    assert!(!inserted, "re-uploading identical bytes must not create a second record");
    assert_eq!(first.content_id, second.content_id);
    assert_eq!(second.pin_status, PinStatus::Pinned);

    let pinned = api.pinned_asset_for_crop("crop-7").await.unwrap().unwrap();
    assert_eq!(pinned.content_id, "b2-aabbcc");
}

#[tokio::test]
async fn quote_replacement_is_per_symbol() {
    let db = support::prepare_test_db().await;
    let api = PriceApi::new(db.clone(), EventProducers::default());
    let now = Utc::now();
    api.replace_quotes(vec![
        PriceQuote::new("WHEAT", Cents::from_whole(210), now),
        PriceQuote::new("MAIZE", Cents::from_whole(180), now),
    ])
    .await
    .unwrap();

    // A later cycle updates only MAIZE; WHEAT's stored quote is untouched.
    api.replace_quotes(vec![PriceQuote::new("MAIZE", Cents::from_whole(185), now)]).await.unwrap();

    let wheat = api.fetch_quote("WHEAT").await.unwrap().unwrap();
    assert_eq!(wheat.price, Cents::from_whole(210));
    let maize = api.fetch_quote("MAIZE").await.unwrap().unwrap();
    assert_eq!(maize.price, Cents::from_whole(185));
    assert_eq!(api.fetch_all_quotes().await.unwrap().len(), 2);
}
