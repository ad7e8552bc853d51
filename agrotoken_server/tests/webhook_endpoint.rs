//! Endpoint tests for the payment webhook, signature checks included.
use actix_web::{http::StatusCode, test, web, App};
use agt_common::{Cents, Secret};
use agrotoken_engine::{
    db_types::{NewOrder, OrderId, OrderStatusType},
    events::EventProducers,
    SettlementApi,
    SqliteDatabase,
};
use agrotoken_server::{
    data_objects::JsonResponse,
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    webhook_routes::PaymentWebhookRoute,
};

mod support;

const SECRET: &str = "test-webhook-secret";
const SIG_HEADER: &str = "X-Gateway-Signature";

async fn awaiting_payment_order(db: &SqliteDatabase, id: &str) {
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let order = NewOrder::new(OrderId(id.into()), "buyer-1".into(), "crop-1".into(), Cents::from_whole(50));
    api.create_order(order).await.unwrap();
    api.submit_order(&OrderId(id.into())).await.unwrap();
}

fn captured_body(event_id: &str, order_id: &str) -> String {
    format!(r#"{{"event_id":"{event_id}","type":"payment.captured","order_id":"{order_id}","payment_ref":"pay_9"}}"#)
}

macro_rules! webhook_app {
    ($db:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(SettlementApi::new($db.clone(), EventProducers::default())))
                .service(
                    web::scope("/webhook")
                        .wrap(HmacMiddlewareFactory::new(SIG_HEADER, Secret::new(SECRET.to_string()), true))
                        .service(PaymentWebhookRoute::<SqliteDatabase>::new()),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn a_correctly_signed_capture_is_accepted() {
    let db = support::prepare_test_db().await;
    awaiting_payment_order(&db, "ord-1").await;
    let app = webhook_app!(db);

    let body = captured_body("evt-1", "ord-1");
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIG_HEADER, calculate_hmac(SECRET, body.as_bytes())))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
        .to_request();
    let response: JsonResponse = test::call_and_read_body_json(&app, req).await;
    assert!(response.success);

    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let order = api.fetch_order(&OrderId("ord-1".into())).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.payment_ref.as_deref(), Some("pay_9"));
}

#[actix_web::test]
async fn a_bad_signature_is_rejected_before_parsing() {
    let db = support::prepare_test_db().await;
    awaiting_payment_order(&db, "ord-2").await;
    let app = webhook_app!(db);

    let body = captured_body("evt-2", "ord-2");
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIG_HEADER, calculate_hmac("wrong-secret", body.as_bytes())))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The event never reached the ledger.
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let order = api.fetch_order(&OrderId("ord-2".into())).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::AwaitingPayment);
}

#[actix_web::test]
async fn a_missing_signature_is_rejected() {
    let db = support::prepare_test_db().await;
    awaiting_payment_order(&db, "ord-3").await;
    let app = webhook_app!(db);

    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(captured_body("evt-3", "ord-3"))
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn an_unknown_event_type_is_acknowledged_but_not_applied() {
    let db = support::prepare_test_db().await;
    awaiting_payment_order(&db, "ord-4").await;
    let app = webhook_app!(db);

    let body = r#"{"event_id":"evt-4","type":"payment.refunded","order_id":"ord-4"}"#.to_string();
    let req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((SIG_HEADER, calculate_hmac(SECRET, body.as_bytes())))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response: JsonResponse = test::read_body_json(response).await;
    assert!(!response.success);
}

#[actix_web::test]
async fn redelivering_the_same_event_id_is_acknowledged_once_applied() {
    let db = support::prepare_test_db().await;
    awaiting_payment_order(&db, "ord-5").await;
    let app = webhook_app!(db);

    let body = captured_body("evt-5", "ord-5");
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/webhook/payment")
            .insert_header((SIG_HEADER, calculate_hmac(SECRET, body.as_bytes())))
            .insert_header(("Content-Type", "application/json"))
            .set_payload(body.clone())
            .to_request();
        let response: JsonResponse = test::call_and_read_body_json(&app, req).await;
        assert!(response.success);
    }

    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let order = api.fetch_order(&OrderId("ord-5".into())).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.version, 2);
}
