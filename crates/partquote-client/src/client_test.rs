use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::session::{ACCESS_TOKEN_KEY, REDIRECT_TO_KEY, REFRESH_TOKEN_KEY};

const OFFER_ID: &str = "6f1f2c1e-2b0e-4c5e-9d7a-1a2b3c4d5e6f";
const ORDER_ID: &str = "0b7c7a8e-4f57-4d3a-8a45-9d2f3c1b2a10";

async fn client_for(server: &MockServer) -> (tempfile::TempDir, OfferClient) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::open(dir.path()).await.expect("open store");
    let client = OfferClient::with_store(
        &server.uri(),
        Duration::from_secs(5),
        RetryPolicy {
            max_attempts: 3,
            backoff_base_ms: 0,
        },
        store,
    )
    .await
    .expect("client construction should not fail");
    (dir, client)
}

fn offer_json(status: &str) -> Value {
    json!({
        "id": OFFER_ID,
        "orderId": ORDER_ID,
        "status": status,
        "parts": [{
            "partCode": "OC90",
            "partType": "Filter",
            "quantity": 2,
            "deliveryTerm": "24h",
            "options": [{
                "optionId": "7d1b3a52-0c55-4b8e-9f3e-2a9c4b6d8e01",
                "manufacturer": "M1",
                "unitPrice": "10"
            }]
        }],
        "selectedParts": [],
        "billingAddress": null,
        "deliveryAddress": null,
        "pickupAtCentral": false,
        "total": "0",
        "totals": { "net": "0", "vat": "0", "gross": "0", "vatRate": "0.21" },
        "createdAt": "2026-01-10T08:00:00Z",
        "updatedAt": "2026-01-10T08:00:00Z"
    })
}

fn envelope(data: Value) -> Value {
    json!({ "data": data, "meta": { "request_id": "req-1", "timestamp": "2026-01-10T08:00:00Z" } })
}

fn offer_id() -> Uuid {
    OFFER_ID.parse().expect("uuid")
}

#[tokio::test]
async fn get_offer_sends_bearer_token_and_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/offer/{OFFER_ID}")))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(offer_json("trimisa"))))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    client
        .sign_in(Session::new("a1", Some("r1".to_owned())))
        .await
        .unwrap();

    let offer = client.get_offer(offer_id()).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Sent);
    assert_eq!(offer.order_id.id().to_string(), ORDER_ID);
    assert_eq!(offer.parts[0].options[0].manufacturer, "M1");
}

#[tokio::test]
async fn list_offers_passes_filters_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/offer/admin"))
        .and(query_param("status", "proiect"))
        .and(query_param("perPage", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "items": [offer_json("proiect")],
            "total": 1,
            "page": 1,
            "perPage": 5
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    let page = client
        .list_offers(&OfferQuery {
            status: Some(OfferStatus::Draft),
            per_page: Some(5),
            ..OfferQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn delivery_update_sends_status_string() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("/offer/admin/{OFFER_ID}/delivery")))
        .and(body_json(json!({ "deliveryStatus": "anulata" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(offer_json("anulata"))))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    let offer = client
        .update_delivery(offer_id(), OfferStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(offer.status, OfferStatus::Cancelled);
}

#[tokio::test]
async fn error_envelope_becomes_api_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("/offer/{OFFER_ID}/accept")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "code": "invalid_transition",
                "message": "cannot accept: no parts have been selected"
            },
            "meta": { "request_id": "req-1", "timestamp": "2026-01-10T08:00:00Z" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    let err = client.accept_offer(offer_id()).await.unwrap_err();
    match err {
        ClientError::Api {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 409);
            assert_eq!(code, "invalid_transition");
            assert!(message.contains("no parts have been selected"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried_up_to_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/offer/{OFFER_ID}")))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    let err = client.get_offer(offer_id()).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn create_offer_is_not_repeated_after_a_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/offer/admin"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    let err = client.create_offer(Uuid::new_v4(), &[]).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn rate_limited_create_offer_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/offer/admin"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/offer/admin"))
        .respond_with(ResponseTemplate::new(201).set_body_json(envelope(offer_json("proiect"))))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    let offer = client.create_offer(Uuid::new_v4(), &[]).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Draft);
}

#[tokio::test]
async fn rate_limited_request_succeeds_on_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/offer/{OFFER_ID}")))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/offer/{OFFER_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(offer_json("trimisa"))))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    let offer = client.get_offer(offer_id()).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Sent);
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_request_replayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/offer/{OFFER_ID}")))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .and(body_json(json!({ "refreshToken": "r1" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "fresh", "refreshToken": "r2" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/offer/{OFFER_ID}")))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(offer_json("trimisa"))))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    client
        .sign_in(Session::new("stale", Some("r1".to_owned())))
        .await
        .unwrap();

    client.get_offer(offer_id()).await.unwrap();
    assert_eq!(
        client.session(),
        Some(Session::new("fresh", Some("r2".to_owned())))
    );
    assert_eq!(
        client
            .store()
            .get_string(ACCESS_TOKEN_KEY)
            .await
            .unwrap()
            .as_deref(),
        Some("fresh")
    );
}

#[tokio::test]
async fn failed_refresh_signs_out_and_records_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/offer/{OFFER_ID}")))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, client) = client_for(&server).await;
    client
        .sign_in(Session::new("stale", Some("r1".to_owned())))
        .await
        .unwrap();

    let err = client.get_offer(offer_id()).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
    assert_eq!(client.session(), None);

    let store = client.store();
    assert_eq!(store.get_string(ACCESS_TOKEN_KEY).await.unwrap(), None);
    assert_eq!(store.get_string(REFRESH_TOKEN_KEY).await.unwrap(), None);
    assert_eq!(
        store.get_string(REDIRECT_TO_KEY).await.unwrap(),
        Some(format!("/offer/{OFFER_ID}"))
    );
}

#[tokio::test]
async fn stored_session_is_picked_up_on_construction() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::open(dir.path()).await.expect("open store");
    Session::new("persisted", None).save(&store).await.unwrap();

    let client = OfferClient::with_store(
        &server.uri(),
        Duration::from_secs(5),
        RetryPolicy::default(),
        store,
    )
    .await
    .unwrap();
    assert_eq!(
        client.session().map(|s| s.access_token),
        Some("persisted".to_owned())
    );
}

#[test]
fn plain_text_error_bodies_are_kept_as_message() {
    let err = api_error(StatusCode::BAD_GATEWAY, b"upstream down");
    match err {
        ClientError::Api { status, code, message } => {
            assert_eq!(status, 502);
            assert_eq!(code, "http_error");
            assert_eq!(message, "upstream down");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_base_url_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::open(dir.path()).await.expect("open store");
    let err = OfferClient::with_store("not a url", Duration::from_secs(5), RetryPolicy::default(), store)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidUrl { .. }));
}
