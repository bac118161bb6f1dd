use std::collections::HashSet;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use partquote_core::VatRate;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use super::offers::{delivery_action, normalize_page, normalize_per_page};
use super::*;
use crate::notify::testing::RecordingNotifier;

const ADMIN_KEY: &str = "admin-key";
const CLIENT_KEY: &str = "client-key";

// -------------------------------------------------------------------------
// Helpers
// -------------------------------------------------------------------------

fn keyed_auth() -> AuthState {
    AuthState::from_keys(
        HashSet::from([ADMIN_KEY.to_string()]),
        HashSet::from([CLIENT_KEY.to_string()]),
    )
}

fn app_with(pool: sqlx::PgPool, notifier: Arc<RecordingNotifier>, auth: &AuthState) -> Router {
    let state = AppState {
        pool,
        notifier,
        vat_rate: VatRate::STANDARD,
    };
    build_app(state, auth, default_rate_limit_state())
}

fn app(pool: sqlx::PgPool) -> (Router, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let router = app_with(pool, Arc::clone(&notifier), &keyed_auth());
    (router, notifier)
}

async fn seed_order(pool: &sqlx::PgPool) -> Uuid {
    partquote_db::create_order(
        pool,
        &partquote_db::NewOrder {
            customer_name: "Ion Popescu",
            customer_email: Some("ion@example.ro"),
            customer_phone: Some("0722000000"),
            vehicle: Some("VW Golf 7 2016"),
        },
    )
    .await
    .expect("seed order")
    .public_id
}

async fn call(app: &Router, method: &str, uri: &str, key: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {key}"));
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json parse")
    };
    (status, json)
}

fn filter_and_pads() -> Value {
    json!([
        {
            "partCode": "OC90",
            "partType": "Filter",
            "quantity": 2,
            "deliveryTerm": "24h",
            "options": [
                { "manufacturer": "M1", "unitPrice": "10" },
                { "manufacturer": "M2", "unitPrice": "12" }
            ]
        },
        {
            "partCode": "BP-1",
            "partType": "Brake Pad",
            "quantity": 1,
            "deliveryTerm": "3 zile",
            "options": [{ "manufacturer": "M3", "unitPrice": "50" }]
        }
    ])
}

async fn create_offer(app: &Router, order_id: Uuid) -> Value {
    let (status, json) = call(
        app,
        "POST",
        "/offer/admin",
        ADMIN_KEY,
        Some(json!({ "orderId": order_id, "parts": filter_and_pads() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["data"].clone()
}

fn option_id(offer: &Value, part_type: &str, manufacturer: &str) -> String {
    offer["parts"]
        .as_array()
        .expect("parts")
        .iter()
        .filter(|p| p["partType"] == part_type)
        .flat_map(|p| p["options"].as_array().expect("options").iter())
        .find(|o| o["manufacturer"] == manufacturer)
        .and_then(|o| o["optionId"].as_str())
        .expect("option present")
        .to_string()
}

fn address(name: &str) -> Value {
    json!({
        "fullName": name,
        "street": "Bd. Unirii 10",
        "city": "Bucuresti",
        "county": "Bucuresti"
    })
}

fn selection_body(offer: &Value) -> Value {
    json!({
        "selectedParts": [
            {
                "partType": "Filter",
                "selectedOptionId": option_id(offer, "Filter", "M2"),
                "manufacturer": "M2",
                "unitPrice": "1",
                "quantity": 2,
                "deliveryTerm": "24h",
                "lineTotal": "2"
            },
            {
                "partType": "Brake Pad",
                "selectedOptionId": option_id(offer, "Brake Pad", "M3"),
                "manufacturer": "M3",
                "unitPrice": "50",
                "quantity": 1,
                "deliveryTerm": "3 zile",
                "lineTotal": "50"
            }
        ],
        "billingAddress": address("Ion Popescu"),
        "pickupAtCentral": true
    })
}

async fn offer_in_awaiting_finalization(app: &Router, pool: &sqlx::PgPool) -> String {
    let order_id = seed_order(pool).await;
    let offer = create_offer(app, order_id).await;
    let id = offer["id"].as_str().expect("id").to_string();
    let (status, json) = call(
        app,
        "PATCH",
        &format!("/offer/{id}/selected-parts"),
        CLIENT_KEY,
        Some(selection_body(&offer)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    id
}

fn decimal(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .expect("decimal string")
        .parse()
        .expect("decimal")
}

// -------------------------------------------------------------------------
// Plumbing (no DB)
// -------------------------------------------------------------------------

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("invalid_transition", StatusCode::CONFLICT),
        ("conflict", StatusCode::CONFLICT),
        ("forbidden", StatusCode::FORBIDDEN),
        ("not_found", StatusCode::NOT_FOUND),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, expected) in cases {
        let response = ApiError::new("req-1", code, "message").into_response();
        assert_eq!(response.status(), expected, "{code}");
    }
}

#[test]
fn transition_errors_map_to_forbidden_or_invalid_transition() {
    use partquote_core::{Actor, OfferAction, OfferStatus, TransitionError};

    let forbidden = TransitionError::Forbidden {
        action: OfferAction::Accept,
        actor: Actor::Admin,
    };
    assert_eq!(map_transition_error("r", &forbidden).error.code, "forbidden");

    let not_allowed = TransitionError::NotAllowed {
        action: OfferAction::Accept,
        from: OfferStatus::Draft,
    };
    assert_eq!(
        map_transition_error("r", &not_allowed).error.code,
        "invalid_transition"
    );
}

#[test]
fn pagination_defaults_and_bounds() {
    assert_eq!(normalize_page(None), 1);
    assert_eq!(normalize_page(Some(0)), 1);
    assert_eq!(normalize_per_page(None), 20);
    assert_eq!(normalize_per_page(Some(0)), 1);
    assert_eq!(normalize_per_page(Some(1_000)), 100);
}

#[test]
fn only_delivery_statuses_map_to_actions() {
    use partquote_core::{OfferAction, OfferStatus};

    assert_eq!(
        delivery_action(OfferStatus::Delivered),
        Some(OfferAction::MarkDelivered)
    );
    assert_eq!(
        delivery_action(OfferStatus::Cancelled),
        Some(OfferAction::Cancel)
    );
    assert_eq!(delivery_action(OfferStatus::Accepted), None);
}

// -------------------------------------------------------------------------
// Auth
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn missing_key_is_unauthorized(pool: sqlx::PgPool) {
    let (app, _) = app(pool);
    let (status, json) = call(&app, "GET", "/offer/admin", "nope", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");
}

#[sqlx::test(migrations = "../../migrations")]
async fn client_key_cannot_call_admin_routes(pool: sqlx::PgPool) {
    let (app, _) = app(pool);
    let (status, json) = call(&app, "GET", "/offer/admin", CLIENT_KEY, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "forbidden");
}

#[sqlx::test(migrations = "../../migrations")]
async fn auth_rejections_carry_the_envelope_meta(pool: sqlx::PgPool) {
    let (app, _) = app(pool);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/offer/admin")
                .header("x-request-id", "req-401")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: Value = serde_json::from_slice(&bytes).expect("json parse");
    assert_eq!(json["error"]["code"], "unauthorized");
    assert_eq!(json["meta"]["request_id"], "req-401");
    assert!(json["meta"]["timestamp"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn rate_limited_requests_get_the_envelope(pool: sqlx::PgPool) {
    let state = AppState {
        pool,
        notifier: Arc::new(RecordingNotifier::default()),
        vat_rate: VatRate::STANDARD,
    };
    let app = build_app(
        state,
        &keyed_auth(),
        RateLimitState::new(1, std::time::Duration::from_secs(60)),
    );

    let (first, _) = call(&app, "GET", "/offer/admin", ADMIN_KEY, None).await;
    assert_eq!(first, StatusCode::OK);
    let (second, json) = call(&app, "GET", "/offer/admin", ADMIN_KEY, None).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
    assert!(json["meta"]["request_id"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_key_cannot_accept(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let id = offer_in_awaiting_finalization(&app, &pool).await;
    let (status, _) = call(&app, "PATCH", &format!("/offer/{id}/accept"), ADMIN_KEY, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../migrations")]
async fn health_is_public(pool: sqlx::PgPool) {
    let (app, _) = app(pool);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

// -------------------------------------------------------------------------
// Admin flow
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_offer_starts_as_draft(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let offer = create_offer(&app, order_id).await;

    assert_eq!(offer["status"], "proiect");
    assert_eq!(offer["orderId"], order_id.to_string());
    assert_eq!(offer["parts"].as_array().map(Vec::len), Some(2));
    assert_eq!(decimal(&offer["totals"]["gross"]), rust_decimal::Decimal::ZERO);
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_offer_for_unknown_order_is_404(pool: sqlx::PgPool) {
    let (app, _) = app(pool);
    let (status, json) = call(
        &app,
        "POST",
        "/offer/admin",
        ADMIN_KEY,
        Some(json!({ "orderId": Uuid::new_v4(), "parts": filter_and_pads() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_offer_with_invalid_line_is_validation_error(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let (status, json) = call(
        &app,
        "POST",
        "/offer/admin",
        ADMIN_KEY,
        Some(json!({
            "orderId": order_id,
            "parts": [{
                "partCode": "OC90",
                "partType": "Filter",
                "quantity": 1,
                "deliveryTerm": "24h",
                "options": [{ "manufacturer": "M1", "unitPrice": "0" }]
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_filters_by_status_and_paginates(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let first = create_offer(&app, order_id).await;
    create_offer(&app, order_id).await;
    create_offer(&app, order_id).await;
    let id = first["id"].as_str().expect("id");
    let (status, _) = call(&app, "PATCH", &format!("/offer/admin/{id}/send"), ADMIN_KEY, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = call(&app, "GET", "/offer/admin?perPage=2&page=1", ADMIN_KEY, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 3);
    assert_eq!(json["data"]["perPage"], 2);
    assert_eq!(json["data"]["items"].as_array().map(Vec::len), Some(2));

    let (_, json) = call(&app, "GET", "/offer/admin?status=trimisa", ADMIN_KEY, None).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["id"], first["id"]);

    let (status, json) = call(&app, "GET", "/offer/admin?status=bogus", ADMIN_KEY, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn part_edits_are_blocked_after_selection(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let id = offer_in_awaiting_finalization(&app, &pool).await;

    let (status, json) = call(
        &app,
        "POST",
        &format!("/offer/admin/{id}/add-products"),
        ADMIN_KEY,
        Some(json!({ "parts": filter_and_pads() })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "invalid_transition");
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_products_replaces_lines_while_sent(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let offer = create_offer(&app, order_id).await;
    let id = offer["id"].as_str().expect("id");
    call(&app, "PATCH", &format!("/offer/admin/{id}/send"), ADMIN_KEY, None).await;

    let (status, json) = call(
        &app,
        "PUT",
        &format!("/offer/admin/{id}/update-products"),
        ADMIN_KEY,
        Some(json!({ "parts": [filter_and_pads()[1].clone()] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["status"], "trimisa");
    assert_eq!(json["data"]["parts"].as_array().map(Vec::len), Some(1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn send_without_parts_is_rejected(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let (_, json) = call(
        &app,
        "POST",
        "/offer/admin",
        ADMIN_KEY,
        Some(json!({ "orderId": order_id })),
    )
    .await;
    let id = json["data"]["id"].as_str().expect("id").to_string();

    let (status, json) = call(&app, "PATCH", &format!("/offer/admin/{id}/send"), ADMIN_KEY, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "invalid_transition");
}

// -------------------------------------------------------------------------
// Client flow
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn get_offer_embeds_the_order(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let offer = create_offer(&app, order_id).await;
    let id = offer["id"].as_str().expect("id");

    let (status, json) = call(&app, "GET", &format!("/offer/{id}"), CLIENT_KEY, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["orderId"]["id"], order_id.to_string());
    assert_eq!(json["data"]["orderId"]["customerName"], "Ion Popescu");
    assert_eq!(json["data"]["orderId"]["vehicle"], "VW Golf 7 2016");
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_unknown_offer_is_404(pool: sqlx::PgPool) {
    let (app, _) = app(pool);
    let (status, _) = call(
        &app,
        "GET",
        &format!("/offer/{}", Uuid::new_v4()),
        CLIENT_KEY,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn selection_uses_stored_prices_and_totals(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let id = offer_in_awaiting_finalization(&app, &pool).await;

    let (_, json) = call(&app, "GET", &format!("/offer/{id}"), CLIENT_KEY, None).await;
    let offer = &json["data"];
    assert_eq!(offer["status"], "comanda_spre_finalizare");
    assert_eq!(offer["selectedParts"][0]["manufacturer"], "M2");
    assert_eq!(decimal(&offer["selectedParts"][0]["unitPrice"]), rust_decimal::Decimal::from(12));
    assert_eq!(decimal(&offer["selectedParts"][0]["lineTotal"]), rust_decimal::Decimal::from(24));
    assert_eq!(decimal(&offer["total"]), rust_decimal::Decimal::from(74));
    assert_eq!(decimal(&offer["totals"]["net"]), rust_decimal::Decimal::from(74));
    assert_eq!(
        decimal(&offer["totals"]["gross"]),
        rust_decimal::Decimal::new(8954, 2)
    );
    assert_eq!(offer["pickupAtCentral"], true);
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_selection_is_rejected_and_status_kept(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let offer = create_offer(&app, order_id).await;
    let id = offer["id"].as_str().expect("id");

    let mut body = selection_body(&offer);
    body["selectedParts"] = json!([]);
    let (status, json) = call(
        &app,
        "PATCH",
        &format!("/offer/{id}/selected-parts"),
        CLIENT_KEY,
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let (_, json) = call(&app, "GET", &format!("/offer/{id}"), CLIENT_KEY, None).await;
    assert_eq!(json["data"]["status"], "proiect");
}

#[sqlx::test(migrations = "../../migrations")]
async fn delivery_address_and_pickup_are_exclusive(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let offer = create_offer(&app, order_id).await;
    let id = offer["id"].as_str().expect("id");

    let mut body = selection_body(&offer);
    body["deliveryAddress"] = address("Ana Ionescu");
    let (status, _) = call(
        &app,
        "PATCH",
        &format!("/offer/{id}/selected-parts"),
        CLIENT_KEY,
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn accept_from_draft_is_invalid_transition(pool: sqlx::PgPool) {
    let (app, notifier) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let offer = create_offer(&app, order_id).await;
    let id = offer["id"].as_str().expect("id");

    let (status, json) = call(&app, "PATCH", &format!("/offer/{id}/accept"), CLIENT_KEY, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "invalid_transition");
    assert!(notifier.events().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn accept_notifies_and_delivery_completes(pool: sqlx::PgPool) {
    let (app, notifier) = app(pool.clone());
    let id = offer_in_awaiting_finalization(&app, &pool).await;

    let (status, json) = call(&app, "PATCH", &format!("/offer/{id}/accept"), CLIENT_KEY, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "oferta_acceptata");
    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "offer_accepted");
    assert_eq!(events[0].offer_id.to_string(), id);

    for (next, expected) in [
        ("livrare_in_procesare", "livrare_in_procesare"),
        ("livrata", "livrata"),
    ] {
        let (status, json) = call(
            &app,
            "PATCH",
            &format!("/offer/admin/{id}/delivery"),
            ADMIN_KEY,
            Some(json!({ "deliveryStatus": next })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["data"]["status"], expected);
    }

    let (status, _) = call(
        &app,
        "PATCH",
        &format!("/offer/admin/{id}/delivery"),
        ADMIN_KEY,
        Some(json!({ "deliveryStatus": "anulata" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../migrations")]
async fn reject_notifies_and_is_terminal(pool: sqlx::PgPool) {
    let (app, notifier) = app(pool.clone());
    let id = offer_in_awaiting_finalization(&app, &pool).await;

    let (status, json) = call(&app, "PATCH", &format!("/offer/{id}/reject"), CLIENT_KEY, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "oferta_respinsa");
    assert_eq!(notifier.events()[0].event, "offer_rejected");

    let (status, _) = call(&app, "PATCH", &format!("/offer/{id}/accept"), CLIENT_KEY, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancelling_twice_is_blocked(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let offer = create_offer(&app, order_id).await;
    let id = offer["id"].as_str().expect("id");
    let uri = format!("/offer/admin/{id}/delivery");
    let body = json!({ "deliveryStatus": "anulata" });

    let (status, _) = call(&app, "PATCH", &uri, ADMIN_KEY, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = call(&app, "PATCH", &uri, ADMIN_KEY, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "invalid_transition");
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_delivery_status_is_validation_error(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let id = offer_in_awaiting_finalization(&app, &pool).await;
    let (status, json) = call(
        &app,
        "PATCH",
        &format!("/offer/admin/{id}/delivery"),
        ADMIN_KEY,
        Some(json!({ "deliveryStatus": "oferta_acceptata" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn auth_disabled_allows_any_caller(pool: sqlx::PgPool) {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = app_with(pool, notifier, &AuthState::disabled());
    let (status, _) = call(&app, "GET", "/offer/admin", "whatever", None).await;
    assert_eq!(status, StatusCode::OK);
}

// -------------------------------------------------------------------------
// Malformed input
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn malformed_selection_body_is_an_enveloped_validation_error(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let offer = create_offer(&app, order_id).await;
    let id = offer["id"].as_str().expect("id");

    let (status, json) = call(
        &app,
        "PATCH",
        &format!("/offer/{id}/selected-parts"),
        CLIENT_KEY,
        Some(json!({ "selectedParts": [{ "partType": "Filter", "quantity": -1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert!(!json["error"]["message"].as_str().expect("message").is_empty());
    assert!(json["meta"]["request_id"].is_string());

    let (_, stored) = call(&app, "GET", &format!("/offer/{id}"), CLIENT_KEY, None).await;
    assert_eq!(stored["data"]["status"], "proiect");
}

#[sqlx::test(migrations = "../../migrations")]
async fn unparseable_json_is_an_enveloped_validation_error(pool: sqlx::PgPool) {
    let (app, _) = app(pool);
    let request = Request::builder()
        .method("POST")
        .uri("/offer/admin")
        .header("authorization", format!("Bearer {ADMIN_KEY}"))
        .header("content-type", "application/json")
        .body(Body::from("{\"orderId\": "))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: Value = serde_json::from_slice(&bytes).expect("json parse");
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn non_uuid_offer_id_is_an_enveloped_validation_error(pool: sqlx::PgPool) {
    let (app, _) = app(pool);
    let (status, json) = call(&app, "GET", "/offer/not-a-uuid", CLIENT_KEY, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn sub_bani_price_is_rejected_at_create(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let mut parts = filter_and_pads();
    parts[0]["options"][0]["unitPrice"] = json!("10.005");

    let (status, json) = call(
        &app,
        "POST",
        "/offer/admin",
        ADMIN_KEY,
        Some(json!({ "orderId": order_id, "parts": parts })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn oversized_price_is_rejected_at_create(pool: sqlx::PgPool) {
    let (app, _) = app(pool.clone());
    let order_id = seed_order(&pool).await;
    let mut parts = filter_and_pads();
    parts[1]["options"][0]["unitPrice"] = json!("79228162514264337593543950335");

    let (status, json) = call(
        &app,
        "POST",
        "/offer/admin",
        ADMIN_KEY,
        Some(json!({ "orderId": order_id, "parts": parts })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
    assert_eq!(json["error"]["code"], "validation_error");
}
