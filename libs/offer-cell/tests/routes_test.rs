use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use offer_cell::router::{clinic_offer_routes, patient_offer_routes};
use shared_utils::test_utils::{JwtTestUtils, TestFixture, TestUser};

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn post_json(uri: &str, bearer: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", bearer)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", bearer)
        .body(Body::empty())
        .unwrap()
}

fn offer_body(plan_id: i64, total_cost: i64) -> Value {
    json!({
        "treatment_plan_id": plan_id,
        "therapy_cost": 38000,
        "orthopedics_cost": 105000,
        "surgery_cost": 35000,
        "hygiene_cost": 13500,
        "total_cost": total_cost,
        "estimated_duration": "3 months",
        "installment_months": 6
    })
}

#[tokio::test]
async fn clinic_submits_offer_and_patient_selects_it() {
    let fx = TestFixture::new().await;
    let clinic_bearer = fx.bearer(&fx.clinic_user);
    let patient_bearer = fx.bearer(&fx.patient_user);

    let (status, offer) = send(
        clinic_offer_routes(fx.state.clone()),
        post_json("/offers", &clinic_bearer, offer_body(fx.plan.id, 191_500)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(offer["status"], "sent");
    assert_eq!(offer["total_cost"], 191_500);
    assert_eq!(offer["clinic_id"], fx.clinic.id);
    let offer_id = offer["id"].as_i64().unwrap();

    let (status, listed) = send(
        patient_offer_routes(fx.state.clone()),
        get(&format!("/plans/{}/offers", fx.plan.id), &patient_bearer),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["offers"][0]["id"], offer_id);
    assert_eq!(listed["offers"][0]["clinic"]["name"], "Dental Lux");

    let (status, selected) = send(
        patient_offer_routes(fx.state.clone()),
        post_json("/select-offer", &patient_bearer, json!({ "offer_id": offer_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selected["offer"]["status"], "accepted");
    assert_eq!(selected["treatment_plan_id"], fx.plan.id);
    assert_eq!(selected["appointment"]["status"], "scheduled");
    assert_eq!(selected["appointment"]["clinic_offer_id"], offer_id);

    let (status, body) = send(
        patient_offer_routes(fx.state.clone()),
        post_json("/select-offer", &patient_bearer, json!({ "offer_id": offer_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already been selected"));
}

#[tokio::test]
async fn duplicate_offer_is_a_conflict() {
    let fx = TestFixture::new().await;
    let bearer = fx.bearer(&fx.clinic_user);

    let (status, _) = send(
        clinic_offer_routes(fx.state.clone()),
        post_json("/offers", &bearer, offer_body(fx.plan.id, 191_500)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        clinic_offer_routes(fx.state.clone()),
        post_json("/offers", &bearer, offer_body(fx.plan.id, 180_000)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_offer_is_a_bad_request() {
    let fx = TestFixture::new().await;

    let (status, body) = send(
        clinic_offer_routes(fx.state.clone()),
        post_json("/offers", &fx.bearer(&fx.clinic_user), offer_body(fx.plan.id, 0)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn incoming_plans_hide_plans_already_bid_on() {
    let fx = TestFixture::new().await;
    let bearer = fx.bearer(&fx.clinic_user);

    let (status, body) = send(
        clinic_offer_routes(fx.state.clone()),
        get("/incoming-plans", &bearer),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["plans"][0]["id"], fx.plan.id);

    send(
        clinic_offer_routes(fx.state.clone()),
        post_json("/offers", &bearer, offer_body(fx.plan.id, 191_500)),
    )
    .await;

    let (_, body) = send(
        clinic_offer_routes(fx.state.clone()),
        get("/incoming-plans?status=offers_received", &bearer),
    )
    .await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn unknown_plan_offers_are_not_found() {
    let fx = TestFixture::new().await;

    let (status, _) = send(
        patient_offer_routes(fx.state.clone()),
        get("/plans/9999/offers", &fx.bearer(&fx.patient_user)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        patient_offer_routes(fx.state.clone()),
        get(
            &format!("/plans/{}/offers", fx.plan.id),
            &fx.bearer(&fx.other_patient_user),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn role_mismatch_is_forbidden() {
    let fx = TestFixture::new().await;

    let (status, _) = send(
        clinic_offer_routes(fx.state.clone()),
        post_json(
            "/offers",
            &fx.bearer(&fx.patient_user),
            offer_body(fx.plan.id, 191_500),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        patient_offer_routes(fx.state.clone()),
        post_json(
            "/select-offer",
            &fx.bearer(&fx.clinic_user),
            json!({ "offer_id": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bad_tokens_are_unauthorized() {
    let fx = TestFixture::new().await;

    let missing = Request::builder()
        .method("GET")
        .uri("/incoming-plans")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(clinic_offer_routes(fx.state.clone()), missing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization header");

    let expired = JwtTestUtils::create_expired_token(&fx.clinic_user, &fx.config.jwt_secret);
    let (status, _) = send(
        clinic_offer_routes(fx.state.clone()),
        get("/incoming-plans", &format!("Bearer {expired}")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Valid token, but no clinic profile behind it
    let stranger = TestUser::clinic(999);
    let (status, _) = send(
        clinic_offer_routes(fx.state.clone()),
        get("/incoming-plans", &fx.bearer(&stranger)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
