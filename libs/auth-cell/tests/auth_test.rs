use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use auth_cell::auth_routes;
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

fn request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header("authorization", bearer);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn validate_echoes_the_principal() {
    let fx = TestFixture::new().await;
    let bearer = fx.bearer(&fx.clinic_user);

    let (status, body) = send(
        auth_routes(fx.state.clone()),
        request("POST", "/validate", Some(&bearer)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["user_id"], fx.clinic_user.id);
    assert_eq!(body["role"], "clinic");
}

#[tokio::test]
async fn validate_rejects_bad_tokens() {
    let fx = TestFixture::new().await;

    let (status, body) = send(auth_routes(fx.state.clone()), request("POST", "/validate", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization header");

    let expired = JwtTestUtils::create_expired_token(&fx.patient_user, &fx.config.jwt_secret);
    let (status, body) = send(
        auth_routes(fx.state.clone()),
        request("POST", "/validate", Some(&format!("Bearer {}", expired))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token expired");

    let forged = JwtTestUtils::create_invalid_signature_token(&fx.patient_user);
    let (status, _) = send(
        auth_routes(fx.state.clone()),
        request("POST", "/validate", Some(&format!("Bearer {}", forged))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verify_reports_validity_without_failing() {
    let fx = TestFixture::new().await;

    let (status, body) = send(
        auth_routes(fx.state.clone()),
        request("POST", "/verify", Some(&fx.bearer(&fx.regulator_user))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let malformed = format!("Bearer {}", JwtTestUtils::create_malformed_token());
    let (status, body) = send(
        auth_routes(fx.state.clone()),
        request("POST", "/verify", Some(&malformed)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn me_returns_the_resolved_profile() {
    let fx = TestFixture::new().await;

    let (status, body) = send(
        auth_routes(fx.state.clone()),
        request("GET", "/me", Some(&fx.bearer(&fx.patient_user))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], fx.patient_user.id);
    assert_eq!(body["profile"]["role"], "patient");
    assert_eq!(body["profile"]["profile"]["id"], fx.patient.id);
    assert_eq!(body["profile"]["profile"]["first_name"], "Aigerim");

    let (status, body) = send(
        auth_routes(fx.state.clone()),
        request("GET", "/me", Some(&fx.bearer(&fx.regulator_user))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["role"], "regulator");
}

#[tokio::test]
async fn me_without_profile_is_not_found() {
    let fx = TestFixture::new().await;
    let stranger = TestUser::clinic(999);

    let (status, body) = send(
        auth_routes(fx.state.clone()),
        request("GET", "/me", Some(&fx.bearer(&stranger))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "clinic profile not found");

    let (status, _) = send(auth_routes(fx.state.clone()), request("GET", "/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
