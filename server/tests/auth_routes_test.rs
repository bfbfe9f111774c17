mod common;

use axum::http::{header, StatusCode};
use common::*;
use serde_json::json;

#[tokio::test]
async fn health_reports_service_identity() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());
    let resp = send(&app.router, get("/health", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Audria API");
    assert_eq!(body["version"], "1.0.0");
}

#[tokio::test]
async fn auth_status_reports_backend_configuration() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());
    let body = body_json(send(&app.router, get("/api/auth/status", None)).await).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["supabase_configured"], true);
}

#[tokio::test]
async fn signin_returns_session_and_rejects_bad_password() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let ok = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/signin",
            None,
            &json!({"email": "Alice@Example.com", "password": "secret"}),
        ),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);
    let body = body_json(ok).await;
    assert_eq!(body["session"]["access_token"], ALICE_TOKEN);
    assert_eq!(body["session"]["user"]["id"], ALICE);

    let bad = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/signin",
            None,
            &json!({"email": "alice@example.com", "password": "nope"}),
        ),
    )
    .await;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(bad).await["detail"], "Invalid login credentials");
}

#[tokio::test]
async fn signup_failure_is_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let created = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/signup",
            None,
            &json!({"email": "carol@example.com", "password": "pw123456", "name": "Carol"}),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::OK);
    let body = body_json(created).await;
    assert_eq!(
        body["message"],
        "User created successfully. Please check your email for verification."
    );
    assert!(body.get("session").is_none());

    let dup = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/signup",
            None,
            &json!({"email": "alice@example.com", "password": "pw123456"}),
        ),
    )
    .await;
    assert_eq!(dup.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(dup).await["detail"], "User already registered");
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let missing = send(&app.router, get("/api/auth/me", None)).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        missing.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
    assert_eq!(body_json(missing).await["detail"], "Not authenticated");

    let forged = send(&app.router, get("/api/auth/me", Some("forged"))).await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(forged).await["detail"],
        "Could not validate credentials"
    );

    let ok = send(&app.router, get("/api/auth/me", Some(ALICE_TOKEN))).await;
    assert_eq!(ok.status(), StatusCode::OK);
    let body = body_json(ok).await;
    assert_eq!(body["user"]["id"], ALICE);
    assert_eq!(body["user"]["email"], "alice@example.com");
}

#[tokio::test]
async fn refresh_uses_bearer_as_refresh_token() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let refresh = format!("refresh-{ALICE_TOKEN}");
    let ok = send(
        &app.router,
        json_request("POST", "/api/auth/refresh", Some(&refresh), &json!({})),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let bad = send(
        &app.router,
        json_request("POST", "/api/auth/refresh", Some("stale"), &json!({})),
    )
    .await;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
    let detail = body_json(bad).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Token refresh failed"), "{detail}");
}

#[tokio::test]
async fn signout_forwards_access_token() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());
    let resp = send(
        &app.router,
        json_request("POST", "/api/auth/signout", Some(BOB_TOKEN), &json!({})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(*app.auth.signed_out.lock().unwrap(), vec![BOB_TOKEN.to_string()]);
}

#[tokio::test]
async fn forgot_password_never_reveals_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    for email in ["  Dave@Example.com ", "x@fail.test"] {
        let resp = send(
            &app.router,
            json_request(
                "POST",
                "/api/auth/forgot-password",
                None,
                &json!({ "email": email }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(
            body["message"],
            "If an account with this email exists, you will receive a password reset email shortly."
        );
    }

    let resets = app.auth.resets.lock().unwrap().clone();
    assert_eq!(resets[0].0, "dave@example.com");
    assert_eq!(
        resets[0].1,
        format!("{}/reset-password", app.config.frontend_url)
    );
}

#[tokio::test]
async fn reset_password_rejects_stale_token() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let ok = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/reset-password",
            None,
            &json!({"access_token": ALICE_TOKEN, "new_password": "n3w-pass"}),
        ),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let stale = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/reset-password",
            None,
            &json!({"access_token": "expired", "new_password": "n3w-pass"}),
        ),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(stale).await["detail"],
        "Invalid or expired reset token"
    );
}
