//! End-to-end flow through the router: registration, order lifecycle,
//! role gating and room broadcasts.

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use gateway::auth::jwt::TokenCodec;
use gateway::auth::Role;
use gateway::config::Config;
use gateway::ws::hub::{order_room, RoomMessage};
use gateway::{build_router, AppState};

const TEST_SECRET: &str = "integration-test-secret";

fn test_state() -> AppState {
    let mut config = Config::default();
    config.auth.jwt_secret = TEST_SECRET.to_string();
    AppState::new(config)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

struct TestUser {
    token: String,
    id: Uuid,
}

/// Register through the API using the legacy Spanish role aliases the
/// frontend sends.
async fn register_user(app: &Router, email: &str, role_alias: &str) -> TestUser {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": "password123",
                "role": role_alias,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register {} failed: {}", email, body);

    TestUser {
        token: body["data"]["access_token"].as_str().unwrap().to_string(),
        id: body["data"]["user"]["id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap(),
    }
}

#[tokio::test]
async fn full_order_lifecycle_with_room_broadcasts() -> Result<()> {
    let state = test_state();
    state
        .users
        .register("root@entrega.example", "rootpassword", Role::Admin, None)
        .unwrap();
    let app = build_router(state.clone());

    let client = register_user(&app, "cliente@example.com", "cliente").await;
    let merchant = register_user(&app, "tienda@example.com", "comercio").await;
    let courier = register_user(&app, "rider@example.com", "repartidor").await;

    // Client checks out: order starts pending.
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/orders",
            Some(&client.token),
            Some(json!({
                "merchant_id": merchant.id,
                "city": "Madrid",
                "items": [
                    {"name": "bocadillo", "quantity": 2, "unit_price_cents": 350}
                ],
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["total_cents"], 700);
    let order_id: Uuid = body["data"]["id"].as_str().unwrap().parse()?;

    // A watcher subscribes to the order room before any transition.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    state.hub.register("watcher".to_string(), tx);
    state.hub.join("watcher", &order_room(order_id)).unwrap();

    let transition_uri = format!("/api/orders/{}/transition", order_id);

    // Courier cannot move a pending order en_route: the edge itself is
    // invalid, regardless of role.
    let (status, body) = send(
        &app,
        request(
            "POST",
            &transition_uri,
            Some(&courier.token),
            Some(json!({"status": "en_route"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    // Courier asking for a valid edge still gets a generic 403.
    let (status, body) = send(
        &app,
        request(
            "POST",
            &transition_uri,
            Some(&courier.token),
            Some(json!({"status": "accepted"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(body["error"]["message"], "access denied");

    // Merchant accepts and assigns the courier.
    let (status, body) = send(
        &app,
        request(
            "POST",
            &transition_uri,
            Some(&merchant.token),
            Some(json!({"status": "accepted", "courier_id": courier.id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "accepted");
    assert!(body["data"]["accepted_at"].is_string());
    assert_eq!(
        body["data"]["courier_id"].as_str().unwrap(),
        courier.id.to_string()
    );

    // Assigned courier walks the rest of the lifecycle.
    for (next_status, stamp) in [("en_route", "en_route_at"), ("delivered", "delivered_at")] {
        let (status, body) = send(
            &app,
            request(
                "POST",
                &transition_uri,
                Some(&courier.token),
                Some(json!({"status": next_status})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "transition to {}", next_status);
        assert_eq!(body["data"]["status"], next_status);
        assert!(body["data"][stamp].is_string());
    }

    // Terminal: nothing moves a delivered order.
    let (status, body) = send(
        &app,
        request(
            "POST",
            &transition_uri,
            Some(&merchant.token),
            Some(json!({"status": "accepted"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    // Exactly one broadcast per committed transition, in order.
    let mut statuses = Vec::new();
    while let Ok(RoomMessage::Text(payload)) = rx.try_recv() {
        let event: Value = serde_json::from_str(&payload)?;
        assert_eq!(event["type"], "order_update");
        statuses.push(event["status"].as_str().unwrap().to_string());
    }
    assert_eq!(statuses, vec!["accepted", "en_route", "delivered"]);

    // Participants read the order; strangers get a generic 403.
    let (status, _) = send(
        &app,
        request(
            "GET",
            &format!("/api/orders/{}", order_id),
            Some(&client.token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stranger = register_user(&app, "otro@example.com", "cliente").await;
    let (status, body) = send(
        &app,
        request(
            "GET",
            &format!("/api/orders/{}", order_id),
            Some(&stranger.token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "access denied");

    // Admin surface: client denied, admin allowed.
    let (status, _) = send(
        &app,
        request("GET", "/api/admin/orders", Some(&client.token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "root@entrega.example", "password": "rootpassword"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let admin_token = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        request("GET", "/api/admin/orders", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn auth_failures_are_indistinguishable_to_callers() -> Result<()> {
    let state = test_state();
    let app = build_router(state);

    // Missing token.
    let (status, missing) = send(&app, request("GET", "/api/auth/me", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Garbage token.
    let (status, garbage) =
        send(&app, request("GET", "/api/auth/me", Some("not.a.token"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Expired token with a valid signature.
    let expired_codec = TokenCodec::new(TEST_SECRET, -1, 24);
    let expired = expired_codec
        .issue_access(Uuid::new_v4(), "ana@example.com", Role::Client)
        .unwrap();
    let (status, expired_body) =
        send(&app, request("GET", "/api/auth/me", Some(&expired), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Token signed with the wrong secret.
    let forged_codec = TokenCodec::new("wrong-secret", 24, 24);
    let forged = forged_codec
        .issue_access(Uuid::new_v4(), "eve@example.com", Role::Admin)
        .unwrap();
    let (status, forged_body) =
        send(&app, request("GET", "/api/auth/me", Some(&forged), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // All four bodies carry the identical generic error object.
    for body in [&garbage, &expired_body, &forged_body] {
        assert_eq!(body["error"], missing["error"]);
    }

    Ok(())
}

#[tokio::test]
async fn refresh_and_logout_flow() -> Result<()> {
    let state = test_state();
    let app = build_router(state);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "ana@example.com",
                "password": "password123",
                "role": "client",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    // Refresh yields a fresh, working access token.
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_access = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, request("GET", "/api/auth/me", Some(&new_access), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ana@example.com");

    // An access token is never valid as a refresh token.
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": access})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Logout revokes refresh immediately...
    let (status, _) = send(&app, request("POST", "/api/auth/logout", Some(&access), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // ...while outstanding access tokens stay valid until expiry.
    let (status, _) = send(&app, request("GET", "/api/auth/me", Some(&access), None)).await;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn registration_boundary_validation() -> Result<()> {
    let state = test_state();
    let app = build_router(state);

    // Unknown role strings are rejected, not passed through.
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "x@example.com",
                "password": "password123",
                "role": "superuser",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "UNKNOWN_ROLE");

    // Admin is not an open-registration role.
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "x@example.com",
                "password": "password123",
                "role": "admin",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Duplicate email conflicts.
    for _ in 0..2 {
        send(
            &app,
            request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "email": "dup@example.com",
                    "password": "password123",
                    "role": "client",
                })),
            ),
        )
        .await;
    }
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "dup@example.com",
                "password": "password123",
                "role": "client",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_EXISTS");

    Ok(())
}

#[tokio::test]
async fn health_needs_no_token() -> Result<()> {
    let app = build_router(test_state());
    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}
