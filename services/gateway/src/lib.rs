//! Entrega gateway: authentication, orders and real-time fan-out.
//!
//! Request pipeline: authenticate (JWT) -> authorize (role/ownership)
//! -> throttle (fixed window) -> audit -> handler. Order mutations go
//! through the per-order-serialized state machine and end in a
//! room-scoped WebSocket broadcast.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod orders;
pub mod users;
pub mod ws;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use audit::AuditSink;
use auth::jwt::TokenCodec;
use auth::middleware::{authenticate, require_admin, throttle_general, throttle_sensitive};
use auth::rate_limit::{MemoryRateStore, RateLimiter};
use config::Config;
use notify::LogNotifier;
use orders::service::OrderService;
use orders::store::MemoryOrderStore;
use users::UserDirectory;
use ws::hub::Hub;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub codec: Arc<TokenCodec>,
    pub users: Arc<UserDirectory>,
    pub orders: Arc<OrderService>,
    pub hub: Arc<Hub>,
    pub limiter: Arc<RateLimiter>,
    pub audit: AuditSink,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let codec = Arc::new(TokenCodec::new(
            &config.auth.jwt_secret,
            config.auth.access_ttl_hours,
            config.auth.refresh_ttl_hours,
        ));
        let hub = Arc::new(Hub::new());
        let orders = Arc::new(OrderService::new(
            Arc::new(MemoryOrderStore::new()),
            hub.clone(),
            Arc::new(LogNotifier),
        ));
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryRateStore::new()),
            config.rate_limit.general,
            config.rate_limit.sensitive,
        ));
        let audit = AuditSink::new(config.audit.buffer_size);

        Self {
            config,
            codec,
            users: Arc::new(UserDirectory::new()),
            orders,
            hub,
            limiter,
            audit,
            started_at: Utc::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh_token));

    let protected = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::current_user))
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/orders/{id}/transition",
            post(handlers::orders::transition_order),
        )
        .layer(from_fn_with_state(state.clone(), throttle_general))
        .layer(from_fn_with_state(state.clone(), authenticate));

    let admin = Router::new()
        .route("/admin/orders", get(handlers::orders::list_orders))
        .route(
            "/orders/{id}/courier",
            post(handlers::orders::assign_courier),
        )
        .layer(from_fn_with_state(state.clone(), throttle_sensitive))
        .layer(from_fn_with_state(state.clone(), require_admin))
        .layer(from_fn_with_state(state.clone(), authenticate));

    let realtime = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/detailed", get(handlers::health::detailed_health))
        .nest("/api", public.merge(protected).merge(admin))
        .merge(realtime)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
