//! Order endpoints: create, read, transition, courier assignment.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use common::api::success_response;
use errors::EntregaError;

use crate::audit::{AuditEvent, Decision};
use crate::auth::policy::{self, PolicyDenial};
use crate::auth::{Principal, Role};
use crate::error::{ApiError, ApiResult};
use crate::orders::{OrderItem, OrderStatus, TransitionRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub merchant_id: Uuid,
    pub city: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub status: String,
    #[serde(default)]
    pub courier_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AssignCourierBody {
    pub courier_id: Uuid,
}

fn audited_denial(
    state: &AppState,
    principal: &Principal,
    method: &str,
    path: &str,
    denial: PolicyDenial,
) -> ApiError {
    state.audit.record(
        AuditEvent::for_principal(principal, method, path, None, Decision::Forbidden)
            .with_detail(denial.detail()),
    );
    ApiError(denial.into_error())
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Err(denial) = policy::authorize(&principal, &[Role::Client]) {
        return Err(audited_denial(
            &state,
            &principal,
            "POST",
            "/api/orders",
            denial,
        ));
    }

    let order = state
        .orders
        .create(&principal, req.merchant_id, req.city, req.items)
        .await?;
    Ok(success_response(order))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let order = state.orders.get(id).await?;

    // Participants and admin only; the denial is generic so callers
    // cannot distinguish "not yours" from "no such role".
    if principal.role != Role::Admin && !order.is_participant(principal.id) {
        let denial = PolicyDenial::Ownership {
            principal_id: principal.id,
            owner_id: order.client_id,
        };
        return Err(audited_denial(
            &state,
            &principal,
            "GET",
            &format!("/api/orders/{}", id),
            denial,
        ));
    }

    Ok(success_response(order))
}

pub async fn transition_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(body): Json<TransitionBody>,
) -> ApiResult<impl IntoResponse> {
    let status: OrderStatus = body.status.parse()?;
    let request = TransitionRequest {
        status,
        courier_id: body.courier_id,
    };

    match state.orders.transition(id, request, &principal).await {
        Ok(order) => Ok(success_response(order)),
        Err(err) => {
            if matches!(err, EntregaError::Forbidden(_)) {
                state.audit.record(
                    AuditEvent::for_principal(
                        &principal,
                        "POST",
                        &format!("/api/orders/{}/transition", id),
                        None,
                        Decision::Forbidden,
                    )
                    .with_detail(format!(
                        "transition to {} denied for role {}",
                        status, principal.role
                    )),
                );
            }
            Err(ApiError(err))
        },
    }
}

pub async fn assign_courier(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignCourierBody>,
) -> ApiResult<impl IntoResponse> {
    let order = state
        .orders
        .assign_courier(id, body.courier_id, &principal)
        .await?;
    Ok(success_response(order))
}

pub async fn list_orders(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let orders = state.orders.list().await?;
    Ok(success_response(orders))
}
