use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    domain::entities::subscription::SubscriptionType,
    use_cases::subscription::{NewSubscription, PaymentConfirmation, SubscriptionUseCases},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload {
    user_id: Uuid,
    plan_id: Uuid,
    payment_id: Option<String>,
    subscription_type: SubscriptionType,
    fallback_subscription_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct EligibilityQuery {
    plan: String,
}

#[derive(Serialize)]
struct ListResponse<T> {
    items: Vec<T>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route("/plans", get(list_plans))
        .route("/confirmations", post(confirm_payment))
        .route("/users/{user_id}/active", get(get_active))
        .route("/users/{user_id}/eligibility", get(get_eligibility))
}

async fn list_subscriptions(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
) -> AppResult<impl IntoResponse> {
    let items = use_cases.find_all().await?;
    Ok(Json(ListResponse { items }))
}

async fn list_plans(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
) -> AppResult<impl IntoResponse> {
    let items = use_cases.list_plans().await?;
    Ok(Json(ListResponse { items }))
}

async fn get_active(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let active = use_cases.get_user_active_subscription(user_id).await?;
    Ok(Json(active))
}

async fn get_eligibility(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<EligibilityQuery>,
) -> AppResult<impl IntoResponse> {
    let eligibility = use_cases.can_user_upgrade(user_id, &query.plan).await?;
    Ok(Json(eligibility))
}

async fn create_subscription(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
    Json(payload): Json<CreatePayload>,
) -> AppResult<impl IntoResponse> {
    let args = NewSubscription {
        user_id: payload.user_id,
        plan_id: payload.plan_id,
        payment_id: payload.payment_id,
        subscription_type: payload.subscription_type,
    };

    let created = match payload.fallback_subscription_id {
        Some(fallback_id) => {
            use_cases
                .create_subscription_with_fallback(args, fallback_id)
                .await?
        }
        None => use_cases.create_subscription(args).await?,
    };

    Ok((StatusCode::CREATED, Json(created)))
}

async fn confirm_payment(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
    Json(payload): Json<PaymentConfirmation>,
) -> AppResult<impl IntoResponse> {
    let created = use_cases.confirm_payment(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
