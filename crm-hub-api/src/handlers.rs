//! API request handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use crm_hub_core::{
    CampaignDraft, CampaignStatus, CampaignView, CreateCampaignRequest, CreateCustomerRequest,
    CreateOrderRequest, Customer, DashboardStats, GenerateRulesRequest, GenerateRulesResponse,
    ListResponse, Order, PreviewAudienceRequest, PreviewAudienceResponse, RuleSet,
};
use crm_hub_delivery::DeliveryJob;
use crm_hub_storage::{CampaignStorage, CustomerStorage, OrderStorage};
use std::sync::Arc;
use uuid::Uuid;

use crate::{ApiError, AppState};

// ==================== Customer Handlers ====================

/// Register a customer
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateCustomerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let customer = Customer::register(req, Utc::now().date_naive())?;
    let saved = CustomerStorage::save(state.storage.as_ref(), customer).await?;

    tracing::info!("Registered customer {} ({})", saved.email, saved.id);

    Ok((StatusCode::CREATED, Json(saved)))
}

/// List customers in registration order
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let customers = CustomerStorage::list(state.storage.as_ref()).await?;
    Ok(Json(ListResponse::new(customers)))
}

// ==================== Order Handlers ====================

/// Record an order and fold it into the customer's stats
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let order = Order::place(&req, Utc::now())?;

    if CustomerStorage::get_by_id(state.storage.as_ref(), order.customer_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(format!(
            "Customer with id {} not found",
            order.customer_id
        )));
    }

    let saved = OrderStorage::save(state.storage.as_ref(), order).await?;

    // The order stays recorded even if the customer update fails
    match state.storage.apply_order(&saved).await {
        Ok(customer) => tracing::info!(
            "Recorded order {} of {} for customer {} (spend {}, visits {})",
            saved.id,
            saved.amount,
            customer.id,
            customer.total_spend,
            customer.visits
        ),
        Err(e) => tracing::warn!(
            "Order {} saved but customer {} was not updated, needs reconciliation: {}",
            saved.id,
            saved.customer_id,
            e
        ),
    }

    Ok((StatusCode::CREATED, Json(saved)))
}

/// Order history for one customer, newest first
pub async fn list_customer_orders(
    State(state): State<Arc<AppState>>,
    customer_id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(customer_id) = customer_id?;
    if CustomerStorage::get_by_id(state.storage.as_ref(), customer_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(format!(
            "Customer with id {} not found",
            customer_id
        )));
    }

    let orders = state.storage.list_by_customer(customer_id).await?;
    Ok(Json(ListResponse::new(orders)))
}

// ==================== Campaign Handlers ====================

/// Submit a campaign: size its audience now and hand delivery to the worker
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateCampaignRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let rules = RuleSet::from_json(&req.rules)?;
    let draft = CampaignDraft::new(&req.name, rules)?;

    let customers = CustomerStorage::list(state.storage.as_ref()).await?;
    let audience = state.evaluator.evaluate(&draft.rules, &customers);
    let recipients = audience.customer_ids();

    let campaign = draft.submit(audience.size());
    let saved = CampaignStorage::save(state.storage.as_ref(), campaign).await?;

    tracing::info!(
        "Campaign '{}' ({}) submitted to {} customers",
        saved.name,
        saved.id,
        saved.audience_size
    );

    let job = DeliveryJob {
        campaign_id: saved.id,
        recipients,
    };
    if let Err(e) = state.delivery.enqueue(job) {
        tracing::error!("Could not queue delivery for campaign {}: {}", saved.id, e);
        let mut failed = saved;
        failed.transition(CampaignStatus::Failed)?;
        let failed = CampaignStorage::update(state.storage.as_ref(), failed).await?;
        return Ok((StatusCode::CREATED, Json(CampaignView::from(failed))));
    }

    Ok((StatusCode::CREATED, Json(CampaignView::from(saved))))
}

/// Campaign history, newest first
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let campaigns = CampaignStorage::list(state.storage.as_ref()).await?;
    let views: Vec<CampaignView> = campaigns.into_iter().map(CampaignView::from).collect();
    Ok(Json(ListResponse::new(views)))
}

/// Get a campaign by ID
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let campaign = CampaignStorage::get_by_id(state.storage.as_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Campaign with id {} not found", id)))?;

    Ok(Json(CampaignView::from(campaign)))
}

/// Size an audience without persisting anything
pub async fn preview_audience(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PreviewAudienceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let rules = RuleSet::from_json(&req.rules)?;

    let customers = CustomerStorage::list(state.storage.as_ref()).await?;
    let audience = state.evaluator.evaluate(&rules, &customers);

    Ok(Json(PreviewAudienceResponse {
        audience_size: audience.size(),
        rules_description: rules.describe(),
    }))
}

// ==================== Rule Generation ====================

/// Turn a free-text prompt into a validated rule set
pub async fn generate_rules(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRulesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let rules =
        crm_hub_rulegen::generate_rules(state.rule_generator.as_ref(), &req.prompt).await?;
    Ok(Json(GenerateRulesResponse { rules }))
}

// ==================== Dashboard ====================

pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let customers = CustomerStorage::list(state.storage.as_ref()).await?;
    let campaigns = CampaignStorage::list(state.storage.as_ref()).await?;
    let stats = DashboardStats::compute(&customers, campaigns.len() as u64)?;
    Ok(Json(stats))
}

// ==================== Health Check ====================

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "crm-hub"
    }))
}
