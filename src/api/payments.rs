use actix_web::{web, HttpResponse};
use futures::stream::StreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use serde::Deserialize;

use crate::database::MongoDB;
use crate::middleware::identity::Principal;
use crate::models::{Payment, PaymentResponse};
use crate::services::access;
use crate::services::checkout::{self, CreateCheckoutSessionRequest, StripeCheckout};
use crate::utils::ApiError;

/// POST /payment-checkout-session - opens a hosted checkout session for a
/// club's membership fee and hands the redirect URL back to the frontend.
/// Nothing is written locally; membership appears only after confirmation.
#[utoipa::path(
    post,
    path = "/payment-checkout-session",
    tag = "Payments",
    request_body = CreateCheckoutSessionRequest,
    responses(
        (status = 200, description = "Redirect URL for the hosted checkout page"),
        (status = 400, description = "Membership fee is not a parseable amount"),
        (status = 502, description = "Payment gateway rejected the request")
    )
)]
pub async fn create_checkout_session(
    body: web::Json<CreateCheckoutSessionRequest>,
    stripe: web::Data<StripeCheckout>,
) -> Result<HttpResponse, ApiError> {
    let url = checkout::create_checkout_session(&stripe, &body).await?;

    // The frontend only consumes `url`, matching the redirect contract
    Ok(HttpResponse::Ok().json(serde_json::json!({ "url": url })))
}

#[derive(Debug, Deserialize)]
pub struct SessionStatusQuery {
    pub session_id: String,
}

/// GET /session-status?session_id= - the success-page landing call. Reads
/// the session back from the gateway and, on a paid session, records the
/// membership and payment exactly once.
#[utoipa::path(
    get,
    path = "/session-status",
    tag = "Payments",
    params(
        ("session_id" = String, Query, description = "Checkout session id from the success redirect")
    ),
    responses(
        (status = 200, description = "Session status with club name and amount"),
        (status = 502, description = "Payment gateway lookup failed")
    )
)]
pub async fn session_status(
    query: web::Query<SessionStatusQuery>,
    db: web::Data<MongoDB>,
    stripe: web::Data<StripeCheckout>,
) -> Result<HttpResponse, ApiError> {
    let status = checkout::confirm_session(&db, &stripe, &query.session_id).await?;

    Ok(HttpResponse::Ok().json(status))
}

#[derive(Debug, Deserialize)]
pub struct PaymentHistoryQuery {
    pub email: String,
}

/// GET /payments?email= - the caller's own payment history, newest first.
pub async fn list_payments(
    principal: web::ReqData<Principal>,
    query: web::Query<PaymentHistoryQuery>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    access::require_self(&principal.email, &query.email)?;

    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();

    let collection = db.collection::<Payment>(Payment::COLLECTION);
    let mut cursor = collection
        .find(doc! { "userEmail": &query.email })
        .with_options(options)
        .await?;

    let mut payments = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(payment) => payments.push(PaymentResponse::from(payment)),
            Err(e) => log::error!("❌ Error reading payment: {}", e),
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "payments": payments,
        "total": payments.len(),
    })))
}
