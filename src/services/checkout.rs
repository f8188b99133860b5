//! Membership purchase through Stripe's hosted checkout.
//!
//! Session creation writes nothing locally; the membership and its payment
//! record only appear when the success page polls `/session-status` and the
//! gateway reports the session as paid. That insert is idempotent on the
//! gateway's payment intent id.

use mongodb::bson::{doc, DateTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::database::MongoDB;
use crate::models::{Membership, Payment};
use crate::utils::{is_duplicate_key_error, ApiError};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

pub const PAYMENT_STATUS_PAID: &str = "paid";

/// POST /payment-checkout-session body: the club the caller is buying a
/// membership for, plus their email.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionRequest {
    /// Hex id of the club document, as the client fetched it.
    #[serde(rename = "_id")]
    pub club_id: String,
    pub club_name: String,
    #[schema(value_type = f64)]
    pub membership_fee: FeeInput,
    pub email: String,
    /// Display name on the checkout page; falls back to the club name.
    pub name: Option<String>,
}

/// Clients send the fee as a number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FeeInput {
    Num(f64),
    Text(String),
}

/// JS `parseInt` semantics: the leading integer of the value's string form,
/// fraction truncated. This decides the charge, so "25.99" charges 25.
pub fn parse_int_fee(fee: &FeeInput) -> Option<i64> {
    match fee {
        FeeInput::Num(n) if n.is_finite() => Some(n.trunc() as i64),
        FeeInput::Num(_) => None,
        FeeInput::Text(s) => {
            let s = s.trim_start();
            let (sign, rest) = match s.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, s.strip_prefix('+').unwrap_or(s)),
            };
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return None;
            }
            digits.parse::<i64>().ok().map(|n| sign * n)
        }
    }
}

/// The slice of Stripe's checkout-session object this service reads.
/// Metadata defaults to empty strings when absent; that gap is logged but
/// not rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub payment_status: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionMetadata {
    #[serde(default, rename = "clubId")]
    pub club_id: String,
    #[serde(default, rename = "clubName")]
    pub club_name: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// What gets charged and what rides along as session metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub product_name: String,
    /// Minor currency units (cents).
    pub unit_amount: i64,
    pub customer_email: String,
    pub club_id: String,
    pub club_name: String,
}

/// Stripe takes its request bodies form-encoded, nested keys in brackets.
fn session_form(params: &SessionParams, site_domain: &str) -> Vec<(String, String)> {
    vec![
        (
            "line_items[0][price_data][currency]".to_string(),
            "USD".to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            params.product_name.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            params.unit_amount.to_string(),
        ),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("customer_email".to_string(), params.customer_email.clone()),
        ("metadata[clubId]".to_string(), params.club_id.clone()),
        ("metadata[clubName]".to_string(), params.club_name.clone()),
        ("mode".to_string(), "payment".to_string()),
        (
            "success_url".to_string(),
            format!(
                "{}/dashboard/payment-success?session_id={{CHECKOUT_SESSION_ID}}",
                site_domain
            ),
        ),
        (
            "cancel_url".to_string(),
            format!("{}/dashboard/payment-cancelled", site_domain),
        ),
    ]
}

/// Hosted-checkout client. Constructed once at startup with the secret key
/// and the frontend origin the redirect URLs point back to, then shared
/// through `web::Data`.
pub struct StripeCheckout {
    http: reqwest::Client,
    secret_key: String,
    site_domain: String,
}

impl StripeCheckout {
    pub fn new(secret_key: String, site_domain: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            site_domain,
        }
    }

    pub async fn create_session(&self, params: &SessionParams) -> Result<CheckoutSession, ApiError> {
        let form = session_form(params, &self.site_domain);

        let response = self
            .http
            .post(format!("{}/checkout/sessions", STRIPE_API_BASE))
            .bearer_auth(&self.secret_key)
            // Gateway-side dedupe if the client submits twice
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .form(&form)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| {
                ApiError::ExternalService(format!("failed to reach payment gateway: {}", e))
            })?;

        Self::parse_session(response).await
    }

    pub async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, ApiError> {
        let url = format!(
            "{}/checkout/sessions/{}",
            STRIPE_API_BASE,
            urlencoding::encode(session_id)
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| {
                ApiError::ExternalService(format!("failed to reach payment gateway: {}", e))
            })?;

        Self::parse_session(response).await
    }

    async fn parse_session(response: reqwest::Response) -> Result<CheckoutSession, ApiError> {
        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("payment gateway returned {}", status));
            return Err(ApiError::ExternalService(message));
        }

        response.json::<CheckoutSession>().await.map_err(|e| {
            ApiError::ExternalService(format!("failed to parse gateway response: {}", e))
        })
    }
}

/// Opens a hosted checkout session and returns the redirect URL. The fee is
/// converted to minor units here; nothing is written locally.
pub async fn create_checkout_session(
    stripe: &StripeCheckout,
    request: &CreateCheckoutSessionRequest,
) -> Result<String, ApiError> {
    let fee = parse_int_fee(&request.membership_fee)
        .ok_or_else(|| ApiError::Validation("membershipFee is not a number".to_string()))?;
    let unit_amount = fee
        .checked_mul(100)
        .ok_or_else(|| ApiError::Validation("membershipFee is out of range".to_string()))?;

    let params = SessionParams {
        product_name: request
            .name
            .clone()
            .unwrap_or_else(|| request.club_name.clone()),
        unit_amount,
        customer_email: request.email.clone(),
        club_id: request.club_id.clone(),
        club_name: request.club_name.clone(),
    };

    log::info!(
        "💳 Opening checkout session for {} ({} cents, club {})",
        params.customer_email,
        params.unit_amount,
        params.club_id
    );

    let session = stripe.create_session(&params).await?;

    session
        .url
        .ok_or_else(|| ApiError::ExternalService("gateway returned no redirect URL".to_string()))
}

/// What the payment-success page polls for.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub status: Option<String>,
    pub club_name: String,
    /// Whole currency units.
    pub amount: f64,
}

impl SessionStatusResponse {
    fn from_session(session: &CheckoutSession) -> Self {
        SessionStatusResponse {
            status: session.status.clone(),
            club_name: session.metadata.club_name.clone(),
            amount: session.amount_total.unwrap_or(0) as f64 / 100.0,
        }
    }
}

/// Confirms a checkout session and performs the idempotent side effect:
/// a paid session ends up with a membership and a payment record under the
/// same `paymentId`. Each row is ensured separately, so a confirmation that
/// died between the two inserts is completed by the next poll instead of
/// leaving the pair half-written. Racing confirmations are settled by the
/// unique indexes on `paymentId`; the loser's duplicate-key insert is the
/// no-op.
pub async fn confirm_session(
    db: &MongoDB,
    stripe: &StripeCheckout,
    session_id: &str,
) -> Result<SessionStatusResponse, ApiError> {
    let session = stripe.retrieve_session(session_id).await?;

    if session.payment_status == PAYMENT_STATUS_PAID {
        match session.payment_intent.clone() {
            Some(payment_intent) => record_paid_session(db, &session, &payment_intent).await?,
            None => log::warn!(
                "⚠️ Paid session {} carries no payment intent, nothing recorded",
                session.id
            ),
        }
    }

    Ok(SessionStatusResponse::from_session(&session))
}

/// The membership row a paid session creates. Keyed by the payment intent
/// so confirmations of the same session collide on the unique index.
fn membership_record(session: &CheckoutSession, payment_intent: &str) -> Membership {
    Membership {
        id: None,
        user_email: session.customer_email.clone().unwrap_or_default(),
        club_id: session.metadata.club_id.clone(),
        status: Membership::STATUS_ACTIVE.to_string(),
        payment_status: session.payment_status.clone(),
        payment_id: payment_intent.to_string(),
        joined_at: Some(DateTime::now()),
    }
}

/// The payment row paired with the membership, under the same payment
/// intent.
fn payment_record(session: &CheckoutSession, payment_intent: &str) -> Payment {
    Payment {
        id: None,
        user_email: session.customer_email.clone().unwrap_or_default(),
        amount: session.amount_total.unwrap_or(0) as f64 / 100.0,
        payment_type: Payment::TYPE_MEMBERSHIP.to_string(),
        status: session.payment_status.clone(),
        club_name: session.metadata.club_name.clone(),
        payment_id: payment_intent.to_string(),
        created_at: Some(DateTime::now()),
    }
}

async fn record_paid_session(
    db: &MongoDB,
    session: &CheckoutSession,
    payment_intent: &str,
) -> Result<(), ApiError> {
    if session.metadata.club_id.is_empty() {
        log::warn!("⚠️ Session {} carries no clubId metadata", session.id);
    }

    let memberships = db.collection::<Membership>(Membership::COLLECTION);
    if memberships
        .find_one(doc! { "paymentId": payment_intent })
        .await?
        .is_none()
    {
        let membership = membership_record(session, payment_intent);
        match memberships.insert_one(&membership).await {
            Ok(_) => log::info!(
                "✅ Recorded membership of {} in club {}",
                membership.user_email,
                membership.club_id
            ),
            // Lost the race to a concurrent confirmation; the record exists
            Err(e) if is_duplicate_key_error(&e) => {
                log::info!("ℹ️ Concurrent confirmation already recorded {}", payment_intent);
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        log::debug!("📦 Membership for {} already recorded", payment_intent);
    }

    // The payment row is ensured even when the membership already exists;
    // a confirmation that died between the two inserts is completed on the
    // next poll.
    let payments = db.collection::<Payment>(Payment::COLLECTION);
    if payments
        .find_one(doc! { "paymentId": payment_intent })
        .await?
        .is_some()
    {
        log::debug!("📦 Payment for {} already recorded", payment_intent);
        return Ok(());
    }

    let payment = payment_record(session, payment_intent);
    match payments.insert_one(&payment).await {
        Ok(_) => {
            log::info!(
                "✅ Recorded payment of {} for {} ({})",
                payment.amount,
                payment.user_email,
                payment.club_name
            );
            Ok(())
        }
        Err(e) if is_duplicate_key_error(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_value<'a>(form: &'a [(String, String)], key: &str) -> &'a str {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or_else(|| panic!("form has no {} field", key))
    }

    #[test]
    fn test_parse_int_fee_from_string() {
        assert_eq!(parse_int_fee(&FeeInput::Text("25".to_string())), Some(25));
        assert_eq!(parse_int_fee(&FeeInput::Text("25.99".to_string())), Some(25));
        assert_eq!(parse_int_fee(&FeeInput::Text("  42".to_string())), Some(42));
        assert_eq!(parse_int_fee(&FeeInput::Text("12abc".to_string())), Some(12));
        assert_eq!(parse_int_fee(&FeeInput::Text("1e3".to_string())), Some(1));
        assert_eq!(parse_int_fee(&FeeInput::Text("-10".to_string())), Some(-10));
    }

    #[test]
    fn test_parse_int_fee_rejects_non_numbers() {
        assert_eq!(parse_int_fee(&FeeInput::Text("free".to_string())), None);
        assert_eq!(parse_int_fee(&FeeInput::Text("".to_string())), None);
        assert_eq!(parse_int_fee(&FeeInput::Text("-".to_string())), None);
        assert_eq!(parse_int_fee(&FeeInput::Num(f64::NAN)), None);
        assert_eq!(parse_int_fee(&FeeInput::Num(f64::INFINITY)), None);
    }

    #[test]
    fn test_parse_int_fee_truncates_numeric_input() {
        assert_eq!(parse_int_fee(&FeeInput::Num(25.0)), Some(25));
        assert_eq!(parse_int_fee(&FeeInput::Num(25.7)), Some(25));
        assert_eq!(parse_int_fee(&FeeInput::Num(-10.9)), Some(-10));
    }

    #[test]
    fn test_session_form_charges_fee_in_minor_units() {
        let params = SessionParams {
            product_name: "Chess Club".to_string(),
            unit_amount: 25 * 100,
            customer_email: "a@x.com".to_string(),
            club_id: "65a1f0aa0000000000000001".to_string(),
            club_name: "Chess Club".to_string(),
        };
        let form = session_form(&params, "http://localhost:5173");

        assert_eq!(form_value(&form, "line_items[0][price_data][unit_amount]"), "2500");
        assert_eq!(form_value(&form, "line_items[0][price_data][currency]"), "USD");
        assert_eq!(form_value(&form, "line_items[0][quantity]"), "1");
        assert_eq!(form_value(&form, "mode"), "payment");
    }

    #[test]
    fn test_session_form_carries_club_metadata_and_redirects() {
        let params = SessionParams {
            product_name: "Chess Club".to_string(),
            unit_amount: 2500,
            customer_email: "a@x.com".to_string(),
            club_id: "65a1f0aa0000000000000001".to_string(),
            club_name: "Chess Club".to_string(),
        };
        let form = session_form(&params, "https://club-sphere.app");

        assert_eq!(form_value(&form, "metadata[clubId]"), "65a1f0aa0000000000000001");
        assert_eq!(form_value(&form, "metadata[clubName]"), "Chess Club");
        assert_eq!(form_value(&form, "customer_email"), "a@x.com");
        assert_eq!(
            form_value(&form, "success_url"),
            "https://club-sphere.app/dashboard/payment-success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(
            form_value(&form, "cancel_url"),
            "https://club-sphere.app/dashboard/payment-cancelled"
        );
    }

    #[test]
    fn test_session_deserializes_from_gateway_json() {
        let raw = serde_json::json!({
            "id": "cs_test_a1B2",
            "object": "checkout.session",
            "status": "complete",
            "payment_status": "paid",
            "payment_intent": "pi_3abc",
            "customer_email": "a@x.com",
            "amount_total": 2500,
            "metadata": { "clubId": "65a1f0aa0000000000000001", "clubName": "Chess Club" }
        });

        let session: CheckoutSession = serde_json::from_value(raw).unwrap();
        assert_eq!(session.payment_status, "paid");
        assert_eq!(session.payment_intent.as_deref(), Some("pi_3abc"));
        assert_eq!(session.metadata.club_name, "Chess Club");
        assert_eq!(session.amount_total, Some(2500));
    }

    #[test]
    fn test_missing_metadata_defaults_to_empty_strings() {
        let raw = serde_json::json!({
            "id": "cs_test_a1B2",
            "status": "open",
            "payment_status": "unpaid"
        });

        let session: CheckoutSession = serde_json::from_value(raw).unwrap();
        assert_eq!(session.metadata.club_id, "");
        assert_eq!(session.metadata.club_name, "");
        assert!(session.payment_intent.is_none());
    }

    #[test]
    fn test_status_response_converts_amount_to_whole_units() {
        let session = CheckoutSession {
            id: "cs_test_a1B2".to_string(),
            url: None,
            status: Some("complete".to_string()),
            payment_status: "paid".to_string(),
            payment_intent: Some("pi_3abc".to_string()),
            customer_email: Some("a@x.com".to_string()),
            amount_total: Some(2500),
            metadata: SessionMetadata {
                club_id: "65a1f0aa0000000000000001".to_string(),
                club_name: "Chess Club".to_string(),
            },
        };

        let response = SessionStatusResponse::from_session(&session);
        assert_eq!(response.status.as_deref(), Some("complete"));
        assert_eq!(response.club_name, "Chess Club");
        assert_eq!(response.amount, 25.0);
    }

    #[test]
    fn test_fee_input_accepts_number_or_string_body() {
        let from_number: CreateCheckoutSessionRequest = serde_json::from_value(serde_json::json!({
            "_id": "65a1f0aa0000000000000001",
            "clubName": "Chess Club",
            "membershipFee": 25,
            "email": "a@x.com"
        }))
        .unwrap();
        assert_eq!(parse_int_fee(&from_number.membership_fee), Some(25));

        let from_string: CreateCheckoutSessionRequest = serde_json::from_value(serde_json::json!({
            "_id": "65a1f0aa0000000000000001",
            "clubName": "Chess Club",
            "membershipFee": "25",
            "email": "a@x.com"
        }))
        .unwrap();
        assert_eq!(parse_int_fee(&from_string.membership_fee), Some(25));
        assert!(from_string.name.is_none());
    }

    #[tokio::test]
    async fn test_fee_overflowing_minor_units_is_rejected() {
        // Parses as an i64 but the minor-unit conversion would exceed i64::MAX
        let request: CreateCheckoutSessionRequest = serde_json::from_value(serde_json::json!({
            "_id": "65a1f0aa0000000000000001",
            "clubName": "Chess Club",
            "membershipFee": "92233720368547759",
            "email": "a@x.com"
        }))
        .unwrap();
        let stripe = StripeCheckout::new(
            "sk_test_unused".to_string(),
            "http://localhost:5173".to_string(),
        );

        // Rejected before the gateway is contacted
        match create_checkout_session(&stripe, &request).await {
            Err(ApiError::Validation(message)) => assert!(message.contains("out of range")),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_paid_session_yields_membership_and_payment_under_one_id() {
        let session = CheckoutSession {
            id: "cs_test_a1B2".to_string(),
            url: None,
            status: Some("complete".to_string()),
            payment_status: "paid".to_string(),
            payment_intent: Some("pi_3abc".to_string()),
            customer_email: Some("a@x.com".to_string()),
            amount_total: Some(2500),
            metadata: SessionMetadata {
                club_id: "65a1f0aa0000000000000001".to_string(),
                club_name: "Chess Club".to_string(),
            },
        };

        let membership = membership_record(&session, "pi_3abc");
        let payment = payment_record(&session, "pi_3abc");

        // Both rows key on the same payment intent
        assert_eq!(membership.payment_id, "pi_3abc");
        assert_eq!(payment.payment_id, "pi_3abc");
        assert_eq!(membership.user_email, "a@x.com");
        assert_eq!(membership.club_id, "65a1f0aa0000000000000001");
        assert_eq!(membership.status, Membership::STATUS_ACTIVE);
        assert_eq!(membership.payment_status, "paid");
        assert_eq!(payment.user_email, "a@x.com");
        assert_eq!(payment.amount, 25.0);
        assert_eq!(payment.payment_type, Payment::TYPE_MEMBERSHIP);
        assert_eq!(payment.club_name, "Chess Club");
    }
}
