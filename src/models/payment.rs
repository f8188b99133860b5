use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Payment document ("payments" collection). Written together with its
/// Membership by the checkout confirm path, under the same `paymentId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_email: String,
    /// Whole currency units (gateway minor units divided by 100).
    pub amount: f64,
    #[serde(rename = "type")]
    pub payment_type: String,
    pub status: String,
    pub club_name: String,
    pub payment_id: String,
    pub created_at: Option<DateTime>,
}

impl Payment {
    pub const COLLECTION: &'static str = "payments";
    pub const TYPE_MEMBERSHIP: &'static str = "membership";
}

/// Payment as returned over the API.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: String,
    pub user_email: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub payment_type: String,
    pub status: String,
    pub club_name: String,
    pub payment_id: String,
    pub created_at: Option<String>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        PaymentResponse {
            id: payment.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_email: payment.user_email,
            amount: payment.amount,
            payment_type: payment.payment_type,
            status: payment.status,
            club_name: payment.club_name,
            payment_id: payment.payment_id,
            created_at: payment
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_field_round_trips_through_rename() {
        let payment = Payment {
            id: None,
            user_email: "a@x.com".to_string(),
            amount: 25.0,
            payment_type: Payment::TYPE_MEMBERSHIP.to_string(),
            status: "paid".to_string(),
            club_name: "Chess Club".to_string(),
            payment_id: "pi_123".to_string(),
            created_at: None,
        };
        let doc = mongodb::bson::to_document(&payment).unwrap();
        assert_eq!(doc.get_str("type").unwrap(), "membership");

        let back: Payment = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(back.payment_type, "membership");
    }
}
