use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Membership document ("memberships" collection).
///
/// Rows are only ever written by a confirmed checkout session, keyed by the
/// gateway's payment identifier. A unique index on `paymentId` makes the
/// confirm path idempotent even under concurrent confirmations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_email: String,
    /// Hex string of the club's ObjectId, not a native reference.
    pub club_id: String,
    /// "active" or "expired".
    pub status: String,
    pub payment_status: String,
    pub payment_id: String,
    pub joined_at: Option<DateTime>,
}

impl Membership {
    pub const COLLECTION: &'static str = "memberships";
    pub const STATUS_ACTIVE: &'static str = "active";
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_document_field_names_match_store() {
        let membership = Membership {
            id: None,
            user_email: "a@x.com".to_string(),
            club_id: "65a1f0aa0000000000000001".to_string(),
            status: Membership::STATUS_ACTIVE.to_string(),
            payment_status: "paid".to_string(),
            payment_id: "pi_123".to_string(),
            joined_at: Some(DateTime::now()),
        };
        let doc = mongodb::bson::to_document(&membership).unwrap();
        assert!(doc.contains_key("userEmail"));
        assert!(doc.contains_key("clubId"));
        assert!(doc.contains_key("paymentId"));
        assert!(doc.contains_key("joinedAt"));
    }
}
