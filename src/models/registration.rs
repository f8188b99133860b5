use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Event registration document ("event_registrations" collection).
///
/// Cancellation is a status transition, never a delete, so (eventId,
/// userEmail) uniqueness only holds across non-cancelled rows. A partial
/// unique index enforces that at the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistration {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub event_id: String,
    pub club_id: String,
    pub user_email: String,
    /// "registered" or "cancelled".
    pub status: String,
    /// Reserved: paid-event registration carries no payment today.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub registered_at: Option<DateTime>,
}

impl EventRegistration {
    pub const COLLECTION: &'static str = "event_registrations";
    pub const STATUS_REGISTERED: &'static str = "registered";
    pub const STATUS_CANCELLED: &'static str = "cancelled";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_payment_id_is_omitted_from_document() {
        let registration = EventRegistration {
            id: None,
            event_id: "65a1f0aa0000000000000002".to_string(),
            club_id: "65a1f0aa0000000000000001".to_string(),
            user_email: "a@x.com".to_string(),
            status: EventRegistration::STATUS_REGISTERED.to_string(),
            payment_id: None,
            registered_at: Some(DateTime::now()),
        };
        let doc = mongodb::bson::to_document(&registration).unwrap();
        assert!(!doc.contains_key("paymentId"));
        assert_eq!(doc.get_str("status").unwrap(), "registered");
    }
}
