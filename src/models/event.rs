use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::club::{flexible_f64, flexible_f64_opt};

/// Event document ("events" collection). `clubId` is the hex string of the
/// owning club's ObjectId; `eventDate` is an ISO `YYYY-MM-DD` string and the
/// upcoming filter compares it lexically, not temporally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub club_id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: String,
    pub location: Option<String>,
    #[serde(default)]
    pub is_paid: bool,
    /// Stored and served, never charged: paid-event checkout does not exist.
    #[serde(default, deserialize_with = "flexible_f64")]
    pub event_fee: f64,
    pub max_attendees: Option<i64>,
    pub created_at: Option<DateTime>,
}

impl Event {
    pub const COLLECTION: &'static str = "events";
}

/// POST /events body.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub club_id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: String,
    pub location: Option<String>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default, deserialize_with = "flexible_f64")]
    #[schema(value_type = f64)]
    pub event_fee: f64,
    pub max_attendees: Option<i64>,
}

/// PATCH /events/{eventId} body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<String>,
    pub location: Option<String>,
    pub is_paid: Option<bool>,
    #[serde(default, deserialize_with = "flexible_f64_opt")]
    pub event_fee: Option<f64>,
    pub max_attendees: Option<i64>,
}

/// Event as returned over the API.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub club_id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: String,
    pub location: Option<String>,
    pub is_paid: bool,
    pub event_fee: f64,
    pub max_attendees: Option<i64>,
    pub created_at: Option<String>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        EventResponse {
            id: event.id.map(|id| id.to_hex()).unwrap_or_default(),
            club_id: event.club_id,
            title: event.title,
            description: event.description,
            event_date: event.event_date,
            location: event.location,
            is_paid: event.is_paid,
            event_fee: event.event_fee,
            max_attendees: event.max_attendees,
            created_at: event
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_unpaid_event_defaults() {
        let event: Event = mongodb::bson::from_document(doc! {
            "clubId": "65a1f0aa0000000000000001",
            "title": "Friday Blitz",
            "eventDate": "2026-09-01",
        })
        .unwrap();
        assert!(!event.is_paid);
        assert_eq!(event.event_fee, 0.0);
        assert_eq!(event.max_attendees, None);
    }

    #[test]
    fn test_event_date_stays_a_plain_string() {
        let event: Event = mongodb::bson::from_document(doc! {
            "clubId": "65a1f0aa0000000000000001",
            "title": "Friday Blitz",
            "eventDate": "2026-09-01",
        })
        .unwrap();
        let doc = mongodb::bson::to_document(&event).unwrap();
        assert_eq!(doc.get_str("eventDate").unwrap(), "2026-09-01");
    }
}
