use actix_web::{web, HttpResponse};
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};

use crate::database::MongoDB;
use crate::middleware::identity::Principal;
use crate::models::{Event, EventRegistration};
use crate::services::{access, views};
use crate::utils::{is_duplicate_key_error, ApiError};

/// Filter matching the caller's live registration for an event. Cancelled
/// rows never match, so a member can re-register after cancelling.
fn registration_conflict_filter(event_id: &str, user_email: &str) -> Document {
    doc! {
        "eventId": event_id,
        "userEmail": user_email,
        "status": EventRegistration::STATUS_REGISTERED,
    }
}

/// POST /events/{eventId}/register - active club members only, one live
/// registration per member per event. Paid events register like free ones;
/// no charge is taken here.
#[utoipa::path(
    post,
    path = "/events/{eventId}/register",
    tag = "Registrations",
    params(
        ("eventId" = String, Path, description = "Event ObjectId (hex)")
    ),
    responses(
        (status = 201, description = "Registration created"),
        (status = 401, description = "Missing bearer token"),
        (status = 403, description = "Caller is not an active member of the club"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Already registered for this event")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn register_for_event(
    principal: web::ReqData<Principal>,
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let event_id = path.into_inner();
    let object_id = ObjectId::parse_str(&event_id)
        .map_err(|_| ApiError::Validation("Invalid event ID".to_string()))?;

    let events = db.collection::<Event>(Event::COLLECTION);
    let event = events
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    access::require_active_member(&db, &event.club_id, &principal.email).await?;

    let registrations = db.collection::<EventRegistration>(EventRegistration::COLLECTION);
    if registrations
        .find_one(registration_conflict_filter(&event_id, &principal.email))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "Already registered for this event".to_string(),
        ));
    }

    let registration = EventRegistration {
        id: None,
        event_id: event_id.clone(),
        club_id: event.club_id.clone(),
        user_email: principal.email.clone(),
        status: EventRegistration::STATUS_REGISTERED.to_string(),
        payment_id: None,
        registered_at: Some(DateTime::now()),
    };

    let result = match registrations.insert_one(&registration).await {
        Ok(result) => result,
        // The partial unique index catches two concurrent registrations
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(ApiError::Conflict(
                "Already registered for this event".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    log::info!(
        "🎟️ {} registered for event {} (club {})",
        principal.email,
        event_id,
        event.club_id
    );

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "registrationId": result.inserted_id.as_object_id().map(|id| id.to_hex()),
    })))
}

/// PATCH /events/{eventId}/cancel - flips the caller's live registration to
/// cancelled. The row stays behind for history; only live rows can match.
pub async fn cancel_registration(
    principal: web::ReqData<Principal>,
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let event_id = path.into_inner();

    let registrations = db.collection::<EventRegistration>(EventRegistration::COLLECTION);
    let result = registrations
        .update_one(
            registration_conflict_filter(&event_id, &principal.email),
            doc! { "$set": { "status": EventRegistration::STATUS_CANCELLED } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound(
            "No active registration for this event".to_string(),
        ));
    }

    log::info!("🎟️ {} cancelled registration for event {}", principal.email, event_id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Registration cancelled",
    })))
}

/// GET /events/{eventId}/registrations - attendee list with user profiles,
/// visible to active members of the hosting club.
pub async fn event_registrations(
    principal: web::ReqData<Principal>,
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let event_id = path.into_inner();
    let object_id = ObjectId::parse_str(&event_id)
        .map_err(|_| ApiError::Validation("Invalid event ID".to_string()))?;

    // The membership gate needs the hosting club, so resolve the event first
    let events = db.collection::<Event>(Event::COLLECTION);
    let event = events
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    access::require_active_member(&db, &event.club_id, &principal.email).await?;

    let attendees = views::event_attendees(&db, &event_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "registrations": attendees,
        "total": attendees.len(),
    })))
}

/// GET /my-events - the caller's non-cancelled registrations resolved to
/// event and club documents.
pub async fn my_events(
    principal: web::ReqData<Principal>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let events = views::my_events(&db, &principal.email).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "events": events,
        "total": events.len(),
    })))
}

/// GET /clubs/{clubId}/registrations - every registration under a club,
/// cancelled included, joined to event and registrant.
pub async fn club_registrations(
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let club_id = path.into_inner();
    let registrations = views::club_registrations(&db, &club_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "registrations": registrations,
        "total": registrations.len(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_filter_only_matches_live_registrations() {
        let filter = registration_conflict_filter("65a1f0aa0000000000000002", "a@x.com");
        assert_eq!(
            filter.get_str("eventId").unwrap(),
            "65a1f0aa0000000000000002"
        );
        assert_eq!(filter.get_str("userEmail").unwrap(), "a@x.com");
        // A cancelled row must never block re-registration
        assert_eq!(filter.get_str("status").unwrap(), "registered");
    }
}
