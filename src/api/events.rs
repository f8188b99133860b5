use actix_web::{web, HttpResponse};
use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use serde::Deserialize;

use crate::database::MongoDB;
use crate::middleware::identity::Principal;
use crate::models::{CreateEventRequest, Event, EventResponse, UpdateEventRequest};
use crate::services::{access, views};
use crate::utils::ApiError;

/// POST /events - creates an event under a club. Any authenticated user may
/// post one; the clubId is taken from the body as-is.
pub async fn create_event(
    body: web::Json<CreateEventRequest>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let event = Event {
        id: None,
        club_id: body.club_id,
        title: body.title,
        description: body.description,
        event_date: body.event_date,
        location: body.location,
        is_paid: body.is_paid,
        event_fee: body.event_fee,
        max_attendees: body.max_attendees,
        created_at: Some(DateTime::now()),
    };

    let collection = db.collection::<Event>(Event::COLLECTION);
    let result = collection.insert_one(&event).await?;

    log::info!("📅 Created event '{}' for club {}", event.title, event.club_id);

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "eventId": result.inserted_id.as_object_id().map(|id| id.to_hex()),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ManagerEventsQuery {
    pub email: String,
}

/// GET /events?email= - events across the manager's approved clubs, with
/// the club name flattened in.
pub async fn manager_events(
    query: web::Query<ManagerEventsQuery>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let events = views::manager_events(&db, &query.email).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "events": events,
        "total": events.len(),
    })))
}

/// PATCH /events/{eventId} - partial event update.
pub async fn update_event(
    path: web::Path<String>,
    body: web::Json<UpdateEventRequest>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let object_id = ObjectId::parse_str(&id)
        .map_err(|_| ApiError::Validation("Invalid event ID".to_string()))?;

    let mut update_doc = doc! {};
    if let Some(title) = &body.title {
        update_doc.insert("title", title);
    }
    if let Some(description) = &body.description {
        update_doc.insert("description", description);
    }
    if let Some(event_date) = &body.event_date {
        update_doc.insert("eventDate", event_date);
    }
    if let Some(location) = &body.location {
        update_doc.insert("location", location);
    }
    if let Some(is_paid) = body.is_paid {
        update_doc.insert("isPaid", is_paid);
    }
    if let Some(event_fee) = body.event_fee {
        update_doc.insert("eventFee", event_fee);
    }
    if let Some(max_attendees) = body.max_attendees {
        update_doc.insert("maxAttendees", max_attendees);
    }

    // An empty $set is a server-side error, catch it here
    if update_doc.is_empty() {
        return Err(ApiError::Validation("no fields to update".to_string()));
    }

    let collection = db.collection::<Event>(Event::COLLECTION);
    let result = collection
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc })
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Event not found".to_string()));
    }

    log::info!("📅 Updated event {}", id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Event updated",
    })))
}

/// DELETE /events/{eventId} - hard delete. Registrations for the event are
/// left in place and simply stop resolving in the joined views.
pub async fn delete_event(
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let object_id = ObjectId::parse_str(&id)
        .map_err(|_| ApiError::Validation("Invalid event ID".to_string()))?;

    let collection = db.collection::<Event>(Event::COLLECTION);
    let result = collection.delete_one(doc! { "_id": object_id }).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Event not found".to_string()));
    }

    log::info!("🗑️ Deleted event {}", id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Event deleted",
    })))
}

/// GET /clubs/{clubId}/events - the club's events, members only, soonest
/// first.
pub async fn club_events(
    principal: web::ReqData<Principal>,
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let club_id = path.into_inner();
    access::require_active_member(&db, &club_id, &principal.email).await?;

    let options = FindOptions::builder().sort(doc! { "eventDate": 1 }).build();

    let collection = db.collection::<Event>(Event::COLLECTION);
    let mut cursor = collection
        .find(doc! { "clubId": &club_id })
        .with_options(options)
        .await?;

    let mut events = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(event) => events.push(EventResponse::from(event)),
            Err(e) => log::error!("❌ Error reading event: {}", e),
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "events": events,
        "total": events.len(),
    })))
}

/// GET /upcoming/events - public feed of events dated today or later,
/// ascending, each tagged with its club name when the club still exists.
#[utoipa::path(
    get,
    path = "/upcoming/events",
    tag = "Events",
    responses(
        (status = 200, description = "Upcoming events with club names, soonest first")
    )
)]
pub async fn upcoming_events(db: web::Data<MongoDB>) -> Result<HttpResponse, ApiError> {
    let events = views::upcoming_events(&db).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "events": events,
        "total": events.len(),
    })))
}
