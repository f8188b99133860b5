//! Denormalized read views over the entity collections.
//!
//! Every collection stores cross-references as plain hex strings, so each
//! view is an aggregation that joins `$toString(_id)` against those strings.
//! The pipeline builders are pure functions; the runners execute them and
//! convert the resulting documents into plain JSON (ObjectIds become hex
//! strings, datetimes become RFC 3339 strings, the way clients expect them).

use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};

use crate::database::MongoDB;
use crate::models::{Club, Event, EventRegistration, Membership};
use crate::utils::ApiError;

/// Club document joined with its manager's user profile as `organizer`.
///
/// The organizer lookup keeps clubs whose manager matches no user record:
/// those come back with `organizer` null instead of disappearing, so a 404
/// from this view always means the club id itself is unknown.
pub fn club_detail_pipeline(club_id: ObjectId) -> Vec<Document> {
    vec![
        doc! { "$match": { "_id": club_id } },
        doc! { "$lookup": {
            "from": "users",
            "localField": "managerEmail",
            "foreignField": "email",
            "as": "organizer",
        }},
        doc! { "$project": {
            "organizer.photoURL": 0,
            "organizer._id": 0,
            "organizer.role": 0,
            "organizer.createdAt": 0,
            "updatedAt": 0,
        }},
        doc! { "$unwind": {
            "path": "$organizer",
            "preserveNullAndEmptyArrays": true,
        }},
    ]
}

/// Clubs managed by `manager_email`, each with the raw membership rows whose
/// `clubId` string-matches the club's ObjectId.
pub fn clubs_with_members_pipeline(manager_email: &str) -> Vec<Document> {
    vec![
        doc! { "$match": { "managerEmail": manager_email } },
        doc! { "$lookup": {
            "from": "memberships",
            "let": { "clubId": { "$toString": "$_id" } },
            "pipeline": [
                { "$match": { "$expr": { "$eq": ["$clubId", "$$clubId"] } } },
            ],
            "as": "members",
        }},
    ]
}

/// Roster per approved club: membership rows outer-joined to user profiles,
/// grouped back into one row per club.
///
/// Both unwinds preserve nulls, so a club with zero memberships still shows
/// up (its members list holds a single empty placeholder), and a membership
/// whose user record is gone still lists its email and status.
pub fn club_roster_pipeline(manager_email: &str) -> Vec<Document> {
    vec![
        doc! { "$match": {
            "managerEmail": manager_email,
            "status": Club::STATUS_APPROVED,
        }},
        doc! { "$lookup": {
            "from": "memberships",
            "let": { "clubId": { "$toString": "$_id" } },
            "pipeline": [
                { "$match": { "$expr": { "$eq": ["$clubId", "$$clubId"] } } },
            ],
            "as": "membership",
        }},
        doc! { "$unwind": {
            "path": "$membership",
            "preserveNullAndEmptyArrays": true,
        }},
        doc! { "$lookup": {
            "from": "users",
            "localField": "membership.userEmail",
            "foreignField": "email",
            "as": "memberProfile",
        }},
        doc! { "$unwind": {
            "path": "$memberProfile",
            "preserveNullAndEmptyArrays": true,
        }},
        doc! { "$group": {
            "_id": "$_id",
            "clubName": { "$first": "$clubName" },
            "members": { "$push": {
                "name": "$memberProfile.name",
                "membershipId": { "$toString": "$membership._id" },
                "email": "$membership.userEmail",
                "status": "$membership.status",
                "joinDate": "$membership.joinedAt",
            }},
        }},
    ]
}

/// Active memberships of `user_email` resolved to their club documents, with
/// the membership's status, join date and payment id merged in.
///
/// The unwind here does NOT preserve nulls: a membership pointing at a
/// deleted club silently drops out of the result instead of erroring.
pub fn my_clubs_pipeline(user_email: &str) -> Vec<Document> {
    vec![
        doc! { "$match": {
            "userEmail": user_email,
            "status": Membership::STATUS_ACTIVE,
        }},
        doc! { "$lookup": {
            "from": "clubs",
            "let": { "clubId": "$clubId" },
            "pipeline": [
                { "$match": { "$expr": { "$eq": [{ "$toString": "$_id" }, "$$clubId"] } } },
            ],
            "as": "club",
        }},
        doc! { "$unwind": "$club" },
        doc! { "$replaceRoot": { "newRoot": { "$mergeObjects": [
            "$club",
            {
                "membershipId": { "$toString": "$_id" },
                "membershipStatus": "$status",
                "joinedAt": "$joinedAt",
                "paymentId": "$paymentId",
            },
        ]}}},
    ]
}

/// Events flattened with their club's name, restricted to approved clubs
/// managed by `manager_email`. Events whose club link dangles are dropped.
pub fn manager_events_pipeline(manager_email: &str) -> Vec<Document> {
    vec![
        doc! { "$lookup": {
            "from": "clubs",
            "let": { "clubId": "$clubId" },
            "pipeline": [
                { "$match": { "$expr": { "$eq": [{ "$toString": "$_id" }, "$$clubId"] } } },
            ],
            "as": "club",
        }},
        doc! { "$unwind": "$club" },
        doc! { "$match": {
            "club.managerEmail": manager_email,
            "club.status": Club::STATUS_APPROVED,
        }},
        doc! { "$project": {
            "clubId": 1,
            "title": 1,
            "description": 1,
            "eventDate": 1,
            "location": 1,
            "isPaid": 1,
            "eventFee": 1,
            "maxAttendees": 1,
            "createdAt": 1,
            "clubName": "$club.clubName",
        }},
    ]
}

/// Public listing of events on or after `today`, ascending by date.
///
/// `eventDate` is an ISO `YYYY-MM-DD` string and the cutoff is a lexical
/// string comparison, not a temporal one. The club join is a left join:
/// events whose club is gone still appear, with `clubName` null.
pub fn upcoming_events_pipeline(today: &str) -> Vec<Document> {
    vec![
        doc! { "$match": { "eventDate": { "$gte": today } } },
        doc! { "$lookup": {
            "from": "clubs",
            "let": { "clubId": "$clubId" },
            "pipeline": [
                { "$match": { "$expr": { "$eq": [{ "$toString": "$_id" }, "$$clubId"] } } },
            ],
            "as": "club",
        }},
        doc! { "$unwind": {
            "path": "$club",
            "preserveNullAndEmptyArrays": true,
        }},
        doc! { "$addFields": { "clubName": { "$ifNull": ["$club.clubName", null] } } },
        doc! { "$project": { "club": 0 } },
        doc! { "$sort": { "eventDate": 1 } },
    ]
}

/// The caller's non-cancelled registrations, resolved through event to club.
/// A registration whose event or club has been deleted drops out.
pub fn my_events_pipeline(user_email: &str) -> Vec<Document> {
    vec![
        doc! { "$match": {
            "userEmail": user_email,
            "status": { "$ne": EventRegistration::STATUS_CANCELLED },
        }},
        doc! { "$lookup": {
            "from": "events",
            "let": { "eventId": "$eventId" },
            "pipeline": [
                { "$match": { "$expr": { "$eq": [{ "$toString": "$_id" }, "$$eventId"] } } },
            ],
            "as": "event",
        }},
        doc! { "$unwind": "$event" },
        doc! { "$lookup": {
            "from": "clubs",
            "let": { "clubId": "$clubId" },
            "pipeline": [
                { "$match": { "$expr": { "$eq": [{ "$toString": "$_id" }, "$$clubId"] } } },
            ],
            "as": "club",
        }},
        doc! { "$unwind": "$club" },
        doc! { "$project": {
            "eventId": 1,
            "clubId": 1,
            "status": 1,
            "registeredAt": 1,
            "eventTitle": "$event.title",
            "eventDate": "$event.eventDate",
            "eventLocation": "$event.location",
            "isPaid": "$event.isPaid",
            "eventFee": "$event.eventFee",
            "clubName": "$club.clubName",
        }},
    ]
}

/// Registered attendees of one event, joined to their user profiles.
/// Registrants with no user record still appear with just their email.
pub fn event_attendees_pipeline(event_id: &str) -> Vec<Document> {
    vec![
        doc! { "$match": {
            "eventId": event_id,
            "status": EventRegistration::STATUS_REGISTERED,
        }},
        doc! { "$lookup": {
            "from": "users",
            "localField": "userEmail",
            "foreignField": "email",
            "as": "attendee",
        }},
        doc! { "$unwind": {
            "path": "$attendee",
            "preserveNullAndEmptyArrays": true,
        }},
        doc! { "$project": {
            "userEmail": 1,
            "status": 1,
            "registeredAt": 1,
            "name": "$attendee.name",
            "photoURL": "$attendee.photoURL",
        }},
    ]
}

/// Every registration in a club (cancelled included, it is the manager's
/// audit view), joined to event title and attendee name. Both joins keep
/// rows whose target is missing.
pub fn club_registrations_pipeline(club_id: &str) -> Vec<Document> {
    vec![
        doc! { "$match": { "clubId": club_id } },
        doc! { "$lookup": {
            "from": "events",
            "let": { "eventId": "$eventId" },
            "pipeline": [
                { "$match": { "$expr": { "$eq": [{ "$toString": "$_id" }, "$$eventId"] } } },
            ],
            "as": "event",
        }},
        doc! { "$unwind": {
            "path": "$event",
            "preserveNullAndEmptyArrays": true,
        }},
        doc! { "$lookup": {
            "from": "users",
            "localField": "userEmail",
            "foreignField": "email",
            "as": "attendee",
        }},
        doc! { "$unwind": {
            "path": "$attendee",
            "preserveNullAndEmptyArrays": true,
        }},
        doc! { "$project": {
            "eventId": 1,
            "userEmail": 1,
            "status": 1,
            "registeredAt": 1,
            "eventTitle": "$event.title",
            "eventDate": "$event.eventDate",
            "attendeeName": "$attendee.name",
        }},
    ]
}

// ---- runners ----

pub async fn club_detail(
    db: &MongoDB,
    club_id: ObjectId,
) -> Result<Option<serde_json::Value>, ApiError> {
    let mut rows = run_pipeline(db, Club::COLLECTION, club_detail_pipeline(club_id)).await?;
    if rows.is_empty() {
        return Ok(None);
    }
    Ok(Some(rows.remove(0)))
}

pub async fn clubs_with_members(
    db: &MongoDB,
    manager_email: &str,
) -> Result<Vec<serde_json::Value>, ApiError> {
    run_pipeline(db, Club::COLLECTION, clubs_with_members_pipeline(manager_email)).await
}

pub async fn club_roster(
    db: &MongoDB,
    manager_email: &str,
) -> Result<Vec<serde_json::Value>, ApiError> {
    run_pipeline(db, Club::COLLECTION, club_roster_pipeline(manager_email)).await
}

pub async fn my_clubs(db: &MongoDB, user_email: &str) -> Result<Vec<serde_json::Value>, ApiError> {
    run_pipeline(db, Membership::COLLECTION, my_clubs_pipeline(user_email)).await
}

pub async fn manager_events(
    db: &MongoDB,
    manager_email: &str,
) -> Result<Vec<serde_json::Value>, ApiError> {
    run_pipeline(db, Event::COLLECTION, manager_events_pipeline(manager_email)).await
}

pub async fn upcoming_events(db: &MongoDB) -> Result<Vec<serde_json::Value>, ApiError> {
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    run_pipeline(db, Event::COLLECTION, upcoming_events_pipeline(&today)).await
}

pub async fn my_events(db: &MongoDB, user_email: &str) -> Result<Vec<serde_json::Value>, ApiError> {
    run_pipeline(db, EventRegistration::COLLECTION, my_events_pipeline(user_email)).await
}

pub async fn event_attendees(
    db: &MongoDB,
    event_id: &str,
) -> Result<Vec<serde_json::Value>, ApiError> {
    run_pipeline(db, EventRegistration::COLLECTION, event_attendees_pipeline(event_id)).await
}

pub async fn club_registrations(
    db: &MongoDB,
    club_id: &str,
) -> Result<Vec<serde_json::Value>, ApiError> {
    run_pipeline(db, EventRegistration::COLLECTION, club_registrations_pipeline(club_id)).await
}

async fn run_pipeline(
    db: &MongoDB,
    collection: &str,
    pipeline: Vec<Document>,
) -> Result<Vec<serde_json::Value>, ApiError> {
    let mut cursor = db
        .collection::<Document>(collection)
        .aggregate(pipeline)
        .await?;

    let mut rows = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(document) => rows.push(document_to_json(document)),
            Err(e) => log::error!("❌ Error reading {} view row: {}", collection, e),
        }
    }

    Ok(rows)
}

/// Renders a BSON document the way clients expect it over the wire: hex
/// strings for ObjectIds, RFC 3339 strings for datetimes, plain JSON for
/// everything else. Non-finite doubles (a club fee stored as NaN) become
/// null, since JSON has no way to carry them.
pub fn document_to_json(document: Document) -> serde_json::Value {
    let mut map = serde_json::Map::with_capacity(document.len());
    for (key, value) in document {
        map.insert(key, bson_to_json(value));
    }
    serde_json::Value::Object(map)
}

fn bson_to_json(value: Bson) -> serde_json::Value {
    match value {
        Bson::ObjectId(oid) => serde_json::Value::String(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
        Bson::Document(doc) => document_to_json(doc),
        Bson::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(bson_to_json).collect())
        }
        Bson::Double(n) => serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Bson::Int32(n) => serde_json::Value::Number(n.into()),
        Bson::Int64(n) => serde_json::Value::Number(n.into()),
        Bson::String(s) => serde_json::Value::String(s),
        Bson::Boolean(b) => serde_json::Value::Bool(b),
        Bson::Null => serde_json::Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::DateTime;

    fn stage<'a>(pipeline: &'a [Document], operator: &str) -> &'a Document {
        pipeline
            .iter()
            .find(|stage| stage.contains_key(operator))
            .unwrap_or_else(|| panic!("pipeline has no {} stage", operator))
    }

    #[test]
    fn test_club_detail_excludes_private_organizer_fields() {
        let id = ObjectId::new();
        let pipeline = club_detail_pipeline(id);

        let project = stage(&pipeline, "$project").get_document("$project").unwrap();
        assert_eq!(project.get_i32("organizer.photoURL").unwrap(), 0);
        assert_eq!(project.get_i32("organizer._id").unwrap(), 0);
        assert_eq!(project.get_i32("organizer.role").unwrap(), 0);
        assert_eq!(project.get_i32("organizer.createdAt").unwrap(), 0);
        assert_eq!(project.get_i32("updatedAt").unwrap(), 0);
    }

    #[test]
    fn test_club_detail_keeps_clubs_without_organizer() {
        let pipeline = club_detail_pipeline(ObjectId::new());
        let unwind = stage(&pipeline, "$unwind").get_document("$unwind").unwrap();
        assert_eq!(unwind.get_str("path").unwrap(), "$organizer");
        assert!(unwind.get_bool("preserveNullAndEmptyArrays").unwrap());
    }

    #[test]
    fn test_members_join_compares_club_id_as_string() {
        let pipeline = clubs_with_members_pipeline("manager@x.com");
        let lookup = stage(&pipeline, "$lookup").get_document("$lookup").unwrap();
        assert_eq!(lookup.get_str("from").unwrap(), "memberships");

        let let_vars = lookup.get_document("let").unwrap();
        assert_eq!(
            let_vars.get_document("clubId").unwrap().get_str("$toString").unwrap(),
            "$_id"
        );
    }

    #[test]
    fn test_roster_preserves_empty_clubs_through_both_unwinds() {
        let pipeline = club_roster_pipeline("manager@x.com");
        let unwinds: Vec<_> = pipeline
            .iter()
            .filter_map(|stage| stage.get_document("$unwind").ok())
            .collect();
        assert_eq!(unwinds.len(), 2);
        for unwind in unwinds {
            assert!(unwind.get_bool("preserveNullAndEmptyArrays").unwrap());
        }

        let matched = stage(&pipeline, "$match").get_document("$match").unwrap();
        assert_eq!(matched.get_str("status").unwrap(), "approved");
    }

    #[test]
    fn test_roster_groups_membership_fields_per_club() {
        let pipeline = club_roster_pipeline("manager@x.com");
        let group = stage(&pipeline, "$group").get_document("$group").unwrap();
        let push = group
            .get_document("members")
            .unwrap()
            .get_document("$push")
            .unwrap();
        for field in ["name", "membershipId", "email", "status", "joinDate"] {
            assert!(push.contains_key(field), "missing {} in roster push", field);
        }
    }

    #[test]
    fn test_my_clubs_drops_dangling_memberships() {
        let pipeline = my_clubs_pipeline("a@x.com");
        // Bare unwind: memberships without a club vanish instead of erroring
        let unwind = stage(&pipeline, "$unwind");
        assert_eq!(unwind.get_str("$unwind").unwrap(), "$club");

        let matched = stage(&pipeline, "$match").get_document("$match").unwrap();
        assert_eq!(matched.get_str("userEmail").unwrap(), "a@x.com");
        assert_eq!(matched.get_str("status").unwrap(), "active");
    }

    #[test]
    fn test_my_clubs_inlines_membership_fields() {
        let pipeline = my_clubs_pipeline("a@x.com");
        let replace = stage(&pipeline, "$replaceRoot")
            .get_document("$replaceRoot")
            .unwrap();
        let merged = replace
            .get_document("newRoot")
            .unwrap()
            .get_array("$mergeObjects")
            .unwrap();
        assert_eq!(merged[0].as_str().unwrap(), "$club");
        let inline = merged[1].as_document().unwrap();
        assert!(inline.contains_key("membershipStatus"));
        assert!(inline.contains_key("joinedAt"));
        assert!(inline.contains_key("paymentId"));
    }

    #[test]
    fn test_manager_events_filters_to_approved_clubs() {
        let pipeline = manager_events_pipeline("manager@x.com");
        let filters: Vec<_> = pipeline
            .iter()
            .filter_map(|stage| stage.get_document("$match").ok())
            .collect();
        let club_filter = filters
            .iter()
            .find(|m| m.contains_key("club.managerEmail"))
            .expect("no club filter stage");
        assert_eq!(club_filter.get_str("club.managerEmail").unwrap(), "manager@x.com");
        assert_eq!(club_filter.get_str("club.status").unwrap(), "approved");
    }

    #[test]
    fn test_upcoming_cutoff_is_lexical_gte_on_the_given_day() {
        let pipeline = upcoming_events_pipeline("2026-08-24");
        let matched = stage(&pipeline, "$match").get_document("$match").unwrap();
        let cutoff = matched.get_document("eventDate").unwrap();
        assert_eq!(cutoff.get_str("$gte").unwrap(), "2026-08-24");
    }

    #[test]
    fn test_upcoming_sorts_ascending_and_left_joins_club() {
        let pipeline = upcoming_events_pipeline("2026-08-24");
        let sort = stage(&pipeline, "$sort").get_document("$sort").unwrap();
        assert_eq!(sort.get_i32("eventDate").unwrap(), 1);

        let unwind = stage(&pipeline, "$unwind").get_document("$unwind").unwrap();
        assert!(unwind.get_bool("preserveNullAndEmptyArrays").unwrap());
    }

    #[test]
    fn test_my_events_skips_cancelled_registrations() {
        let pipeline = my_events_pipeline("a@x.com");
        let matched = stage(&pipeline, "$match").get_document("$match").unwrap();
        let status = matched.get_document("status").unwrap();
        assert_eq!(status.get_str("$ne").unwrap(), "cancelled");
    }

    #[test]
    fn test_event_attendees_keeps_profileless_registrants() {
        let pipeline = event_attendees_pipeline("65a1f0aa0000000000000002");
        let matched = stage(&pipeline, "$match").get_document("$match").unwrap();
        assert_eq!(matched.get_str("status").unwrap(), "registered");

        let unwind = stage(&pipeline, "$unwind").get_document("$unwind").unwrap();
        assert_eq!(unwind.get_str("path").unwrap(), "$attendee");
        assert!(unwind.get_bool("preserveNullAndEmptyArrays").unwrap());
    }

    #[test]
    fn test_club_registrations_includes_cancelled_rows() {
        let pipeline = club_registrations_pipeline("65a1f0aa0000000000000001");
        let matched = stage(&pipeline, "$match").get_document("$match").unwrap();
        assert!(!matched.contains_key("status"));
    }

    #[test]
    fn test_document_to_json_renders_ids_and_dates_as_strings() {
        let id = ObjectId::new();
        let document = doc! {
            "_id": id,
            "clubName": "Chess Club",
            "createdAt": DateTime::from_millis(1_700_000_000_000),
            "members": [ { "membershipId": "abc", "joinDate": Bson::Null } ],
        };

        let json = document_to_json(document);
        assert_eq!(json["_id"], serde_json::json!(id.to_hex()));
        assert!(json["createdAt"].as_str().unwrap().starts_with("2023-11-14T"));
        assert_eq!(json["members"][0]["joinDate"], serde_json::Value::Null);
    }

    #[test]
    fn test_document_to_json_turns_nan_fee_into_null() {
        let json = document_to_json(doc! { "membershipFee": f64::NAN });
        assert_eq!(json["membershipFee"], serde_json::Value::Null);
    }
}
