use actix_web::{web, HttpResponse};
use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use serde::Deserialize;

use crate::database::MongoDB;
use crate::models::{
    Club, ClubResponse, CreateClubRequest, UpdateClubRequest, UpdateClubStatusRequest,
};
use crate::services::views;
use crate::utils::ApiError;

#[derive(Debug, Deserialize)]
pub struct ClubFilterQuery {
    pub status: Option<String>,
    pub email: Option<String>,
}

/// Builds the by-creator filter from whichever query parameters are present.
/// Both are optional; with neither, the whole collection lists.
fn creator_filter(query: &ClubFilterQuery) -> mongodb::bson::Document {
    let mut filter = doc! {};
    if let Some(email) = &query.email {
        filter.insert("managerEmail", email);
    }
    if let Some(status) = &query.status {
        filter.insert("status", status);
    }
    filter
}

/// GET /clubs - public club listing, newest first, optional ?status= filter.
#[utoipa::path(
    get,
    path = "/clubs",
    tag = "Clubs",
    params(
        ("status" = Option<String>, Query, description = "Filter by review status (pending/approved/rejected)")
    ),
    responses(
        (status = 200, description = "List of clubs", body = [ClubResponse])
    )
)]
pub async fn get_clubs(
    query: web::Query<ClubFilterQuery>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let mut filter = doc! {};
    if let Some(status) = &query.status {
        filter.insert("status", status);
    }

    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();

    let collection = db.collection::<Club>(Club::COLLECTION);
    let mut cursor = collection.find(filter).with_options(options).await?;

    let mut clubs = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(club) => clubs.push(ClubResponse::from(club)),
            Err(e) => log::error!("❌ Error reading club: {}", e),
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "clubs": clubs,
        "total": clubs.len(),
    })))
}

/// GET /clubs/by-creator - clubs narrowed by optional ?email= (manager)
/// and/or ?status=. Managers use this for their own dashboard.
pub async fn get_clubs_by_creator(
    query: web::Query<ClubFilterQuery>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let collection = db.collection::<Club>(Club::COLLECTION);
    let mut cursor = collection.find(creator_filter(&query)).await?;

    let mut clubs = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(club) => clubs.push(ClubResponse::from(club)),
            Err(e) => log::error!("❌ Error reading club: {}", e),
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "clubs": clubs,
        "total": clubs.len(),
    })))
}

/// GET /clubs/{id}/details - one club joined with its organizer profile.
#[utoipa::path(
    get,
    path = "/clubs/{id}/details",
    tag = "Clubs",
    params(
        ("id" = String, Path, description = "Club ObjectId (hex)")
    ),
    responses(
        (status = 200, description = "Club with embedded organizer"),
        (status = 400, description = "Malformed club ID"),
        (status = 404, description = "Club not found")
    )
)]
pub async fn get_club_details(
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let object_id =
        ObjectId::parse_str(&id).map_err(|_| ApiError::Validation("Invalid club ID".to_string()))?;

    let club = views::club_detail(&db, object_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Club not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "club": club,
    })))
}

/// POST /clubs - register a club. It enters the review queue as "pending"
/// regardless of the submitted body.
#[utoipa::path(
    post,
    path = "/clubs",
    tag = "Clubs",
    request_body = CreateClubRequest,
    responses(
        (status = 201, description = "Club created in pending state")
    )
)]
pub async fn create_club(
    body: web::Json<CreateClubRequest>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let club = Club {
        id: None,
        club_name: body.club_name,
        description: body.description,
        category: body.category,
        location: body.location,
        banner_image: body.banner_image,
        membership_fee: body.membership_fee,
        manager_email: body.manager_email,
        status: Club::STATUS_PENDING.to_string(),
        created_at: Some(DateTime::now()),
        updated_at: None,
    };

    let collection = db.collection::<Club>(Club::COLLECTION);
    let result = collection.insert_one(&club).await?;

    log::info!("🏟️ Created club '{}' (pending review)", club.club_name);

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "clubId": result.inserted_id.as_object_id().map(|id| id.to_hex()),
    })))
}

/// PATCH /clubs/{id} - partial update of club fields. Only the fields
/// present in the body are touched; updatedAt is always stamped.
pub async fn update_club(
    path: web::Path<String>,
    body: web::Json<UpdateClubRequest>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let object_id =
        ObjectId::parse_str(&id).map_err(|_| ApiError::Validation("Invalid club ID".to_string()))?;

    let mut update_doc = doc! { "updatedAt": DateTime::now() };
    if let Some(club_name) = &body.club_name {
        update_doc.insert("clubName", club_name);
    }
    if let Some(description) = &body.description {
        update_doc.insert("description", description);
    }
    if let Some(category) = &body.category {
        update_doc.insert("category", category);
    }
    if let Some(location) = &body.location {
        update_doc.insert("location", location);
    }
    if let Some(banner_image) = &body.banner_image {
        update_doc.insert("bannerImage", banner_image);
    }
    if let Some(fee) = body.membership_fee {
        update_doc.insert("membershipFee", fee);
    }

    let collection = db.collection::<Club>(Club::COLLECTION);
    let result = collection
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc })
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Club not found".to_string()));
    }

    log::info!("🏟️ Updated club {}", id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Club updated",
    })))
}

/// PATCH /clubs/{id}/status - admin review decision. The status value is
/// stored as sent; the frontend uses approved/rejected.
pub async fn update_club_status(
    path: web::Path<String>,
    body: web::Json<UpdateClubStatusRequest>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let object_id =
        ObjectId::parse_str(&id).map_err(|_| ApiError::Validation("Invalid club ID".to_string()))?;

    let collection = db.collection::<Club>(Club::COLLECTION);
    let result = collection
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": { "status": &body.status } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Club not found".to_string()));
    }

    log::info!("🏟️ Club {} status set to {}", id, body.status);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Club status updated",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_query(email: Option<&str>, status: Option<&str>) -> ClubFilterQuery {
        ClubFilterQuery {
            email: email.map(String::from),
            status: status.map(String::from),
        }
    }

    #[test]
    fn test_creator_filter_with_both_parameters() {
        let filter = creator_filter(&filter_query(Some("manager@club.com"), Some("approved")));
        assert_eq!(filter.get_str("managerEmail").unwrap(), "manager@club.com");
        assert_eq!(filter.get_str("status").unwrap(), "approved");
    }

    #[test]
    fn test_creator_filter_accepts_status_without_email() {
        // Admin review screens list pending clubs across all managers
        let filter = creator_filter(&filter_query(None, Some("pending")));
        assert_eq!(filter.get_str("status").unwrap(), "pending");
        assert!(!filter.contains_key("managerEmail"));
    }

    #[test]
    fn test_creator_filter_email_only() {
        let filter = creator_filter(&filter_query(Some("manager@club.com"), None));
        assert_eq!(filter.get_str("managerEmail").unwrap(), "manager@club.com");
        assert!(!filter.contains_key("status"));
    }

    #[test]
    fn test_creator_filter_empty_query_matches_all() {
        assert!(creator_filter(&filter_query(None, None)).is_empty());
    }
}
