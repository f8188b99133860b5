use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::database::MongoDB;
use crate::services::views;
use crate::utils::ApiError;

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

/// GET /my-clubs?email= - active memberships resolved to their club
/// documents, with the membership fields inlined.
pub async fn my_clubs(
    query: web::Query<EmailQuery>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let clubs = views::my_clubs(&db, &query.email).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "clubs": clubs,
        "total": clubs.len(),
    })))
}

/// GET /clubs/members?email= - a manager's clubs, each carrying its raw
/// membership rows under `members`.
pub async fn clubs_with_members(
    query: web::Query<EmailQuery>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let clubs = views::clubs_with_members(&db, &query.email).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "clubs": clubs,
        "total": clubs.len(),
    })))
}

/// GET /clubs/{email}/members - roster rollup of the manager's approved
/// clubs: one row per club with a members array of name/email/joinDate.
pub async fn club_roster(
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let email = path.into_inner();
    let roster = views::club_roster(&db, &email).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "clubs": roster,
        "total": roster.len(),
    })))
}
