use actix_web::{web, HttpRequest, HttpResponse};
use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};

use crate::database::MongoDB;
use crate::middleware::identity::{authenticate, Principal};
use crate::models::{CreateUserRequest, UpdateRoleRequest, User, UserResponse};
use crate::services::access;
use crate::services::identity::FirebaseAuth;
use crate::utils::{is_duplicate_key_error, ApiError};

/// GET /users/{email}/role - a user reads their own record (role included).
/// The path email must match the authenticated caller; there is no admin
/// bypass on this route.
#[utoipa::path(
    get,
    path = "/users/{email}/role",
    tag = "Users",
    params(
        ("email" = String, Path, description = "Email of the caller's own account")
    ),
    responses(
        (status = 200, description = "User record", body = UserResponse),
        (status = 401, description = "Missing bearer token"),
        (status = 403, description = "Email does not match the authenticated caller"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_user_role(
    principal: web::ReqData<Principal>,
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let email = path.into_inner();
    access::require_self(&principal.email, &email)?;

    let users = db.collection::<User>(User::COLLECTION);
    let user = users
        .find_one(doc! { "email": &email })
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": UserResponse::from(user),
    })))
}

/// PATCH /users/{id}/role - admin promotes or demotes a user. The role and
/// identity gates already ran as middleware by the time this executes.
pub async fn update_user_role(
    path: web::Path<String>,
    body: web::Json<UpdateRoleRequest>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let object_id =
        ObjectId::parse_str(&id).map_err(|_| ApiError::Validation("Invalid user ID".to_string()))?;

    if body.role != User::ROLE_MEMBER && body.role != User::ROLE_ADMIN {
        return Err(ApiError::Validation(format!("unknown role: {}", body.role)));
    }

    let users = db.collection::<User>(User::COLLECTION);
    let result = users
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": { "role": &body.role } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    log::info!("🔑 Role of user {} set to {}", id, body.role);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Role updated",
    })))
}

/// GET /users - full user list, admin only. POST on the same path is open,
/// so both gates run here explicitly instead of as scope middleware.
pub async fn list_users(
    req: HttpRequest,
    db: web::Data<MongoDB>,
    verifier: web::Data<FirebaseAuth>,
) -> Result<HttpResponse, ApiError> {
    let principal = authenticate(&req, &verifier).await?;
    access::require_admin(&db, &principal.email).await?;

    let users = db.collection::<User>(User::COLLECTION);
    let mut cursor = users.find(doc! {}).await?;

    let mut all = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(user) => all.push(UserResponse::from(user)),
            Err(e) => log::error!("❌ Error reading user: {}", e),
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "users": all,
        "total": all.len(),
    })))
}

/// POST /users - open signup endpoint. Role is always "member" no matter
/// what the body says; promotion happens through the admin route above.
#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn create_user(
    body: web::Json<CreateUserRequest>,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, ApiError> {
    let users = db.collection::<User>(User::COLLECTION);

    if users
        .find_one(doc! { "email": &body.email })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let user = User {
        id: None,
        name: body.name.clone(),
        email: body.email.clone(),
        photo_url: body.photo_url.clone(),
        role: User::ROLE_MEMBER.to_string(),
        created_at: Some(DateTime::now()),
    };

    let result = match users.insert_one(&user).await {
        Ok(result) => result,
        // The unique email index closes the race with a concurrent signup
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(ApiError::Conflict("User already exists".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    log::info!("👤 Created user {}", user.email);

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "User created",
        "userId": result.inserted_id.as_object_id().map(|id| id.to_hex()),
    })))
}
