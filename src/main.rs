mod api;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{guard, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::identity::IdentityGate;
use crate::middleware::role::RoleGate;
use crate::services::checkout::StripeCheckout;
use crate::services::identity::FirebaseAuth;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Get configuration from environment
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let mongodb_uri = env::var("MONGODB_URI").expect("MONGODB_URI must be set");
    let firebase_key = env::var("FIREBASE_ADMIN_KEY").expect("FIREBASE_ADMIN_KEY must be set");
    let stripe_secret = env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY must be set");
    let site_domain =
        env::var("SITE_DOMAIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

    log::info!("🚀 Starting Club Sphere Service...");
    log::info!("📊 Database: {}", mongodb_uri);

    // Initialize MongoDB connection and ensure indexes
    let db = database::MongoDB::new(&mongodb_uri)
        .await
        .expect("Failed to connect to MongoDB");

    let db_data = web::Data::new(db.clone());

    log::info!("✅ MongoDB connected successfully");

    // Identity verifier (Firebase ID tokens) and payment gateway client are
    // built once here and injected; handlers never touch env or globals
    let firebase = FirebaseAuth::from_service_account(&firebase_key)
        .expect("FIREBASE_ADMIN_KEY is not a valid service account key");
    log::info!("🔐 Identity verifier ready (project: {})", firebase.project_id());
    let firebase_data = web::Data::new(firebase);

    let stripe_data = web::Data::new(StripeCheckout::new(stripe_secret, site_domain));
    log::info!("💳 Payment gateway client ready");

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        // Browser frontends run on arbitrary origins (local Vite, deployed
        // dashboards), so the CORS layer stays wide open
        let cors = Cors::permissive();

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            .app_data(firebase_data.clone())
            .app_data(stripe_data.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            // Banner and health check
            .route("/", web::get().to(api::health::banner))
            .route("/health", web::get().to(api::health::health_check))

            // ==================== USERS ====================

            // One path shape, two guard stacks: PATCH is admin-only (role
            // gate wraps inside the identity gate), GET is self-only.
            // Method guards let the non-matching verb fall through.
            .service(
                web::resource("/users/{id}/role")
                    .guard(guard::Patch())
                    .wrap(RoleGate)
                    .wrap(IdentityGate)
                    .route(web::patch().to(api::users::update_user_role))
            )
            .service(
                web::resource("/users/{email}/role")
                    .guard(guard::Get())
                    .wrap(IdentityGate)
                    .route(web::get().to(api::users::get_user_role))
            )
            // GET runs its admin check in the handler; POST is open signup
            .route("/users", web::get().to(api::users::list_users))
            .route("/users", web::post().to(api::users::create_user))

            // ==================== CLUBS ====================

            .route("/clubs", web::get().to(api::clubs::get_clubs))
            .route("/clubs", web::post().to(api::clubs::create_club))
            .route("/clubs/by-creator", web::get().to(api::clubs::get_clubs_by_creator))
            .route("/clubs/members", web::get().to(api::memberships::clubs_with_members))
            .route("/clubs/{id}/details", web::get().to(api::clubs::get_club_details))
            .route("/clubs/{id}/status", web::patch().to(api::clubs::update_club_status))
            .route("/clubs/{email}/members", web::get().to(api::memberships::club_roster))
            .service(
                web::resource("/clubs/{clubId}/events")
                    .wrap(IdentityGate)
                    .route(web::get().to(api::events::club_events))
            )
            .service(
                web::resource("/clubs/{clubId}/registrations")
                    .wrap(IdentityGate)
                    .route(web::get().to(api::registrations::club_registrations))
            )
            // Dynamic single-segment pattern, must stay after the static
            // /clubs/* routes above
            .route("/clubs/{id}", web::patch().to(api::clubs::update_club))

            // ==================== MEMBERSHIPS & PAYMENTS ====================

            .route("/my-clubs", web::get().to(api::memberships::my_clubs))
            .route("/payment-checkout-session", web::post().to(api::payments::create_checkout_session))
            .route("/session-status", web::get().to(api::payments::session_status))
            .service(
                web::resource("/payments")
                    .wrap(IdentityGate)
                    .route(web::get().to(api::payments::list_payments))
            )

            // ==================== EVENTS ====================

            .route("/upcoming/events", web::get().to(api::events::upcoming_events))
            .service(
                web::resource("/my-events")
                    .wrap(IdentityGate)
                    .route(web::get().to(api::registrations::my_events))
            )
            .service(
                web::scope("/events")
                    .wrap(IdentityGate)
                    .route("", web::post().to(api::events::create_event))
                    .route("", web::get().to(api::events::manager_events))
                    .route("/{eventId}/register", web::post().to(api::registrations::register_for_event))
                    .route("/{eventId}/cancel", web::patch().to(api::registrations::cancel_registration))
                    .route("/{eventId}/registrations", web::get().to(api::registrations::event_registrations))
                    .route("/{eventId}", web::patch().to(api::events::update_event))
                    .route("/{eventId}", web::delete().to(api::events::delete_event))
            )
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
