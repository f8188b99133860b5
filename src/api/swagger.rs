use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Club Sphere API",
        version = "1.0.0",
        description = "API documentation for the club-sphere backend. \n\n**Authentication:** Protected endpoints require a Firebase ID token as a Bearer token.\n\n**Features:**\n- User accounts with member/admin roles\n- Club registration and admin review\n- Membership checkout through Stripe hosted sessions\n- Club events with member registration\n- Aggregated dashboard views (rosters, my clubs, upcoming events)",
        contact(
            name = "Club Sphere Team",
            email = "support@club-sphere.app"
        )
    ),
    paths(
        // Health
        crate::api::health::health_check,

        // Users
        crate::api::users::create_user,
        crate::api::users::get_user_role,

        // Clubs
        crate::api::clubs::get_clubs,
        crate::api::clubs::get_club_details,
        crate::api::clubs::create_club,

        // Events & registrations
        crate::api::events::upcoming_events,
        crate::api::registrations::register_for_event,

        // Payments
        crate::api::payments::create_checkout_session,
        crate::api::payments::session_status,
    ),
    components(
        schemas(
            // Health
            crate::api::health::HealthResponse,

            // Users
            crate::models::user::CreateUserRequest,
            crate::models::user::UpdateRoleRequest,
            crate::models::user::UserResponse,

            // Clubs
            crate::models::club::CreateClubRequest,
            crate::models::club::UpdateClubStatusRequest,
            crate::models::club::ClubResponse,

            // Events
            crate::models::event::CreateEventRequest,
            crate::models::event::EventResponse,

            // Payments
            crate::services::checkout::CreateCheckoutSessionRequest,
            crate::services::checkout::SessionStatusResponse,
            crate::models::payment::PaymentResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint for monitoring service status."),
        (name = "Users", description = "Account management. Signup is open; role reads are self-only and role changes are admin-only."),
        (name = "Clubs", description = "Club catalog, registration and review. New clubs wait in a pending queue until an admin approves them."),
        (name = "Events", description = "Club events, including the public upcoming-events feed."),
        (name = "Registrations", description = "Event registration for active club members. Cancellation keeps the row as history."),
        (name = "Payments", description = "Membership checkout through the hosted payment page and the confirmation/status read-back."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Enter your Firebase ID token"))
                        .build()
                ),
            );
        }
    }
}
