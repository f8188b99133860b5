use mongodb::{Client, Collection, Database};
use std::error::Error;

use crate::models::{Club, Event, EventRegistration, Membership, Payment, User};

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool kept small: every handler does at most a few calls
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        // Extract database name from URI or use default
        let db_name = uri
            .split('/')
            .last()
            .and_then(|s| s.split('?').next())
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("club_sphere_db");

        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };

        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the service relies on. The unique ones are load
    /// bearing: a duplicate-key failure is how the payment confirm path stays
    /// idempotent under concurrent calls, and how a second registration for
    /// the same event is rejected even when two requests race past the
    /// pre-insert read.
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        log::info!("🔧 Creating database indexes...");

        let users = self.collection::<mongodb::bson::Document>(User::COLLECTION);
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        match users.create_index(unique_email).await {
            Ok(_) => log::info!("   ✅ Index created: users(email) unique"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let memberships = self.collection::<mongodb::bson::Document>(Membership::COLLECTION);
        let unique_membership_payment = IndexModel::builder()
            .keys(doc! { "paymentId": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        match memberships.create_index(unique_membership_payment).await {
            Ok(_) => log::info!("   ✅ Index created: memberships(paymentId) unique"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let member_lookup = IndexModel::builder()
            .keys(doc! { "userEmail": 1, "status": 1 })
            .build();
        match memberships.create_index(member_lookup).await {
            Ok(_) => log::info!("   ✅ Index created: memberships(userEmail, status)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let payments = self.collection::<mongodb::bson::Document>(Payment::COLLECTION);
        let unique_payment = IndexModel::builder()
            .keys(doc! { "paymentId": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        match payments.create_index(unique_payment).await {
            Ok(_) => log::info!("   ✅ Index created: payments(paymentId) unique"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        // One live registration per (event, attendee); cancelled rows stay behind
        let registrations =
            self.collection::<mongodb::bson::Document>(EventRegistration::COLLECTION);
        let unique_registration = IndexModel::builder()
            .keys(doc! { "eventId": 1, "userEmail": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(
                        doc! { "status": EventRegistration::STATUS_REGISTERED },
                    )
                    .build(),
            )
            .build();
        match registrations.create_index(unique_registration).await {
            Ok(_) => {
                log::info!("   ✅ Index created: event_registrations(eventId, userEmail) unique")
            }
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let events = self.collection::<mongodb::bson::Document>(Event::COLLECTION);
        let events_by_club = IndexModel::builder().keys(doc! { "clubId": 1 }).build();
        match events.create_index(events_by_club).await {
            Ok(_) => log::info!("   ✅ Index created: events(clubId)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let events_by_date = IndexModel::builder().keys(doc! { "eventDate": 1 }).build();
        match events.create_index(events_by_date).await {
            Ok(_) => log::info!("   ✅ Index created: events(eventDate)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let clubs = self.collection::<mongodb::bson::Document>(Club::COLLECTION);
        let clubs_by_manager = IndexModel::builder()
            .keys(doc! { "managerEmail": 1, "status": 1 })
            .build();
        match clubs.create_index(clubs_by_manager).await {
            Ok(_) => log::info!("   ✅ Index created: clubs(managerEmail, status)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}
