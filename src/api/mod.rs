pub mod clubs;
pub mod events;
pub mod health;
pub mod memberships;
pub mod payments;
pub mod registrations;
pub mod swagger;
pub mod users;
