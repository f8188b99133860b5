pub mod club;
pub mod event;
pub mod membership;
pub mod payment;
pub mod registration;
pub mod user;

pub use club::*;
pub use event::*;
pub use membership::*;
pub use payment::*;
pub use registration::*;
pub use user::*;
