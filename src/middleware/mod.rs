pub mod identity;
pub mod role;
pub mod security_headers;

pub use security_headers::SecurityHeaders;
