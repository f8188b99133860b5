pub mod access;
pub mod checkout;
pub mod identity;
pub mod views;
