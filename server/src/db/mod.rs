//! Database access layer

pub mod audit;
pub mod checkout;
pub mod notifications;
pub mod offers;
pub mod orders;
pub mod payments;
