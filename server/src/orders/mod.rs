//! Order lifecycle core
//!
//! The modules here own every mutation of an order: intake, the offer
//! ledger, checkout assembly, payment initiation, provider settlement, and
//! the explicit staff transitions. The API layer stays thin on top of them.

pub mod billing;
pub mod checkout;
pub mod intake;
pub mod notify;
pub mod offers;
pub mod settlement;
pub mod state_machine;
pub mod status;

pub use status::{ItemState, OrderStatus};
