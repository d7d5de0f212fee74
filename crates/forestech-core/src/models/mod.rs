//! Domain records exchanged with the backend services.
//!
//! Field names follow the services' JSON (camelCase, with the Spanish names
//! the fleet and invoicing services use kept as-is on the wire).

mod catalog;
mod fleet;
mod inventory;
mod invoicing;
mod partners;

pub use catalog::*;
pub use fleet::*;
pub use inventory::*;
pub use invoicing::*;
pub use partners::*;
