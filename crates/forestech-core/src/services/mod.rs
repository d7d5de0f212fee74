//! Typed access to the backend REST resources.

mod crud;
mod invoices;
mod movements;

pub use crud::{CrudService, ProductService, SupplierService, VehicleService};
pub use invoices::InvoiceService;
pub use movements::MovementService;
