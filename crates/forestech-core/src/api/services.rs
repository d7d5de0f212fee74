//! Backend resource services on ForestechApi.

use crate::config::BackendConfig;
use crate::services::{InvoiceService, MovementService, ProductService, SupplierService, VehicleService};
use crate::ForestechApi;

impl ForestechApi {
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Products (catalog service).
    pub fn products(&self) -> &ProductService {
        &self.products
    }

    /// Vehicles (fleet service).
    pub fn vehicles(&self) -> &VehicleService {
        &self.vehicles
    }

    /// Suppliers (partners service).
    pub fn suppliers(&self) -> &SupplierService {
        &self.suppliers
    }

    /// Movements and stock (inventory service).
    pub fn movements(&self) -> &MovementService {
        &self.movements
    }

    /// Invoices (invoicing service).
    pub fn invoices(&self) -> &InvoiceService {
        &self.invoices
    }
}
