//! Invoicing service records.

use serde::{Deserialize, Serialize};

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_detalle: Option<i64>,
    /// `None` when the line introduces a product not yet in the catalog.
    pub product_id: Option<String>,
    /// Name for a new product created along with the invoice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub producto: String,
    pub cantidad: f64,
    pub precio_unitario: f64,
    /// VAT percentage for the line; the service applies 13 when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iva_percent: Option<f64>,
}

impl InvoiceDetail {
    pub fn line_total(&self) -> f64 {
        self.cantidad * self.precio_unitario
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub numero_factura: String,
    pub supplier_id: String,
    pub fecha_emision: String,
    pub fecha_vencimiento: String,
    pub cliente_nombre: String,
    pub cliente_nit: String,
    pub subtotal: f64,
    pub iva: f64,
    pub total: f64,
    #[serde(default)]
    pub observaciones: String,
    #[serde(default)]
    pub forma_pago: String,
    #[serde(default)]
    pub cuenta_bancaria: String,
    /// Lifecycle state as reported by the service, e.g. "ANULADA".
    pub estado: String,
    #[serde(default)]
    pub detalles: Vec<InvoiceDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceForm {
    pub numero_factura: String,
    pub supplier_id: String,
    pub fecha_emision: String,
    pub fecha_vencimiento: String,
    pub cliente_nombre: String,
    pub cliente_nit: String,
    pub observaciones: String,
    pub forma_pago: String,
    pub cuenta_bancaria: String,
    pub detalles: Vec<InvoiceDetail>,
}
