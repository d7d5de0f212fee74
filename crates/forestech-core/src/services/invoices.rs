//! Invoicing service access.

use crate::models::{Invoice, InvoiceForm};
use crate::network::ServiceClient;
use crate::Result;

#[derive(Clone)]
pub struct InvoiceService {
    client: ServiceClient,
}

impl InvoiceService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub async fn get_all(&self) -> Result<Vec<Invoice>> {
        self.client.get_json("/invoices").await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Invoice> {
        self.client.get_json(&format!("/invoices/{}", id)).await
    }

    pub async fn create(&self, form: &InvoiceForm) -> Result<Invoice> {
        self.client.post_json("/invoices", form).await
    }

    pub async fn cancel(&self, id: &str) -> Result<()> {
        self.client.post_empty(&format!("/invoices/{}/cancel", id)).await
    }
}
