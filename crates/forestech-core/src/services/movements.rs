//! Inventory movements and stock queries.

use crate::models::{Movement, MovementForm, MovementTypeFilter, StockLevel, ValuedStock};
use crate::network::ServiceClient;
use crate::Result;

#[derive(Clone)]
pub struct MovementService {
    client: ServiceClient,
}

impl MovementService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// List movements, optionally of one type only.
    pub async fn get_all(&self, filter: MovementTypeFilter) -> Result<Vec<Movement>> {
        match filter {
            MovementTypeFilter::All => self.client.get_json("/movements").await,
            MovementTypeFilter::Only(kind) => {
                self.client
                    .get_json_with_query("/movements", &[("type", kind.as_str().to_string())])
                    .await
            }
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Movement> {
        self.client.get_json(&format!("/movements/{}", id)).await
    }

    /// Register a movement on the endpoint matching its type.
    pub async fn create(&self, form: &MovementForm) -> Result<Movement> {
        self.client
            .post_json(form.movement_type.create_path(), form)
            .await
    }

    pub async fn get_stock(&self, product_id: &str) -> Result<StockLevel> {
        self.client
            .get_json(&format!("/movements/stock/{}", product_id))
            .await
    }

    pub async fn get_stock_valued(&self, product_id: &str) -> Result<ValuedStock> {
        self.client
            .get_json(&format!("/movements/stock/{}/valued", product_id))
            .await
    }

    pub async fn get_by_product(&self, product_id: &str) -> Result<Vec<Movement>> {
        self.client
            .get_json(&format!("/movements/product/{}", product_id))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&format!("/movements/{}", id)).await
    }
}
