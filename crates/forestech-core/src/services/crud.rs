//! Generic CRUD service over one REST resource.

use crate::models::{Product, ProductForm, Supplier, SupplierForm, Vehicle, VehicleForm};
use crate::network::ServiceClient;
use crate::{ForestechError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

pub type ProductService = CrudService<Product, ProductForm>;
pub type VehicleService = CrudService<Vehicle, VehicleForm>;
pub type SupplierService = CrudService<Supplier, SupplierForm>;

/// Standard verbs against `<endpoint>` and `<endpoint>/:id`.
///
/// `T` is the record the service returns, `F` the body it accepts.
pub struct CrudService<T, F> {
    client: ServiceClient,
    endpoint: String,
    searchable: bool,
    _marker: PhantomData<fn() -> (T, F)>,
}

impl<T, F> Clone for CrudService<T, F> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            searchable: self.searchable,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned, F: Serialize> CrudService<T, F> {
    pub fn new(client: ServiceClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            searchable: true,
            _marker: PhantomData,
        }
    }

    /// Mark the resource as lacking a `/search` endpoint.
    pub fn without_search(mut self) -> Self {
        self.searchable = false;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub async fn get_all(&self) -> Result<Vec<T>> {
        self.client.get_json(&self.endpoint).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<T> {
        self.client.get_json(&self.item_path(id)).await
    }

    pub async fn create(&self, form: &F) -> Result<T> {
        self.client.post_json(&self.endpoint, form).await
    }

    pub async fn update(&self, id: &str, form: &F) -> Result<T> {
        self.client.put_json(&self.item_path(id), form).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&self.item_path(id)).await
    }

    /// Free-text search through `<endpoint>/search?q=`.
    pub async fn search(&self, query: &str) -> Result<Vec<T>> {
        if !self.searchable {
            return Err(ForestechError::Other(format!(
                "{} does not support search",
                self.endpoint
            )));
        }
        self.client
            .get_json_with_query(&format!("{}/search", self.endpoint), &[("q", query.to_string())])
            .await
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.endpoint, id)
    }
}
