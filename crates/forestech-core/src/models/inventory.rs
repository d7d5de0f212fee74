//! Inventory service records.

use serde::{Deserialize, Serialize};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    /// Stock coming in.
    Entrada,
    /// Stock going out.
    Salida,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entrada => "ENTRADA",
            MovementType::Salida => "SALIDA",
        }
    }

    /// Endpoint that registers a movement of this type.
    pub fn create_path(&self) -> &'static str {
        match self {
            MovementType::Entrada => "/movements/entrada",
            MovementType::Salida => "/movements/salida",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Filter for listing movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovementTypeFilter {
    #[default]
    All,
    Only(MovementType),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: String,
    pub movement_type: MovementType,
    pub product_id: String,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub subtotal: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementForm {
    pub movement_type: MovementType,
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub description: String,
}

/// Current stock for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub product_id: String,
    pub stock: f64,
}

/// Stock with its weighted average purchase price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuedStock {
    pub product_id: String,
    pub stock: f64,
    pub weighted_average_price: f64,
}

impl ValuedStock {
    pub fn total_value(&self) -> f64 {
        self.stock * self.weighted_average_price
    }
}
