//! Catalog service records.

use serde::{Deserialize, Serialize};

/// Unit a product is sold and stocked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeasurementUnit {
    Litro,
    Galon,
    Unidad,
    Kilogramo,
    Caneca,
    Cuarto,
    Garrafa,
}

impl std::fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MeasurementUnit::Litro => "LITRO",
            MeasurementUnit::Galon => "GALON",
            MeasurementUnit::Unidad => "UNIDAD",
            MeasurementUnit::Kilogramo => "KILOGRAMO",
            MeasurementUnit::Caneca => "CANECA",
            MeasurementUnit::Cuarto => "CUARTO",
            MeasurementUnit::Garrafa => "GARRAFA",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub unit_price: f64,
    pub measurement_unit: MeasurementUnit,
    /// Packaging label such as GALON or CANECA.
    #[serde(default)]
    pub presentation: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body for creating or updating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductForm {
    pub name: String,
    pub unit_price: f64,
    pub measurement_unit: MeasurementUnit,
}
