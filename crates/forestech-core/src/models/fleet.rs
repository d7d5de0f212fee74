//! Fleet service records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    /// License plate.
    pub placa: String,
    pub marca: String,
    pub modelo: String,
    pub anio: i32,
    pub category: String,
    #[serde(default)]
    pub descripcion: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleForm {
    pub placa: String,
    pub marca: String,
    pub modelo: String,
    pub anio: i32,
    pub category: String,
    pub descripcion: String,
    pub is_active: bool,
}
