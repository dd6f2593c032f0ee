use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub String);

/// A catalog listing. Read-only from the engine's point of view; attribute
/// names mirror the slot schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "tipo", default)]
    pub property_type: Option<String>,
    #[serde(rename = "precio", default)]
    pub price: Option<u64>,
    #[serde(rename = "barrio", default)]
    pub neighborhood: Option<String>,
    #[serde(rename = "ciudad", default)]
    pub city: Option<String>,
    #[serde(default)]
    pub area_m2: Option<u32>,
    #[serde(rename = "habitaciones", default)]
    pub bedrooms: Option<u32>,
    #[serde(rename = "banos", default)]
    pub bathrooms: Option<u32>,
    #[serde(rename = "carros", default)]
    pub parking: Option<u32>,
    #[serde(rename = "imagenes", default)]
    pub images: Vec<String>,
}

impl Property {
    /// Up to `limit` non-empty image URLs in catalog order.
    pub fn preview_images(&self, limit: usize) -> Vec<String> {
        self.images.iter().filter(|url| !url.trim().is_empty()).take(limit).cloned().collect()
    }
}
