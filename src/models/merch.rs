//! Storefront catalog types.
//!
//! The storefront API speaks camelCase, so the same structs deserialize the
//! upstream body and serialize the local payload.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub value: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default)]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedAttribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swatch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantAttributes {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<NamedAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<NamedAttribute>,
}

/// Stock descriptor: unlimited, or limited with a remaining count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Stock {
    Unlimited,
    Limited {
        #[serde(rename = "inStock")]
        in_stock: u32,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    in_stock: Option<u32>,
}

// Upstream spells the type in several casings ("UNLIMITED", "Limited").
impl<'de> Deserialize<'de> for Stock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawStock::deserialize(deserializer)?;
        if raw.kind.eq_ignore_ascii_case("unlimited") {
            Ok(Stock::Unlimited)
        } else {
            Ok(Stock::Limited {
                in_stock: raw.in_stock.unwrap_or(0),
            })
        }
    }
}

impl Default for Stock {
    fn default() -> Self {
        Stock::Limited { in_stock: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub unit_price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<Money>,
    #[serde(default)]
    pub attributes: VariantAttributes,
    #[serde(default)]
    pub stock: Stock,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// `{"type": "..."}` wrapper used for product state and access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeTag {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TypeTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<TypeTag>,
}

impl Product {
    /// Products without an access descriptor are treated as public.
    pub fn is_public(&self) -> bool {
        self.access
            .as_ref()
            .map_or(true, |a| a.kind.eq_ignore_ascii_case("public"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductList {
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionList {
    pub collections: Vec<Collection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub variant_id: String,
    pub quantity: u32,
}

/// Body accepted by the add-to-cart relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub variant_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLink {
    pub cart_id: String,
    pub checkout_url: String,
}
