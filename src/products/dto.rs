use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::Product;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    #[serde(default)]
    pub name: String,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    #[serde(default)]
    pub content: String,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductItem {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub content: String,
}

impl From<Product> for ProductItem {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price: p.price,
            stock: p.stock,
            content: p.content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductOwner {
    pub id: Uuid,
    pub firstname: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedProduct {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub content: String,
    pub user: ProductOwner,
}

#[derive(Debug, Serialize)]
pub struct CreatedProductResponse {
    pub product: CreatedProduct,
}

#[derive(Debug, Serialize)]
pub struct ProductData {
    pub product: ProductItem,
}

#[derive(Debug, Serialize)]
pub struct ShowProductResponse {
    pub success: bool,
    pub message: String,
    pub data: ProductData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_accepts_string_and_number_json() {
        let from_string: CreateProductRequest =
            serde_json::from_str(r#"{"name":"Mug","price":"12.50","stock":3,"content":"A mug"}"#)
                .unwrap();
        let from_number: CreateProductRequest =
            serde_json::from_str(r#"{"name":"Mug","price":12.50,"stock":3,"content":"A mug"}"#)
                .unwrap();
        assert_eq!(from_string.price, from_number.price);
    }

    #[test]
    fn update_request_fields_default_to_none() {
        let req: UpdateProductRequest = serde_json::from_str(r#"{"stock":7}"#).unwrap();
        assert_eq!(req.stock, Some(7));
        assert!(req.name.is_none());
        assert!(req.price.is_none());
        assert!(req.content.is_none());
    }
}
