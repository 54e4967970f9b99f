use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    CreateProductRequest, CreatedProduct, CreatedProductResponse, ProductData, ProductItem,
    ProductOwner, ShowProductResponse, UpdateProductRequest,
};
use super::repo::{self, Product};
use crate::auth::extractors::{ensure_owner, AdminUser};
use crate::auth::repo::User;
use crate::error::{ApiError, FieldError};
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(show_product))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/create", post(create_product))
        .route("/auth/update/:id", post(update_product))
        .route("/auth/delete/:id", delete(delete_product))
}

fn price_error(price: Decimal) -> Option<FieldError> {
    (price < Decimal::ZERO)
        .then(|| FieldError::new("price", "The price must be a non-negative number."))
}

fn stock_error(stock: i32) -> Option<FieldError> {
    (stock < 0).then(|| FieldError::new("stock", "The stock must be a non-negative integer."))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductItem>>, ApiError> {
    let products = repo::list_all(&state.db).await?;
    let items = products.into_iter().map(ProductItem::from).collect();
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn show_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShowProductResponse>, ApiError> {
    let product = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found."))?;

    Ok(Json(ShowProductResponse {
        success: true,
        message: "Success data".into(),
        data: ProductData {
            product: ProductItem::from(product),
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(principal): AdminUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<CreatedProductResponse>), ApiError> {
    let mut errors = Vec::new();
    if payload.name.trim().is_empty() {
        errors.push(FieldError::new("name", "This name is required."));
    }
    if payload.content.trim().is_empty() {
        errors.push(FieldError::new("content", "This content is required."));
    }
    match payload.price {
        None => errors.push(FieldError::new("price", "This price is required.")),
        Some(price) => errors.extend(price_error(price)),
    }
    match payload.stock {
        None => errors.push(FieldError::new("stock", "This stock is required.")),
        Some(stock) => errors.extend(stock_error(stock)),
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let owner = User::find_by_id(&state.db, principal.id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let product = Product {
        id: Uuid::new_v4(),
        name: payload.name,
        price: payload.price.unwrap_or_default(),
        stock: payload.stock.unwrap_or_default(),
        content: payload.content,
        user_id: owner.id,
        created_at: OffsetDateTime::now_utc(),
    };
    repo::insert(&state.db, &product).await?;
    info!(product_id = %product.id, user_id = %owner.id, "product created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedProductResponse {
            product: CreatedProduct {
                id: product.id,
                name: product.name,
                price: product.price,
                stock: product.stock,
                content: product.content,
                user: ProductOwner {
                    id: owner.id,
                    firstname: owner.firstname,
                },
            },
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(principal): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<StatusCode, ApiError> {
    let mut product = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found."))?;
    ensure_owner(&principal, product.user_id)?;

    let mut errors = Vec::new();
    if let Some(price) = payload.price {
        errors.extend(price_error(price));
    }
    if let Some(stock) = payload.stock {
        errors.extend(stock_error(stock));
    }
    if let Some(name) = payload.name.as_deref() {
        if name.trim().is_empty() {
            errors.push(FieldError::new("name", "This name is required."));
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    if let Some(name) = payload.name {
        product.name = name;
    }
    if let Some(price) = payload.price {
        product.price = price;
    }
    if let Some(stock) = payload.stock {
        product.stock = stock;
    }
    if let Some(content) = payload.content {
        product.content = content;
    }

    repo::update(&state.db, &product).await?;
    info!(product_id = %product.id, "product updated");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(principal): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let product = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found."))?;
    ensure_owner(&principal, product.user_id)?;

    repo::delete(&state.db, id).await?;
    info!(product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_price_is_rejected() {
        let err = price_error(Decimal::new(-1, 2)).unwrap();
        assert_eq!(err.field, "price");
        assert!(price_error(Decimal::ZERO).is_none());
        assert!(price_error(Decimal::new(1250, 2)).is_none());
    }

    #[test]
    fn negative_stock_is_rejected() {
        assert_eq!(stock_error(-1).unwrap().field, "stock");
        assert!(stock_error(0).is_none());
        assert!(stock_error(10).is_none());
    }
}
