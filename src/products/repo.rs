use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

const PRODUCT_COLUMNS: &str = "id, name, price, stock, content, user_id, created_at";

/// Product record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub content: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Product>> {
    let row = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn insert(db: &PgPool, product: &Product) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO products (id, name, price, stock, content, user_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(product.stock)
    .bind(&product.content)
    .bind(product.user_id)
    .bind(product.created_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Persist the mutable fields. The owner reference is immutable.
pub async fn update(db: &PgPool, product: &Product) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE products
        SET name = $2, price = $3, stock = $4, content = $5
        WHERE id = $1
        "#,
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(product.stock)
    .bind(&product.content)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
