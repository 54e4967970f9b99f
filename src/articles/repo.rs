use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

const ARTICLE_COLUMNS: &str = "id, title, content, slug, thumbnail, user_id, created_at, updated_at";

/// Article record in the database. `user_id` is set at creation and never
/// changes hands.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub thumbnail: Option<String>,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Article joined with its owner's firstname for detail responses.
#[derive(Debug, Clone, FromRow)]
pub struct ArticleWithOwner {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub thumbnail: Option<String>,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub owner_firstname: String,
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Article>> {
    let rows = sqlx::query_as::<_, Article>(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY created_at DESC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Article>> {
    let row = sqlx::query_as::<_, Article>(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn find_with_owner(db: &PgPool, id: Uuid) -> anyhow::Result<Option<ArticleWithOwner>> {
    let row = sqlx::query_as::<_, ArticleWithOwner>(
        r#"
        SELECT a.id, a.title, a.content, a.slug, a.thumbnail, a.user_id,
               a.created_at, a.updated_at, u.firstname AS owner_firstname
        FROM articles a
        JOIN users u ON u.id = a.user_id
        WHERE a.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn insert(db: &PgPool, article: &Article) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO articles (id, title, content, slug, thumbnail, user_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(article.id)
    .bind(&article.title)
    .bind(&article.content)
    .bind(&article.slug)
    .bind(&article.thumbnail)
    .bind(article.user_id)
    .bind(article.created_at)
    .bind(article.updated_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Persist the mutable fields. The owner reference is immutable.
pub async fn update(db: &PgPool, article: &Article) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE articles
        SET title = $2, content = $3, slug = $4, thumbnail = $5, updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(article.id)
    .bind(&article.title)
    .bind(&article.content)
    .bind(&article.slug)
    .bind(&article.thumbnail)
    .bind(article.updated_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM articles WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Stored object keys of every thumbnail owned by a user, for cleanup when
/// the account goes away.
pub async fn list_thumbnails_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<String>> {
    let keys = sqlx::query_scalar::<_, String>(
        "SELECT thumbnail FROM articles WHERE user_id = $1 AND thumbnail IS NOT NULL",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(keys)
}
