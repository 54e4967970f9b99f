use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Redirect,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    ArticleData, ArticleDetails, ArticleListItem, ArticleOwner, CreatedArticleResponse,
    ShowArticleResponse,
};
use super::repo;
use super::services::{self, ImageUpload, UpdateArticleForm};
use crate::auth::extractors::AdminUser;
use crate::error::{ApiError, FieldError};
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles))
        .route("/:id", get(show_article))
        .route("/:id/thumbnail", get(get_thumbnail))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/create", post(create_article))
        .route("/auth/update/:id", post(update_article))
        .route("/auth/delete/:id", delete(delete_article))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

/// Multipart form: `title`, `content`, optional `imageFile`.
async fn parse_article_form(mut mp: Multipart) -> Result<UpdateArticleForm, ApiError> {
    let mut form = UpdateArticleForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Malformed multipart body."))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("title") => {
                form.title = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| ApiError::bad_request("Malformed multipart body."))?,
                );
            }
            Some("content") => {
                form.content = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| ApiError::bad_request("Malformed multipart body."))?,
                );
            }
            Some("imageFile") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request("Malformed multipart body."))?;
                form.image = Some(ImageUpload {
                    body: data,
                    content_type,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

#[instrument(skip(state))]
pub async fn list_articles(
    State(state): State<AppState>,
) -> Result<Json<Vec<ArticleListItem>>, ApiError> {
    let articles = repo::list_all(&state.db).await?;
    let items = articles.into_iter().map(ArticleListItem::from).collect();
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn show_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShowArticleResponse>, ApiError> {
    let article = repo::find_with_owner(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found."))?;

    Ok(Json(ShowArticleResponse {
        success: true,
        message: "Success data".into(),
        data: ArticleData {
            article: ArticleDetails::from(article),
        },
    }))
}

#[instrument(skip(state, multipart))]
pub async fn create_article(
    State(state): State<AppState>,
    AdminUser(principal): AdminUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedArticleResponse>), ApiError> {
    let form = parse_article_form(multipart).await?;

    let mut errors = Vec::new();
    let title = form.title.unwrap_or_default();
    if title.trim().is_empty() {
        errors.push(FieldError::new("title", "This title is required."));
    }
    let content = form.content.unwrap_or_default();
    if content.trim().is_empty() {
        errors.push(FieldError::new("content", "This content is required."));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let (article, owner_firstname) =
        services::create_article(&state, principal.id, title, content, form.image).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedArticleResponse {
            article: ArticleDetails {
                id: article.id,
                title: article.title,
                content: article.content,
                slug: article.slug,
                thumbnail: article.thumbnail,
                created_at: article.created_at,
                user: ArticleOwner {
                    id: principal.id,
                    firstname: owner_firstname,
                },
            },
        }),
    ))
}

#[instrument(skip(state, multipart))]
pub async fn update_article(
    State(state): State<AppState>,
    AdminUser(principal): AdminUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    let form = parse_article_form(multipart).await?;
    services::update_article(&state, &principal, id, form).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_article(
    State(state): State<AppState>,
    AdminUser(principal): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::delete_article(&state, &principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 302 to a short-lived presigned URL for the stored thumbnail.
#[instrument(skip(state))]
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let article = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found."))?;
    let key = article
        .thumbnail
        .ok_or_else(|| ApiError::not_found("Thumbnail not found."))?;

    let url = state.storage.presign_get(&key, 600).await?;
    Ok(Redirect::temporary(&url))
}
