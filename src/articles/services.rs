use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo::{self, Article};
use crate::auth::extractors::{ensure_owner, Principal};
use crate::auth::repo::User;
use crate::error::ApiError;
use crate::state::AppState;

pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct UpdateArticleForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<ImageUpload>,
}

/// URL-safe, lowercase, deterministic derivation of a title. Accented latin
/// characters transliterate to their bare form; everything else collapses
/// into single dashes.
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|ch| match ch {
            'a'..='z' | '0'..='9' => ch,
            'à' | 'á' | 'â' | 'ä' => 'a',
            'ç' => 'c',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'î' | 'ï' => 'i',
            'ó' | 'ô' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            _ => '-',
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

async fn store_image(
    state: &AppState,
    article_id: Uuid,
    image: ImageUpload,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(&image.content_type).unwrap_or("bin");
    let key = format!("articles/{}/{}.{}", article_id, Uuid::new_v4(), ext);
    state
        .storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

pub async fn create_article(
    state: &AppState,
    owner_id: Uuid,
    title: String,
    content: String,
    image: Option<ImageUpload>,
) -> Result<(Article, String), ApiError> {
    let owner = User::find_by_id(&state.db, owner_id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let id = Uuid::new_v4();
    let now = OffsetDateTime::now_utc();
    let thumbnail = match image {
        Some(img) => Some(store_image(state, id, img).await?),
        None => None,
    };

    let article = Article {
        id,
        slug: slugify(&title),
        title,
        content,
        thumbnail,
        user_id: owner_id,
        created_at: now,
        updated_at: now,
    };
    repo::insert(&state.db, &article).await?;

    info!(article_id = %article.id, user_id = %owner_id, "article created");
    Ok((article, owner.firstname))
}

/// Partial update. A replacement image removes the previously stored object
/// before the new one is attached; the slug follows the title.
pub async fn update_article(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
    form: UpdateArticleForm,
) -> Result<(), ApiError> {
    let mut article = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found."))?;
    ensure_owner(principal, article.user_id)?;

    if let Some(title) = form.title {
        article.slug = slugify(&title);
        article.title = title;
    }
    if let Some(content) = form.content {
        article.content = content;
    }
    if let Some(image) = form.image {
        if let Some(old_key) = article.thumbnail.take() {
            if let Err(e) = state.storage.delete_object(&old_key).await {
                // the old object may already be gone; the replacement
                // must not fail on it
                warn!(error = %e, key = %old_key, "old thumbnail delete failed");
            }
        }
        article.thumbnail = Some(store_image(state, article.id, image).await?);
    }
    article.updated_at = OffsetDateTime::now_utc();

    repo::update(&state.db, &article).await?;
    info!(article_id = %article.id, "article updated");
    Ok(())
}

pub async fn delete_article(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
) -> Result<(), ApiError> {
    let article = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found."))?;
    ensure_owner(principal, article.user_id)?;

    if let Some(key) = article.thumbnail.as_deref() {
        if let Err(e) = state.storage.delete_object(key).await {
            warn!(error = %e, key = %key, "thumbnail delete failed");
        }
    }

    repo::delete(&state.db, id).await?;
    info!(article_id = %id, "article deleted");
    Ok(())
}

#[cfg(test)]
mod slug_tests {
    use super::*;

    #[test]
    fn slug_is_deterministic() {
        assert_eq!(slugify("My First Article"), slugify("My First Article"));
    }

    #[test]
    fn slug_is_case_insensitive() {
        assert_eq!(slugify("Hello World"), slugify("HELLO world"));
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn slug_transliterates_accents() {
        assert_eq!(slugify("Été à Paris"), "ete-a-paris");
        assert_eq!(slugify("Ça déçoit"), "ca-decoit");
    }

    #[test]
    fn slug_collapses_specials() {
        assert_eq!(slugify("Hello,  World!"), "hello-world");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("Promo -50% !!"), "promo-50");
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;

    #[test]
    fn ext_from_known_mimes() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn store_image_builds_key_under_the_article() {
        let state = crate::state::AppState::fake();
        let article_id = Uuid::new_v4();
        let key = store_image(
            &state,
            article_id,
            ImageUpload {
                body: Bytes::from_static(b"fake-png"),
                content_type: "image/png".into(),
            },
        )
        .await
        .unwrap();
        assert!(key.starts_with(&format!("articles/{}/", article_id)));
        assert!(key.ends_with(".png"));
    }
}
