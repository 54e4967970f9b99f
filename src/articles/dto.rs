use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Article, ArticleWithOwner};

#[derive(Debug, Serialize)]
pub struct ArticleListItem {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub thumbnail: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: OffsetDateTime,
}

impl From<Article> for ArticleListItem {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            title: a.title,
            content: a.content,
            slug: a.slug,
            thumbnail: a.thumbnail,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleOwner {
    pub id: Uuid,
    pub firstname: String,
}

#[derive(Debug, Serialize)]
pub struct ArticleDetails {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub thumbnail: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: OffsetDateTime,
    pub user: ArticleOwner,
}

impl From<ArticleWithOwner> for ArticleDetails {
    fn from(a: ArticleWithOwner) -> Self {
        Self {
            id: a.id,
            title: a.title,
            content: a.content,
            slug: a.slug,
            thumbnail: a.thumbnail,
            created_at: a.created_at,
            user: ArticleOwner {
                id: a.user_id,
                firstname: a.owner_firstname,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedArticleResponse {
    pub article: ArticleDetails,
}

#[derive(Debug, Serialize)]
pub struct ArticleData {
    pub article: ArticleDetails,
}

#[derive(Debug, Serialize)]
pub struct ShowArticleResponse {
    pub success: bool,
    pub message: String,
    pub data: ArticleData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_item_uses_camel_case_created_at() {
        let item = ArticleListItem {
            id: Uuid::new_v4(),
            title: "Title".into(),
            content: "Content".into(),
            slug: "title".into(),
            thumbnail: None,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("createdAt"));
        assert!(!json.contains("created_at"));
    }

    #[test]
    fn details_nest_the_owner() {
        let details = ArticleDetails {
            id: Uuid::new_v4(),
            title: "Title".into(),
            content: "Content".into(),
            slug: "title".into(),
            thumbnail: Some("articles/x/y.png".into()),
            created_at: OffsetDateTime::now_utc(),
            user: ArticleOwner {
                id: Uuid::new_v4(),
                firstname: "Jo".into(),
            },
        };
        let json = serde_json::to_string(&details).unwrap();
        assert!(json.contains("\"user\""));
        assert!(json.contains("\"firstname\":\"Jo\""));
    }
}
