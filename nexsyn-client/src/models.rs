use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Статус публикации поста.
pub enum PostStatus {
    /// Черновик, наружу никогда не отдаётся.
    Draft,
    /// Опубликованный пост.
    Published,
}

impl PostStatus {
    /// Строковое представление, совпадающее со значением в хранилище.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = RowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            _ => Err(RowError::Validation {
                field: "status",
                message: "must be 'draft' or 'published'",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Публичная модель поста.
pub struct Post {
    /// Идентификатор поста, назначается хранилищем.
    pub id: i64,
    /// URL-safe идентификатор для прямого поиска.
    pub slug: String,
    /// Заголовок.
    pub title: String,
    /// Краткое описание.
    pub summary: String,
    /// Готовый HTML тела поста (пишется авторами сайта, считается доверенным).
    pub body_html: String,
    /// Сырая метка категории.
    pub category: String,
    /// Дата публикации (UTC), ключ сортировки.
    pub published_at: DateTime<Utc>,
    /// Ссылка на обложку.
    pub cover_image_url: Option<String>,
    /// Статус публикации.
    pub status: PostStatus,
}

impl Post {
    /// Опубликован ли пост.
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Страница постов вместе с общим числом совпадений.
pub struct PostPage {
    /// Посты на текущей странице.
    pub items: Vec<Post>,
    /// Количество постов, подходящих под фильтры (до нарезки на страницы).
    pub total: u64,
}

impl PostPage {
    /// Пустой результат: `items: []`, `total: 0`.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Категория, выведенная из опубликованных постов.
pub struct CategorySummary {
    /// Slug категории, сегмент пути.
    pub slug: String,
    /// Отображаемое имя, восстановленное из slug.
    pub display_name: String,
    /// Количество опубликованных постов.
    pub count: u64,
    /// Сырые метки, которые нормализуются в этот slug.
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Ошибки проверки строки хранилища.
pub enum RowError {
    /// Поле строки не прошло проверку.
    #[error("validation failed for '{field}': {message}")]
    Validation {
        /// Имя поля.
        field: &'static str,
        /// Что не так.
        message: &'static str,
    },
}

/// Строка таблицы постов в том виде, в каком её отдаёт хранилище.
///
/// Все текстовые поля опциональны: отсутствие значения проверяется явно при
/// преобразовании в [`Post`], а не падает на этапе десериализации.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostRow {
    /// Идентификатор.
    pub id: i64,
    /// Slug.
    #[serde(default)]
    pub slug: Option<String>,
    /// Заголовок.
    #[serde(default)]
    pub title: Option<String>,
    /// Краткое описание.
    #[serde(default, alias = "excerpt")]
    pub summary: Option<String>,
    /// HTML тела.
    #[serde(default, alias = "content")]
    pub body_html: Option<String>,
    /// Метка категории.
    #[serde(default)]
    pub category: Option<String>,
    /// Дата публикации.
    #[serde(default, alias = "created_at")]
    pub published_at: Option<DateTime<Utc>>,
    /// Обложка.
    #[serde(default, alias = "image_url")]
    pub cover_image_url: Option<String>,
    /// Статус публикации.
    #[serde(default)]
    pub status: Option<String>,
}

impl TryFrom<PostRow> for Post {
    type Error = RowError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        if row.id <= 0 {
            return Err(RowError::Validation {
                field: "id",
                message: "must be > 0",
            });
        }

        let slug = normalize_slug(row.slug.as_deref())?;
        let title = require_text("title", row.title.as_deref())?;
        let published_at = row.published_at.ok_or(RowError::Validation {
            field: "published_at",
            message: "must be present",
        })?;
        let status = row
            .status
            .as_deref()
            .ok_or(RowError::Validation {
                field: "status",
                message: "must be present",
            })?
            .parse::<PostStatus>()?;

        let cover_image_url = row
            .cover_image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            id: row.id,
            slug,
            title,
            summary: row.summary.unwrap_or_default(),
            body_html: row.body_html.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            published_at,
            cover_image_url,
            status,
        })
    }
}

impl From<Post> for PostRow {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            slug: Some(post.slug),
            title: Some(post.title),
            summary: Some(post.summary),
            body_html: Some(post.body_html),
            category: Some(post.category),
            published_at: Some(post.published_at),
            cover_image_url: post.cover_image_url,
            status: Some(post.status.as_str().to_string()),
        }
    }
}

fn normalize_slug(slug: Option<&str>) -> Result<String, RowError> {
    let slug = require_text("slug", slug)?;
    let url_safe = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !url_safe {
        return Err(RowError::Validation {
            field: "slug",
            message: "must contain only [a-z0-9_-]",
        });
    }
    Ok(slug)
}

fn require_text(field: &'static str, value: Option<&str>) -> Result<String, RowError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(RowError::Validation {
            field,
            message: "must not be empty",
        });
    }
    Ok(value.to_string())
}
