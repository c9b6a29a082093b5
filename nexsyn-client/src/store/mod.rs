//! Хранилище контента: внешний источник опубликованных постов.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::error::ContentResult;
use crate::models::{Post, PostPage};

pub(crate) mod cached;
pub(crate) mod memory;
pub(crate) mod rest;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
/// Фильтр по сырой метке категории. Метки сравниваются точным равенством.
pub enum CategoryFilter {
    /// Без фильтра.
    #[default]
    Any,
    /// Ровно эта метка.
    Exact(String),
    /// Любая из меток; пустой список не совпадает ни с чем.
    OneOf(Vec<String>),
}

impl CategoryFilter {
    /// Совпадает ли метка поста с фильтром.
    pub fn matches(&self, category: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(label) => label == category,
            Self::OneOf(labels) => labels.iter().any(|label| label == category),
        }
    }

    /// Заранее известно, что под фильтр не подойдёт ни один пост.
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::OneOf(labels) if labels.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Запрос страницы опубликованных постов к хранилищу.
pub struct PostQuery {
    /// Фильтр по категории.
    pub category: CategoryFilter,
    /// Подстрока для поиска без учёта регистра по title, summary и body.
    pub search: Option<String>,
    /// Смещение от начала упорядоченной выборки.
    pub offset: u64,
    /// Размер страницы.
    pub limit: u32,
}

impl PostQuery {
    /// Запрос страницы `page` (с 1) размером `page_size` без фильтров.
    pub fn page(page: u32, page_size: u32) -> Self {
        let offset = u64::from(page.saturating_sub(1)) * u64::from(page_size);
        Self {
            category: CategoryFilter::Any,
            search: None,
            offset,
            limit: page_size,
        }
    }

    /// Добавляет фильтр категории.
    pub fn with_category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }

    /// Добавляет поисковую строку; пустая строка фильтром не считается.
    pub fn with_search(mut self, search: Option<&str>) -> Self {
        self.search = search
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);
        self
    }

    /// Подходит ли пост под фильтры запроса (без учёта статуса и окна страницы).
    pub fn matches(&self, post: &Post) -> bool {
        if !self.category.matches(&post.category) {
            return false;
        }
        match &self.search {
            Some(term) => matches_search(post, term),
            None => true,
        }
    }
}

/// Поиск по title, summary и body через ИЛИ, без учёта регистра.
///
/// `*` в строке означает любую последовательность символов, как в `ilike`
/// у REST-хранилища; остальные символы сравниваются буквально.
pub fn matches_search(post: &Post, term: &str) -> bool {
    let term = term.to_lowercase();
    let parts: Vec<&str> = term.split('*').filter(|part| !part.is_empty()).collect();
    [&post.title, &post.summary, &post.body_html]
        .iter()
        .any(|field| contains_in_order(&field.to_lowercase(), &parts))
}

fn contains_in_order(haystack: &str, parts: &[&str]) -> bool {
    let mut rest = haystack;
    for part in parts {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    true
}

/// Порядок выдачи: сначала новые, при равной дате больший `id` первым.
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.published_at
        .cmp(&a.published_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Источник опубликованных постов.
///
/// Реализации отвечают только за транспорт и фильтрацию; инварианты
/// (только `published`, уникальность slug) дополнительно проверяет
/// [`crate::ContentClient`].
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Страница опубликованных постов в порядке [`newest_first`] и точное число совпадений.
    async fn query_published(&self, query: &PostQuery) -> ContentResult<PostPage>;

    /// Все опубликованные посты с данным slug.
    async fn find_published_by_slug(&self, slug: &str) -> ContentResult<Vec<Post>>;

    /// Сырая метка категории каждого опубликованного поста.
    async fn published_categories(&self) -> ContentResult<Vec<String>>;
}
