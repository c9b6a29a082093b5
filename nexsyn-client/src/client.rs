use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{ContentError, ContentResult};
use crate::models::{CategorySummary, Post, PostPage};
use crate::slug::{CategorySlug, compare_display};
use crate::store::{CategoryFilter, ContentStore, PostQuery};

/// Клиент репозитория контента.
///
/// Каждая операция есть в двух вариантах: `try_*` возвращает
/// [`ContentResult`], а вариант без префикса поглощает ошибку хранилища,
/// пишет её в лог и возвращает пустой результат.
pub struct ContentClient<S: ContentStore> {
    store: S,
}

impl<S: ContentStore> ContentClient<S> {
    /// Создаёт клиент поверх хранилища.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Хранилище, с которым работает клиент.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Страница опубликованных постов с фильтрами.
    ///
    /// `page` и `page_size` начинаются с 1. Пустой набор меток категории
    /// даёт пустую страницу без обращения к хранилищу.
    pub async fn try_list_posts(
        &self,
        page: u32,
        page_size: u32,
        category: CategoryFilter,
        search: Option<&str>,
    ) -> ContentResult<PostPage> {
        if page == 0 {
            return Err(ContentError::InvalidRequest("page must be >= 1".to_string()));
        }
        if page_size == 0 {
            return Err(ContentError::InvalidRequest(
                "page_size must be >= 1".to_string(),
            ));
        }

        let query = PostQuery::page(page, page_size)
            .with_category(category)
            .with_search(search);
        if query.category.is_unsatisfiable() {
            return Ok(PostPage::empty());
        }

        let mut result = self.store.query_published(&query).await?;

        let returned = result.items.len();
        result.items.retain(Post::is_published);
        if result.items.len() != returned {
            warn!(
                dropped = returned - result.items.len(),
                "store returned unpublished posts, dropped them"
            );
        }

        Ok(result)
    }

    /// Страница опубликованных постов; при ошибке хранилища пустая страница.
    ///
    /// `category` сравнивается с сырой меткой точным равенством, вызывающий
    /// код нормализует её сам.
    pub async fn list_posts(
        &self,
        page: u32,
        page_size: u32,
        category: Option<&str>,
        search: Option<&str>,
    ) -> PostPage {
        let filter = category
            .filter(|label| !label.trim().is_empty())
            .map(|label| CategoryFilter::Exact(label.to_string()))
            .unwrap_or_default();

        match self.try_list_posts(page, page_size, filter, search).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, page, page_size, "list_posts failed, returning empty page");
                PostPage::empty()
            }
        }
    }

    /// Единственный опубликованный пост с данным slug.
    pub async fn try_get_post_by_slug(&self, slug: &str) -> ContentResult<Option<Post>> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Ok(None);
        }

        let mut posts = self.store.find_published_by_slug(slug).await?;
        posts.retain(|post| post.is_published() && post.slug == slug);

        match posts.len() {
            0 => Ok(None),
            1 => Ok(posts.pop()),
            count => Err(ContentError::DuplicateSlug {
                slug: slug.to_string(),
                count,
            }),
        }
    }

    /// Пост по slug; `None`, если поста нет или хранилище недоступно.
    pub async fn get_post_by_slug(&self, slug: &str) -> Option<Post> {
        match self.try_get_post_by_slug(slug).await {
            Ok(post) => post,
            Err(err) => {
                warn!(error = %err, slug, "get_post_by_slug failed, returning none");
                None
            }
        }
    }

    /// Категории опубликованных постов с количеством, по алфавиту отображаемых имён.
    ///
    /// Метки, дающие одинаковый slug (`Foodservice` и `foodservice`),
    /// объединяются в одну запись с суммарным счётчиком.
    pub async fn try_list_categories_with_counts(&self) -> ContentResult<Vec<CategorySummary>> {
        let labels = self.store.published_categories().await?;

        let mut per_label: BTreeMap<String, u64> = BTreeMap::new();
        for label in labels {
            *per_label.entry(label).or_default() += 1;
        }

        let mut grouped: BTreeMap<CategorySlug, CategorySummary> = BTreeMap::new();
        for (label, count) in per_label {
            let Some(slug) = CategorySlug::from_label(&label) else {
                debug!(label = %label, count, "category skipped: label has no routable slug");
                continue;
            };

            let summary = grouped
                .entry(slug.clone())
                .or_insert_with(|| CategorySummary {
                    slug: slug.as_str().to_string(),
                    display_name: slug.display_name(),
                    count: 0,
                    labels: Vec::new(),
                });
            summary.count += count;
            summary.labels.push(label);
        }

        let mut categories: Vec<CategorySummary> = grouped.into_values().collect();
        for category in categories.iter().filter(|category| category.labels.len() > 1) {
            debug!(slug = %category.slug, labels = ?category.labels, "category labels merged");
        }
        categories.sort_by(|a, b| compare_display(&a.display_name, &b.display_name));
        Ok(categories)
    }

    /// Категории с количеством; пустой список при ошибке хранилища.
    pub async fn list_categories_with_counts(&self) -> Vec<CategorySummary> {
        match self.try_list_categories_with_counts().await {
            Ok(categories) => categories,
            Err(err) => {
                warn!(error = %err, "list_categories_with_counts failed, returning empty list");
                Vec::new()
            }
        }
    }

    /// Фильтр по сырым меткам, которые нормализуются в `slug`.
    ///
    /// Неизвестный slug даёт пустой набор меток, то есть пустую выдачу.
    pub async fn resolve_category(&self, slug: &CategorySlug) -> ContentResult<CategoryFilter> {
        let labels = self
            .try_list_categories_with_counts()
            .await?
            .into_iter()
            .find(|category| category.slug == slug.as_str())
            .map(|category| category.labels)
            .unwrap_or_default();
        Ok(CategoryFilter::OneOf(labels))
    }
}
