use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::error::ContentResult;
use crate::models::{Post, PostPage};
use crate::store::{ContentStore, PostQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Статистика кэша чтения.
pub struct CacheStats {
    /// Ответов, отданных из кэша.
    pub hits: u64,
    /// Запросов, ушедших во внутреннее хранилище.
    pub misses: u64,
    /// Сколько записей сейчас хранится.
    pub entries: usize,
}

struct CacheEntry<V> {
    stored_at: Instant,
    value: V,
}

struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&self, key: K, value: V) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }
}

/// Обёртка над хранилищем с TTL-кэшем ответов.
///
/// Ключ страницы включает все фильтры и окно `offset/limit`, поэтому разные
/// наборы фильтров никогда не делят запись. Ошибки не кэшируются.
pub struct CachedContentStore<S: ContentStore> {
    inner: S,
    pages: TtlCache<PostQuery, PostPage>,
    slugs: TtlCache<String, Vec<Post>>,
    categories: TtlCache<(), Vec<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: ContentStore> CachedContentStore<S> {
    /// Оборачивает `inner`; записи живут `ttl`, в каждом разделе не больше `max_entries`.
    pub fn new(inner: S, ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner,
            pages: TtlCache::new(ttl, max_entries),
            slugs: TtlCache::new(ttl, max_entries),
            categories: TtlCache::new(ttl, 1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Текущая статистика.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.pages.len() + self.slugs.len() + self.categories.len(),
        }
    }

    /// Сбрасывает все записи (например, после публикации нового поста).
    pub fn invalidate_all(&self) {
        self.pages.clear();
        self.slugs.clear();
        self.categories.clear();
        debug!("content cache invalidated");
    }

    fn hit<V>(&self, value: V) -> V {
        self.hits.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl<S: ContentStore> ContentStore for CachedContentStore<S> {
    async fn query_published(&self, query: &PostQuery) -> ContentResult<PostPage> {
        if let Some(page) = self.pages.get(query) {
            debug!(offset = query.offset, limit = query.limit, "page cache hit");
            return Ok(self.hit(page));
        }
        self.miss();

        let page = self.inner.query_published(query).await?;
        self.pages.insert(query.clone(), page.clone());
        Ok(page)
    }

    async fn find_published_by_slug(&self, slug: &str) -> ContentResult<Vec<Post>> {
        let key = slug.to_string();
        if let Some(posts) = self.slugs.get(&key) {
            debug!(slug, "slug cache hit");
            return Ok(self.hit(posts));
        }
        self.miss();

        let posts = self.inner.find_published_by_slug(slug).await?;
        self.slugs.insert(key, posts.clone());
        Ok(posts)
    }

    async fn published_categories(&self) -> ContentResult<Vec<String>> {
        if let Some(labels) = self.categories.get(&()) {
            debug!("category cache hit");
            return Ok(self.hit(labels));
        }
        self.miss();

        let labels = self.inner.published_categories().await?;
        self.categories.insert((), labels.clone());
        Ok(labels)
    }
}
