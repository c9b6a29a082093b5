use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{ContentError, ContentResult};
use crate::models::{Post, PostPage, PostRow};
use crate::store::{ContentStore, PostQuery, newest_first};

#[derive(Debug, Clone, Default)]
/// Хранилище постов в памяти процесса.
///
/// Повторяет семантику удалённого хранилища: только `published`, фильтры,
/// порядок [`newest_first`], окно `offset/limit` и точный `total`.
pub struct MemoryContentStore {
    posts: Arc<RwLock<Vec<Post>>>,
}

impl MemoryContentStore {
    /// Создаёт хранилище с заданными постами.
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            posts: Arc::new(RwLock::new(posts)),
        }
    }

    /// Разбирает JSON-массив строк таблицы постов.
    pub fn from_json(raw: &str) -> ContentResult<Self> {
        let rows: Vec<PostRow> =
            serde_json::from_str(raw).map_err(|err| ContentError::Decode(err.to_string()))?;
        let posts = rows
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(posts))
    }

    /// Загружает fixture-файл с JSON-массивом строк.
    pub fn from_file(path: impl AsRef<Path>) -> ContentResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ContentError::Unavailable(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Заменяет содержимое хранилища (имитация правок извне).
    pub fn replace_all(&self, posts: Vec<Post>) -> ContentResult<()> {
        let mut guard = self
            .posts
            .write()
            .map_err(|_| ContentError::Unavailable("memory store lock poisoned".to_string()))?;
        *guard = posts;
        Ok(())
    }

    fn published_snapshot(&self) -> ContentResult<Vec<Post>> {
        let guard = self
            .posts
            .read()
            .map_err(|_| ContentError::Unavailable("memory store lock poisoned".to_string()))?;
        Ok(guard.iter().filter(|post| post.is_published()).cloned().collect())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn query_published(&self, query: &PostQuery) -> ContentResult<PostPage> {
        let mut matched: Vec<Post> = self
            .published_snapshot()?
            .into_iter()
            .filter(|post| query.matches(post))
            .collect();
        matched.sort_by(newest_first);

        let total = matched.len() as u64;
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let items = matched
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .collect();

        Ok(PostPage { items, total })
    }

    async fn find_published_by_slug(&self, slug: &str) -> ContentResult<Vec<Post>> {
        Ok(self
            .published_snapshot()?
            .into_iter()
            .filter(|post| post.slug == slug)
            .collect())
    }

    async fn published_categories(&self) -> ContentResult<Vec<String>> {
        Ok(self
            .published_snapshot()?
            .into_iter()
            .map(|post| post.category)
            .collect())
    }
}
