//! Навигационное состояние: категория из пути, `q` и `page` из строки запроса.

use std::sync::{Mutex, PoisonError};

use crate::slug::CategorySlug;

const SEARCH_PARAM: &str = "q";
const PAGE_PARAM: &str = "page";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// Текущий адрес представления.
pub struct Location {
    /// Сегмент пути с категорией, если представление открыто на категории.
    pub category: Option<String>,
    /// Строка запроса без ведущего `?`, в URL-кодировке.
    pub query: String,
}

impl Location {
    /// Создаёт адрес; ведущий `?` в строке запроса отбрасывается.
    pub fn new(category: Option<&str>, query: &str) -> Self {
        Self {
            category: category.map(str::to_string),
            query: query.trim_start_matches('?').to_string(),
        }
    }

    /// Первое значение параметра запроса в декодированном виде.
    pub fn param(&self, key: &str) -> Option<String> {
        pairs(&self.query)
            .find(|(name, _)| decode(*name) == key)
            .map(|(_, value)| decode(value))
    }

    /// Тот же адрес с другим `page`; остальные параметры и их порядок не меняются.
    pub fn with_page(&self, page: u32) -> Self {
        let mut replaced = false;
        let mut parts: Vec<String> = Vec::new();

        for (name, value) in pairs(&self.query) {
            if decode(name) != PAGE_PARAM {
                parts.push(join_pair(name, value));
                continue;
            }
            if !replaced {
                parts.push(format!("{PAGE_PARAM}={page}"));
                replaced = true;
            }
        }
        if !replaced {
            parts.push(format!("{PAGE_PARAM}={page}"));
        }

        Self {
            category: self.category.clone(),
            query: parts.join("&"),
        }
    }
}

fn pairs(query: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (pair, None),
        })
}

fn join_pair(name: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{name}={value}"),
        None => name.to_string(),
    }
}

fn decode<'a>(raw: impl Into<Option<&'a str>>) -> String {
    let raw = raw.into().unwrap_or_default().replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Набор фильтров, выведенный из адреса.
pub struct NavState {
    /// Категория (slug); `None` для общей ленты.
    pub category: Option<CategorySlug>,
    /// Поисковая строка; пустая считается отсутствующей.
    pub search: Option<String>,
    /// Номер страницы, с 1.
    pub page: u32,
}

impl Default for NavState {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            page: 1,
        }
    }
}

impl NavState {
    /// Разбирает адрес. Отсутствующий, нечисловой или нулевой `page` даёт 1.
    pub fn from_location(location: &Location) -> Self {
        let category = location
            .category
            .as_deref()
            .and_then(CategorySlug::from_label);

        let search = location
            .param(SEARCH_PARAM)
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());

        let page = location
            .param(PAGE_PARAM)
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1);

        Self {
            category,
            search,
            page,
        }
    }

    /// Те же фильтры на другой странице.
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }
}

/// Роутер представления: источник истины для фильтров.
///
/// Контроллер только читает адрес и переписывает в нём `page`; категория и
/// поиск меняются снаружи.
pub trait Navigator: Send + Sync {
    /// Текущий адрес.
    fn location(&self) -> Location;

    /// Переписывает параметр `page` в текущем адресе.
    fn set_page(&self, page: u32);
}

#[derive(Debug, Default)]
/// Навигатор, хранящий адрес в памяти.
pub struct MemoryNavigator {
    location: Mutex<Location>,
}

impl MemoryNavigator {
    /// Создаёт навигатор с начальным адресом.
    pub fn new(location: Location) -> Self {
        Self {
            location: Mutex::new(location),
        }
    }

    /// Переход на другой адрес (смена категории или поиска).
    pub fn navigate(&self, location: Location) {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = location;
    }
}

impl Navigator for MemoryNavigator {
    fn location(&self) -> Location {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_page(&self, page: u32) {
        let mut location = self.location.lock().unwrap_or_else(PoisonError::into_inner);
        *location = location.with_page(page);
    }
}
