//! Клиентский слой контента сайта NEXSYN: выборка постов, пагинация,
//! фильтры по категории и поиску, состояние представления.
//!
//! Состав:
//! - [`ContentClient`]: запросы опубликованных постов и категорий к
//!   [`ContentStore`] (REST API размещённой БД, память или кэш поверх них);
//! - [`QueryController`]: машина состояний представления, которая берёт
//!   фильтры из адреса и отбрасывает устаревшие ответы;
//! - [`compute_page_window`]: полоса номеров страниц с многоточиями;
//! - [`to_slug`] / [`to_display`]: преобразование меток категорий.
#![warn(missing_docs)]

mod client;
mod controller;
mod error;
mod models;
mod navigation;
mod pagination;
mod slug;
mod store;

pub use client::ContentClient;
pub use controller::{FetchOutcome, FetchTicket, QueryController, ViewPhase, ViewState};
pub use error::{ContentError, ContentResult};
pub use models::{CategorySummary, Post, PostPage, PostRow, PostStatus, RowError};
pub use navigation::{Location, MemoryNavigator, NavState, Navigator};
pub use pagination::{EllipsisPosition, PageItem, compute_page_window, total_pages};
pub use slug::{CategorySlug, compare_display, to_display, to_slug};
pub use store::cached::{CacheStats, CachedContentStore};
pub use store::memory::MemoryContentStore;
pub use store::rest::{RestContentStore, RestStoreConfig};
pub use store::{CategoryFilter, ContentStore, PostQuery, matches_search, newest_first};
