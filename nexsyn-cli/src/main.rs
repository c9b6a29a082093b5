use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use nexsyn_client::{
    CachedContentStore, CategorySummary, ContentClient, ContentError, ContentStore, Location,
    MemoryContentStore, MemoryNavigator, PageItem, Post, QueryController, RestContentStore,
    ViewPhase, ViewState, compute_page_window, to_display, to_slug,
};
use serde_json::json;
use tracing::debug;

mod logging;
mod settings;

use logging::init_logging;
use settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "nexsyn-cli", version, about = "CLI для ленты постов NEXSYN")]
struct Cli {
    /// JSON-файл со строками таблицы постов вместо REST-хранилища.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Вывод в JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Страница ленты с фильтрами и полосой пагинации.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Slug категории (сегмент пути).
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// По умолчанию NEXSYN_PAGE_SIZE.
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Пост по slug.
    Get {
        #[arg(long)]
        slug: String,
    },
    /// Категории с числом опубликованных постов.
    Categories,
    /// Полоса пагинации без обращения к хранилищу.
    Window {
        #[arg(long)]
        current: u32,
        #[arg(long)]
        total: u32,
    },
    /// Slug и отображаемое имя для метки категории.
    Slug {
        #[arg(long)]
        text: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Ошибка: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if run_offline(&cli.command, cli.json)? {
        return Ok(());
    }

    let settings = Settings::from_env()?;
    init_logging(&settings)?;

    match cli.fixture.clone() {
        Some(path) => {
            let store = MemoryContentStore::from_file(&path).map_err(map_content_error)?;
            debug!(path = %path.display(), "using fixture store");
            with_cache(store, &settings, cli).await
        }
        None => {
            let store = RestContentStore::new(settings.rest_config()?).map_err(map_content_error)?;
            with_cache(store, &settings, cli).await
        }
    }
}

/// Команды, которым не нужны ни настройки, ни хранилище. `true`, если команда выполнена.
fn run_offline(command: &Command, as_json: bool) -> Result<bool> {
    match command {
        Command::Window { current, total } => {
            print_window(&compute_page_window(*current, *total), *current, as_json)?;
            Ok(true)
        }
        Command::Slug { text } => {
            print_slug(text, as_json)?;
            Ok(true)
        }
        Command::List { .. } | Command::Get { .. } | Command::Categories => Ok(false),
    }
}

async fn with_cache<S: ContentStore>(store: S, settings: &Settings, cli: Cli) -> Result<()> {
    match settings.cache_ttl() {
        Some(ttl) => {
            let cached = CachedContentStore::new(store, ttl, settings.cache_max_entries);
            execute(ContentClient::new(cached), settings, cli).await
        }
        None => execute(ContentClient::new(store), settings, cli).await,
    }
}

async fn execute<S: ContentStore>(
    client: ContentClient<S>,
    settings: &Settings,
    cli: Cli,
) -> Result<()> {
    match cli.command {
        Command::List {
            page,
            category,
            search,
            page_size,
        } => {
            let page_size = page_size.unwrap_or(settings.page_size);
            if page_size == 0 {
                bail!("--page-size должен быть больше 0");
            }

            let location = Location::new(category.as_deref(), &list_query(search.as_deref(), page));
            let navigator = Arc::new(MemoryNavigator::new(location));
            let controller = QueryController::new(Arc::new(client), navigator, page_size);
            controller.mount().await;

            let state = controller.snapshot();
            if state.phase == ViewPhase::Errored {
                let message = state.error.unwrap_or_default();
                bail!("не удалось загрузить посты: {message}");
            }
            print_list(&state, &controller.page_window(), controller.total_pages(), cli.json)?;
        }
        Command::Get { slug } => {
            let post = client
                .try_get_post_by_slug(&slug)
                .await
                .map_err(map_content_error)?
                .ok_or_else(|| anyhow!("пост не найден: {slug}"))?;
            print_post(&post, cli.json)?;
        }
        Command::Categories => {
            let categories = client
                .try_list_categories_with_counts()
                .await
                .map_err(map_content_error)?;
            print_categories(&categories, cli.json)?;
        }
        Command::Window { .. } | Command::Slug { .. } => {}
    }

    Ok(())
}

fn list_query(search: Option<&str>, page: u32) -> String {
    let mut parts = Vec::new();
    if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
        parts.push(format!("q={}", urlencoding::encode(term)));
    }
    if page != 1 {
        parts.push(format!("page={page}"));
    }
    parts.join("&")
}

fn map_content_error(err: ContentError) -> anyhow::Error {
    let message = match err {
        ContentError::Http(err) => format!("ошибка HTTP: {err}"),
        ContentError::Status { status, message } => {
            format!("хранилище ответило {status}: {message}")
        }
        ContentError::Decode(message) => format!("некорректный ответ хранилища: {message}"),
        ContentError::MalformedRow(err) => format!("некорректная строка поста: {err}"),
        ContentError::DuplicateSlug { slug, count } => {
            format!("slug `{slug}` принадлежит {count} опубликованным постам")
        }
        ContentError::InvalidRequest(message) => format!("некорректный запрос: {message}"),
        ContentError::Unavailable(message) => format!("хранилище недоступно: {message}"),
    };
    anyhow!(message)
}

fn render_window(items: &[PageItem], current: u32) -> String {
    items
        .iter()
        .map(|item| match item {
            PageItem::Page(page) if *page == current => format!("[{page}]"),
            PageItem::Page(page) => page.to_string(),
            PageItem::Ellipsis(_) => "…".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_window(items: &[PageItem], current: u32, as_json: bool) -> Result<()> {
    if as_json {
        return print_json(&json!(items));
    }
    println!("{}", render_window(items, current));
    Ok(())
}

fn print_slug(text: &str, as_json: bool) -> Result<()> {
    let slug = to_slug(text);
    let display = to_display(&slug);
    if as_json {
        return print_json(&json!({ "slug": slug, "display_name": display }));
    }
    println!("slug: {slug}");
    println!("display_name: {display}");
    Ok(())
}

fn print_list(state: &ViewState, window: &[PageItem], pages: u32, as_json: bool) -> Result<()> {
    let page = state.page();
    if as_json {
        return print_json(&json!({
            "page": page,
            "total_pages": pages,
            "total": state.total,
            "items": state.items,
            "window": window,
        }));
    }

    println!(
        "Постов: {} (страница {page} из {pages}, total={})",
        state.items.len(),
        state.total
    );
    for post in &state.items {
        println!(
            "- [{}] {} ({}, {})",
            post.slug,
            post.title,
            post.category,
            post.published_at.format("%Y-%m-%d")
        );
    }
    if !window.is_empty() {
        println!("Страницы: {}", render_window(window, page));
    }
    Ok(())
}

fn print_post(post: &Post, as_json: bool) -> Result<()> {
    if as_json {
        return print_json(&json!(post));
    }
    println!("id: {}", post.id);
    println!("slug: {}", post.slug);
    println!("title: {}", post.title);
    println!("category: {}", post.category);
    println!("published_at: {}", post.published_at);
    if let Some(cover) = &post.cover_image_url {
        println!("cover: {cover}");
    }
    println!("summary: {}", post.summary);
    println!("body_html: {}", post.body_html);
    Ok(())
}

fn print_categories(categories: &[CategorySummary], as_json: bool) -> Result<()> {
    if as_json {
        return print_json(&json!(categories));
    }
    println!("Категорий: {}", categories.len());
    for category in categories {
        println!(
            "- {} ({}): {}",
            category.display_name, category.slug, category.count
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use nexsyn_client::EllipsisPosition;

    use super::*;

    #[test]
    fn list_query_encodes_search_and_skips_first_page() {
        assert_eq!(list_query(None, 1), "");
        assert_eq!(list_query(Some("  "), 2), "page=2");
        assert_eq!(list_query(Some("café latte"), 3), "q=caf%C3%A9%20latte&page=3");
    }

    #[test]
    fn list_query_round_trips_through_location() {
        let location = Location::new(Some("news"), &list_query(Some("a&b"), 4));
        assert_eq!(location.param("q").as_deref(), Some("a&b"));
        assert_eq!(location.param("page").as_deref(), Some("4"));
    }

    #[test]
    fn render_window_marks_current_page() {
        let strip = render_window(&compute_page_window(5, 10), 5);
        assert_eq!(strip, "1 … 4 [5] 6 … 10");

        let items = [
            PageItem::Page(1),
            PageItem::Ellipsis(EllipsisPosition::Trailing),
            PageItem::Page(9),
        ];
        assert_eq!(render_window(&items, 9), "1 … [9]");
    }

    #[test]
    fn offline_commands_run_without_settings() {
        let window = Command::Window {
            current: 2,
            total: 7,
        };
        assert!(run_offline(&window, false).expect("window must print"));

        let slug = Command::Slug {
            text: "Café Operations".to_string(),
        };
        assert!(run_offline(&slug, true).expect("slug must print"));

        assert!(!run_offline(&Command::Categories, false).expect("store command is deferred"));
    }

    #[test]
    fn map_content_error_keeps_details() {
        let err = map_content_error(ContentError::Unavailable("timeout".to_string()));
        assert_eq!(err.to_string(), "хранилище недоступно: timeout");
    }
}
