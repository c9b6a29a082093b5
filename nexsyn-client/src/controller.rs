use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::ContentClient;
use crate::error::ContentResult;
use crate::models::{Post, PostPage};
use crate::navigation::{NavState, Navigator};
use crate::pagination::{PageItem, compute_page_window, total_pages};
use crate::store::{CategoryFilter, ContentStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// Фаза представления со списком постов.
pub enum ViewPhase {
    /// Данные ещё не запрашивались.
    Idle,
    /// Запрос в полёте; список очищен.
    Loading,
    /// Список соответствует текущим фильтрам.
    Loaded,
    /// Последний запрос завершился ошибкой; список пуст.
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Снимок состояния представления для отрисовки.
pub struct ViewState {
    /// Текущая фаза.
    pub phase: ViewPhase,
    /// Фильтры последнего запроса.
    pub filters: Option<NavState>,
    /// Посты текущей страницы.
    pub items: Vec<Post>,
    /// Общее число постов под фильтрами.
    pub total: u64,
    /// Сообщение об ошибке для фазы `Errored`.
    pub error: Option<String>,
    /// Поколение последнего запроса.
    pub generation: u64,
}

impl ViewState {
    fn idle() -> Self {
        Self {
            phase: ViewPhase::Idle,
            filters: None,
            items: Vec::new(),
            total: 0,
            error: None,
            generation: 0,
        }
    }

    /// Текущая страница (1, пока ничего не запрошено).
    pub fn page(&self) -> u32 {
        self.filters.as_ref().map_or(1, |filters| filters.page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Запрос, начатый контроллером: фильтры и поколение на момент старта.
pub struct FetchTicket {
    generation: u64,
    filters: NavState,
}

impl FetchTicket {
    /// Поколение запроса.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Фильтры, с которыми запрос был начат.
    pub fn filters(&self) -> &NavState {
        &self.filters
    }
}

#[derive(Debug)]
/// Ответ на запрос, ещё не применённый к состоянию.
pub struct FetchOutcome {
    ticket: FetchTicket,
    result: ContentResult<PostPage>,
}

impl FetchOutcome {
    /// Запрос, к которому относится ответ.
    pub fn ticket(&self) -> &FetchTicket {
        &self.ticket
    }
}

/// Контроллер состояния одного представления со списком постов.
///
/// Фильтры всегда читаются из [`Navigator`]; контроллер сам пишет туда только
/// `page`. Каждый запрос получает номер поколения, и ответ применяется только
/// если за время запроса не было нового: так ответы, пришедшие не по порядку,
/// не показывают посты чужих фильтров.
///
/// Запрос разбит на шаги [`start_fetch`](Self::start_fetch),
/// [`fetch`](Self::fetch) и [`apply`](Self::apply); [`sync`](Self::sync)
/// выполняет их подряд.
pub struct QueryController<S: ContentStore, N: Navigator> {
    client: Arc<ContentClient<S>>,
    navigator: Arc<N>,
    page_size: u32,
    state: Mutex<ViewState>,
}

impl<S: ContentStore, N: Navigator> QueryController<S, N> {
    /// Создаёт контроллер в фазе `Idle`. `page_size` не меньше 1.
    pub fn new(client: Arc<ContentClient<S>>, navigator: Arc<N>, page_size: u32) -> Self {
        Self {
            client,
            navigator,
            page_size: page_size.max(1),
            state: Mutex::new(ViewState::idle()),
        }
    }

    /// Размер страницы.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Копия текущего состояния.
    pub fn snapshot(&self) -> ViewState {
        self.state().clone()
    }

    /// `ceil(total / page_size)` для текущего результата.
    pub fn total_pages(&self) -> u32 {
        total_pages(self.state().total, self.page_size)
    }

    /// Полоса пагинации для текущей страницы.
    pub fn page_window(&self) -> Vec<PageItem> {
        let state = self.state();
        compute_page_window(state.page(), total_pages(state.total, self.page_size))
    }

    /// Загрузка при монтировании.
    ///
    /// Повторный вызов перезагружает список с теми же фильтрами, но не пока
    /// запрос с этими фильтрами ещё в полёте.
    pub async fn mount(&self) -> bool {
        let ticket = self.begin(true);
        self.run(ticket).await
    }

    /// Сверяет фильтры с навигатором и перезагружает список, если они изменились.
    ///
    /// Возвращает `true`, если ответ был применён к состоянию.
    pub async fn sync(&self) -> bool {
        let ticket = self.start_fetch();
        self.run(ticket).await
    }

    /// Переход на страницу `page`.
    ///
    /// Текущая страница и страницы вне `1..=total_pages` игнорируются без
    /// запроса. Иначе `page` записывается в навигатор и список перезагружается.
    pub async fn change_page(&self, page: u32) -> bool {
        let (current, pages) = {
            let state = self.state();
            (state.page(), total_pages(state.total, self.page_size))
        };

        if page == current {
            debug!(page, "page change ignored: already on this page");
            return false;
        }
        if page == 0 || page > pages {
            debug!(page, total_pages = pages, "page change ignored: out of range");
            return false;
        }

        self.navigator.set_page(page);
        self.sync().await
    }

    /// Начинает запрос, если фильтры в навигаторе отличаются от текущих.
    ///
    /// Переводит состояние в `Loading` и очищает список.
    pub fn start_fetch(&self) -> Option<FetchTicket> {
        self.begin(false)
    }

    /// Выполняет запрос; состояние не меняется.
    pub async fn fetch(&self, ticket: FetchTicket) -> FetchOutcome {
        let result = self.load(&ticket.filters).await;
        FetchOutcome { ticket, result }
    }

    /// Применяет ответ, если он относится к последнему запросу.
    ///
    /// Устаревший ответ отбрасывается, возвращается `false`.
    pub fn apply(&self, outcome: FetchOutcome) -> bool {
        let mut state = self.state();
        let generation = outcome.ticket.generation;

        if generation != state.generation {
            debug!(
                generation,
                current = state.generation,
                "stale response discarded"
            );
            return false;
        }

        match outcome.result {
            Ok(page) => {
                info!(
                    generation,
                    items = page.items.len(),
                    total = page.total,
                    "posts loaded"
                );
                state.phase = ViewPhase::Loaded;
                state.items = page.items;
                state.total = page.total;
                state.error = None;
            }
            Err(err) => {
                warn!(generation, error = %err, "posts fetch failed");
                state.phase = ViewPhase::Errored;
                state.items.clear();
                state.total = 0;
                state.error = Some(err.to_string());
            }
        }
        true
    }

    fn begin(&self, force: bool) -> Option<FetchTicket> {
        let filters = NavState::from_location(&self.navigator.location());
        let mut state = self.state();

        let unchanged = state.phase != ViewPhase::Idle && state.filters.as_ref() == Some(&filters);
        if unchanged && (!force || state.phase == ViewPhase::Loading) {
            return None;
        }

        state.generation += 1;
        state.phase = ViewPhase::Loading;
        state.items.clear();
        state.total = 0;
        state.error = None;
        state.filters = Some(filters.clone());

        debug!(generation = state.generation, ?filters, "fetch started");
        Some(FetchTicket {
            generation: state.generation,
            filters,
        })
    }

    async fn run(&self, ticket: Option<FetchTicket>) -> bool {
        match ticket {
            Some(ticket) => {
                let outcome = self.fetch(ticket).await;
                self.apply(outcome)
            }
            None => false,
        }
    }

    async fn load(&self, filters: &NavState) -> ContentResult<PostPage> {
        let category = match &filters.category {
            Some(slug) => self.client.resolve_category(slug).await?,
            None => CategoryFilter::Any,
        };

        self.client
            .try_list_posts(
                filters.page,
                self.page_size,
                category,
                filters.search.as_deref(),
            )
            .await
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
