use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ContentError, ContentResult};
use crate::models::{Post, PostPage, PostRow, PostStatus};
use crate::store::{CategoryFilter, ContentStore, PostQuery};

const SEARCH_FIELDS: [&str; 3] = ["title", "summary", "body_html"];
const ORDER_NEWEST_FIRST: &str = "published_at.desc,id.desc";
/// Размер пачки при выборке меток категорий; сервер может отдать меньше (`max-rows`).
const CATEGORY_BATCH: u64 = 1000;

#[derive(Debug, Deserialize)]
struct ErrorResponseDto {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryRowDto {
    category: Option<String>,
}

#[derive(Debug, Clone)]
/// Параметры подключения к REST API хранилища.
pub struct RestStoreConfig {
    /// Базовый URL проекта, например `https://xyz.supabase.co`.
    pub base_url: String,
    /// Публичный (anon) ключ API.
    pub api_key: String,
    /// Имя таблицы постов.
    pub table: String,
    /// Таймаут установки соединения.
    pub connect_timeout: Duration,
    /// Таймаут всего запроса.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
/// Хранилище контента поверх PostgREST-совместимого API размещённой БД.
pub struct RestContentStore {
    base_url: String,
    table: String,
    api_key: String,
    client: Client,
}

impl RestContentStore {
    /// Создаёт клиент хранилища; таймауты задаются на уровне транспорта.
    pub fn new(config: RestStoreConfig) -> ContentResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()?;

        Ok(Self::with_client(config, client))
    }

    fn with_client(config: RestStoreConfig, client: Client) -> Self {
        Self {
            base_url: config.base_url,
            table: config.table,
            api_key: config.api_key,
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.table.trim_matches('/')
        )
    }

    fn get(&self, params: &[(&'static str, String)]) -> RequestBuilder {
        self.client
            .get(self.endpoint())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(params)
    }

    async fn decode_error(response: Response) -> ContentError {
        let status = response.status();

        let message = match response.json::<ErrorResponseDto>().await {
            Ok(body) => body.message,
            Err(_) => None,
        };
        ContentError::from_http_status(status, message)
    }

    async fn send(request: RequestBuilder) -> ContentResult<Response> {
        let response = request.send().await.map_err(ContentError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }
        Ok(response)
    }

    /// Строки и точное число совпадений (`Prefer: count=exact`).
    ///
    /// Смещение за концом выборки PostgREST отвечает 416 с `Content-Range: */N`:
    /// это пустая страница, а не ошибка.
    async fn fetch_counted<T: DeserializeOwned>(
        &self,
        params: &[(&'static str, String)],
    ) -> ContentResult<(Vec<T>, u64)> {
        let response = self
            .get(params)
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(ContentError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(Self::decode_error(response).await);
        }

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| ContentError::Decode("missing exact count in Content-Range".to_string()))?;

        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            debug!(total, "requested range is past the end");
            return Ok((Vec::new(), total));
        }

        let rows = Self::decode_json(response).await?;
        Ok((rows, total))
    }

    async fn decode_json<T: DeserializeOwned>(response: Response) -> ContentResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|err| ContentError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ContentStore for RestContentStore {
    async fn query_published(&self, query: &PostQuery) -> ContentResult<PostPage> {
        if query.category.is_unsatisfiable() {
            return Ok(PostPage::empty());
        }

        let (rows, total): (Vec<PostRow>, u64) = self.fetch_counted(&list_params(query)).await?;
        let items = rows
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            offset = query.offset,
            limit = query.limit,
            returned = items.len(),
            total,
            "store page fetched"
        );
        Ok(PostPage { items, total })
    }

    async fn find_published_by_slug(&self, slug: &str) -> ContentResult<Vec<Post>> {
        let params = [
            ("select", "*".to_string()),
            ("status", format!("eq.{}", PostStatus::Published)),
            ("slug", format!("eq.{slug}")),
            // двух строк достаточно, чтобы заметить дубликат slug
            ("limit", "2".to_string()),
        ];
        let response = Self::send(self.get(&params)).await?;

        let rows: Vec<PostRow> = Self::decode_json(response).await?;
        Ok(rows
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn published_categories(&self) -> ContentResult<Vec<String>> {
        let mut labels = Vec::new();

        loop {
            let offset = labels.len() as u64;
            let params = [
                ("select", "category".to_string()),
                ("status", format!("eq.{}", PostStatus::Published)),
                ("order", "id.asc".to_string()),
                ("limit", CATEGORY_BATCH.to_string()),
                ("offset", offset.to_string()),
            ];
            let (rows, total): (Vec<CategoryRowDto>, u64) = self.fetch_counted(&params).await?;

            let fetched = rows.len();
            labels.extend(rows.into_iter().map(|row| row.category.unwrap_or_default()));

            if fetched == 0 || labels.len() as u64 >= total {
                if (labels.len() as u64) < total {
                    warn!(
                        fetched = labels.len(),
                        total,
                        "category rows ended before the exact count"
                    );
                }
                break;
            }
        }

        debug!(labels = labels.len(), "category labels fetched");
        Ok(labels)
    }
}

fn list_params(query: &PostQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("select", "*".to_string()),
        ("status", format!("eq.{}", PostStatus::Published)),
    ];

    match &query.category {
        CategoryFilter::Any => {}
        CategoryFilter::Exact(label) => params.push(("category", format!("eq.{label}"))),
        CategoryFilter::OneOf(labels) => {
            let list = labels
                .iter()
                .map(|label| quote(label))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("category", format!("in.({list})")));
        }
    }

    if let Some(term) = &query.search {
        let pattern = quote(&format!("*{}*", escape_like(term)));
        let clauses = SEARCH_FIELDS
            .iter()
            .map(|field| format!("{field}.ilike.{pattern}"))
            .collect::<Vec<_>>()
            .join(",");
        params.push(("or", format!("({clauses})")));
    }

    params.push(("order", ORDER_NEWEST_FIRST.to_string()));
    params.push(("limit", query.limit.to_string()));
    params.push(("offset", query.offset.to_string()));
    params
}

/// Значение в двойных кавычках для списков `in.(...)` и `or=(...)`.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Общее число строк из `Content-Range`: `0-5/13` или `*/13`.
fn parse_content_range(raw: &str) -> Option<u64> {
    let (_, total) = raw.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::client::ContentClient;

    fn config(base_url: &str) -> RestStoreConfig {
        RestStoreConfig {
            base_url: base_url.to_string(),
            api_key: "anon".to_string(),
            table: "posts".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
        }
    }

    #[test]
    fn endpoint_normalizes_slashes() {
        let store = RestContentStore::new(config("https://example.supabase.co/"))
            .expect("client must build");
        assert_eq!(store.endpoint(), "https://example.supabase.co/rest/v1/posts");
    }

    #[test]
    fn content_range_reads_total() {
        assert_eq!(parse_content_range("0-5/13"), Some(13));
        assert_eq!(parse_content_range("*/13"), Some(13));
        assert_eq!(parse_content_range("0-5/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn list_params_without_filters() {
        let params = list_params(&PostQuery::page(3, 6));

        assert!(params.contains(&("status", "eq.published".to_string())));
        assert!(params.contains(&("order", "published_at.desc,id.desc".to_string())));
        assert!(params.contains(&("limit", "6".to_string())));
        assert!(params.contains(&("offset", "12".to_string())));
        assert!(!params.iter().any(|(key, _)| *key == "category" || *key == "or"));
    }

    #[test]
    fn list_params_with_category_and_search() {
        let query = PostQuery::page(1, 6)
            .with_category(CategoryFilter::Exact("Food Service".to_string()))
            .with_search(Some("50% off"));
        let params = list_params(&query);

        assert!(params.contains(&("category", "eq.Food Service".to_string())));
        assert!(params.contains(&(
            "or",
            r#"(title.ilike."*50\\% off*",summary.ilike."*50\\% off*",body_html.ilike."*50\\% off*")"#
                .to_string()
        )));
    }

    #[test]
    fn list_params_with_label_set() {
        let query = PostQuery::page(1, 6).with_category(CategoryFilter::OneOf(vec![
            "Foodservice".to_string(),
            "food \"service\"".to_string(),
        ]));
        let params = list_params(&query);

        assert!(params.contains(&(
            "category",
            r#"in.("Foodservice","food \"service\"")"#.to_string()
        )));
    }

    struct MockServer {
        base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl MockServer {
        /// Отвечает заготовленными ответами по одному на соединение.
        async fn start(responses: Vec<String>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
            let addr = listener.local_addr().expect("mock server address");
            let requests = Arc::new(Mutex::new(Vec::new()));

            let seen = requests.clone();
            tokio::spawn(async move {
                for response in responses {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };

                    let mut raw = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !raw.windows(4).any(|window| window == b"\r\n\r\n") {
                        let read = socket.read(&mut chunk).await.unwrap_or(0);
                        if read == 0 {
                            break;
                        }
                        raw.extend_from_slice(&chunk[..read]);
                    }

                    let request_line = String::from_utf8_lossy(&raw)
                        .lines()
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().expect("requests mutex poisoned").push(request_line);

                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                requests,
            }
        }

        fn store(&self) -> RestContentStore {
            let client = Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("client must build");
            RestContentStore::with_client(config(&self.base_url), client)
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().expect("requests mutex poisoned").clone()
        }
    }

    fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut raw = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
            body.len()
        );
        for (name, value) in headers {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
        raw.push_str("\r\n");
        raw.push_str(body);
        raw
    }

    fn row_json(id: i64, slug: &str) -> String {
        format!(
            r#"{{"id":{id},"slug":"{slug}","title":"Post {id}","category":"News","published_at":"2026-01-0{id}T10:00:00Z","status":"published"}}"#
        )
    }

    #[tokio::test]
    async fn page_reads_rows_and_exact_total() {
        let body = format!("[{},{}]", row_json(2, "second"), row_json(1, "first"));
        let server = MockServer::start(vec![http_response(
            "206 Partial Content",
            &[("Content-Range", "0-1/13")],
            &body,
        )])
        .await;

        let page = server
            .store()
            .query_published(&PostQuery::page(1, 2))
            .await
            .expect("page must load");

        assert_eq!(page.total, 13);
        let slugs: Vec<&str> = page.items.iter().map(|post| post.slug.as_str()).collect();
        assert_eq!(slugs, vec!["second", "first"]);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("GET /rest/v1/posts?"));
        assert!(requests[0].contains("status=eq.published"));
        assert!(requests[0].contains("limit=2"));
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty_with_total() {
        let server = MockServer::start(vec![http_response(
            "416 Range Not Satisfiable",
            &[("Content-Range", "*/13")],
            r#"{"code":"PGRST103","message":"Requested range not satisfiable"}"#,
        )])
        .await;
        let client = ContentClient::new(server.store());

        let page = client
            .try_list_posts(4, 6, CategoryFilter::Any, None)
            .await
            .expect("past-the-end page is not an error");

        assert!(page.items.is_empty());
        assert_eq!(page.total, 13);
        assert!(server.requests()[0].contains("offset=18"));
    }

    #[tokio::test]
    async fn missing_content_range_is_a_decode_error() {
        let server = MockServer::start(vec![http_response("200 OK", &[], "[]")]).await;

        let err = server
            .store()
            .query_published(&PostQuery::page(1, 6))
            .await
            .expect_err("count is required");

        assert!(matches!(err, ContentError::Decode(_)));
    }

    #[tokio::test]
    async fn error_body_message_is_surfaced() {
        let server = MockServer::start(vec![http_response(
            "401 Unauthorized",
            &[],
            r#"{"message":"Invalid API key"}"#,
        )])
        .await;

        let err = server
            .store()
            .query_published(&PostQuery::page(1, 6))
            .await
            .expect_err("401 must fail");

        match err {
            ContentError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_without_body_falls_back_to_status_text() {
        let server =
            MockServer::start(vec![http_response("503 Service Unavailable", &[], "")]).await;

        let err = server
            .store()
            .published_categories()
            .await
            .expect_err("503 must fail");

        match err {
            ContentError::Status { status, message } => {
                assert_eq!(status, 503);
                assert!(message.contains("503"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_row_is_rejected() {
        let body = format!("[{}]", row_json(1, "Not A Slug!"));
        let server = MockServer::start(vec![http_response(
            "200 OK",
            &[("Content-Range", "0-0/1")],
            &body,
        )])
        .await;

        let err = server
            .store()
            .query_published(&PostQuery::page(1, 6))
            .await
            .expect_err("row must be rejected");

        assert!(matches!(err, ContentError::MalformedRow(_)));
    }

    #[tokio::test]
    async fn duplicate_slug_rows_reach_the_client() {
        let body = format!("[{},{}]", row_json(1, "same"), row_json(2, "same"));
        let server = MockServer::start(vec![http_response("200 OK", &[], &body)]).await;
        let client = ContentClient::new(server.store());

        let err = client
            .try_get_post_by_slug("same")
            .await
            .expect_err("duplicate slug must fail");

        assert!(matches!(err, ContentError::DuplicateSlug { count: 2, .. }));
        let requests = server.requests();
        assert!(requests[0].contains("slug=eq.same"));
        assert!(requests[0].contains("limit=2"));
    }

    #[tokio::test]
    async fn categories_are_fetched_until_exact_count() {
        // сервер режет ответ до двух строк, как при max-rows
        let server = MockServer::start(vec![
            http_response(
                "206 Partial Content",
                &[("Content-Range", "0-1/3")],
                r#"[{"category":"News"},{"category":"news"}]"#,
            ),
            http_response(
                "206 Partial Content",
                &[("Content-Range", "2-2/3")],
                r#"[{"category":"Events"}]"#,
            ),
        ])
        .await;

        let labels = server
            .store()
            .published_categories()
            .await
            .expect("categories must load");

        assert_eq!(labels, vec!["News", "news", "Events"]);
        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("offset=0"));
        assert!(requests[1].contains("offset=2"));
    }

    #[tokio::test]
    async fn categories_stop_when_rows_run_out() {
        let server = MockServer::start(vec![
            http_response(
                "206 Partial Content",
                &[("Content-Range", "0-0/2")],
                r#"[{"category":"News"}]"#,
            ),
            http_response("416 Range Not Satisfiable", &[("Content-Range", "*/1")], "{}"),
        ])
        .await;

        let labels = server
            .store()
            .published_categories()
            .await
            .expect("categories must load");

        assert_eq!(labels, vec!["News"]);
        assert_eq!(server.requests().len(), 2);
    }
}
