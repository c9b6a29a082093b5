use thiserror::Error;

use crate::models::RowError;

#[derive(Debug, Error)]
/// Ошибки клиентской библиотеки `nexsyn-client`.
pub enum ContentError {
    /// Ошибка HTTP-транспорта (`reqwest`): сеть, таймаут, TLS.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Хранилище ответило неуспешным статусом.
    #[error("store responded with status {status}: {message}")]
    Status {
        /// HTTP-статус ответа.
        status: u16,
        /// Сообщение хранилища или описание статуса.
        message: String,
    },

    /// Ответ хранилища не удалось разобрать.
    #[error("malformed store response: {0}")]
    Decode(String),

    /// Строка из хранилища не прошла проверку схемы.
    #[error("malformed post row: {0}")]
    MalformedRow(#[from] RowError),

    /// Для одного slug найдено несколько опубликованных постов.
    #[error("slug '{slug}' matches {count} published posts")]
    DuplicateSlug {
        /// Запрошенный slug.
        slug: String,
        /// Сколько постов вернуло хранилище.
        count: usize,
    },

    /// Некорректные параметры запроса.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Хранилище недоступно (например, не удалось прочитать fixture).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Результат операций `nexsyn-client`.
pub type ContentResult<T> = Result<T, ContentError>;

impl ContentError {
    pub(crate) fn from_http_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| format!("http status {status}"));
        Self::Status {
            status: status.as_u16(),
            message,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, None);
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Http(err)
    }
}
