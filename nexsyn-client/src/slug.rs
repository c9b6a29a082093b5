//! Преобразование меток категорий в slug и обратно.
//!
//! `to_slug` и `to_display` не являются точными обратными функциями: регистр и
//! диакритика теряются. Гарантируется только стабильность
//! `to_slug(to_display(to_slug(x))) == to_slug(x)`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Переводит произвольный текст в URL-safe slug.
///
/// Текст раскладывается (NFD) без комбинируемых знаков, приводится к нижнему
/// регистру и обрезается; серии пробелов становятся одним `-`, всё вне
/// `[a-z0-9_-]` отбрасывается. Slug не начинается и не заканчивается `-` и не
/// содержит `--`.
pub fn to_slug(text: &str) -> String {
    let folded = fold(text);

    let mut slug = String::with_capacity(folded.len());
    let mut pending_hyphen = false;
    for c in folded.trim().chars() {
        if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
            continue;
        }
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            continue;
        }
        if pending_hyphen && !slug.is_empty() {
            slug.push('-');
        }
        pending_hyphen = false;
        slug.push(c);
    }
    slug
}

/// Восстанавливает отображаемое имя из slug: `food-service` -> `Food Service`.
pub fn to_display(slug: &str) -> String {
    slug.split('-')
        .filter(|segment| !segment.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Сравнение отображаемых имён с учётом языка: сначала без диакритики и
/// регистра, затем побайтно для детерминированности.
pub fn compare_display(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Slug категории: всегда результат [`to_slug`], никогда не пустой.
pub struct CategorySlug(String);

impl CategorySlug {
    /// Строит slug из сырой метки. `None`, если после нормализации ничего не осталось.
    pub fn from_label(label: &str) -> Option<Self> {
        let slug = to_slug(label);
        if slug.is_empty() {
            return None;
        }
        Some(Self(slug))
    }

    /// Принимает только уже нормализованный slug (например, сегмент пути).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || to_slug(raw) != raw {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    /// Строковое значение slug.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Отображаемое имя категории.
    pub fn display_name(&self) -> String {
        to_display(&self.0)
    }
}

impl fmt::Display for CategorySlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CategorySlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
