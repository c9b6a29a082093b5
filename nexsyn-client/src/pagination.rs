use serde::Serialize;

/// Полная полоса без многоточий показывается до этого числа страниц включительно.
const FULL_STRIP_MAX_PAGES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
/// Положение многоточия в полосе страниц.
pub enum EllipsisPosition {
    /// Между первой страницей и окном вокруг текущей.
    Leading,
    /// Между окном вокруг текущей и последней страницей.
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
/// Элемент полосы пагинации.
pub enum PageItem {
    /// Номер страницы (с 1).
    Page(u32),
    /// Пропуск; два многоточия различаются, чтобы ключи списка были стабильны.
    Ellipsis(EllipsisPosition),
}

impl PageItem {
    /// Стабильный ключ элемента для отрисовки списка.
    pub fn key(&self) -> String {
        match self {
            Self::Page(page) => format!("page-{page}"),
            Self::Ellipsis(EllipsisPosition::Leading) => "ellipsis-leading".to_string(),
            Self::Ellipsis(EllipsisPosition::Trailing) => "ellipsis-trailing".to_string(),
        }
    }
}

/// Число страниц: `ceil(total / page_size)`. При `page_size == 0` страниц нет.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Считает видимую полосу страниц для текущей страницы `current` из `total`.
///
/// До пяти страниц выводятся все. Иначе всегда есть первая и последняя
/// страница, соседи текущей, и многоточия там, где номера пропущены.
pub fn compute_page_window(current: u32, total: u32) -> Vec<PageItem> {
    if total <= FULL_STRIP_MAX_PAGES {
        return (1..=total).map(PageItem::Page).collect();
    }

    let mut items = Vec::with_capacity(7);
    items.push(PageItem::Page(1));

    if current > 3 {
        items.push(PageItem::Ellipsis(EllipsisPosition::Leading));
    }

    let start = current.saturating_sub(1).max(2);
    let end = current.saturating_add(1).min(total - 1);
    items.extend((start..=end).map(PageItem::Page));

    if current < total - 2 {
        items.push(PageItem::Ellipsis(EllipsisPosition::Trailing));
    }

    items.push(PageItem::Page(total));
    items
}
