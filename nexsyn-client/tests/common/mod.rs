#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use nexsyn_client::{Post, PostStatus};

pub fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + offset_secs, 0)
        .single()
        .expect("valid ts")
}

pub fn post(id: i64, category: &str, published_at: DateTime<Utc>, status: PostStatus) -> Post {
    Post {
        id,
        slug: format!("post-{id}"),
        title: format!("Post {id}"),
        summary: format!("Summary {id}"),
        body_html: format!("<p>Body {id}</p>"),
        category: category.to_string(),
        published_at,
        cover_image_url: None,
        status,
    }
}

/// `count` опубликованных постов; даты повторяются по три, чтобы сработал tie-break по id.
pub fn published_posts(count: i64) -> Vec<Post> {
    (1..=count)
        .map(|id| post(id, "news", ts(id / 3), PostStatus::Published))
        .collect()
}

/// Опубликованные посты вперемешку с черновиками.
pub fn mixed_posts(published: i64, drafts: i64) -> Vec<Post> {
    let mut posts = published_posts(published);
    posts.extend((1..=drafts).map(|n| post(1_000 + n, "news", ts(n), PostStatus::Draft)));
    posts
}
