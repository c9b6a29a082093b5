use std::time::Duration;

use nexsyn_client::{
    CategoryFilter, ContentClient, RestContentStore, RestStoreConfig, compute_page_window,
    total_pages,
};

fn store_from_env() -> RestContentStore {
    let base_url = std::env::var("NEXSYN_STORE_URL").expect("NEXSYN_STORE_URL must be set");
    let api_key = std::env::var("NEXSYN_STORE_KEY").expect("NEXSYN_STORE_KEY must be set");
    let table = std::env::var("NEXSYN_POSTS_TABLE").unwrap_or_else(|_| "posts".to_string());

    RestContentStore::new(RestStoreConfig {
        base_url,
        api_key,
        table,
        connect_timeout: Duration::from_secs(5),
        timeout: Duration::from_secs(15),
    })
    .expect("client must build")
}

#[tokio::test]
#[ignore = "requires hosted content store"]
async fn rest_smoke_flow() {
    let client = ContentClient::new(store_from_env());

    let first = client
        .try_list_posts(1, 6, CategoryFilter::Any, None)
        .await
        .expect("list_posts must succeed");
    assert!(first.items.len() <= 6);
    assert!(first.items.iter().all(|post| post.is_published()));

    let pages = total_pages(first.total, 6);
    assert_eq!(compute_page_window(1, pages).is_empty(), pages == 0);

    let categories = client
        .try_list_categories_with_counts()
        .await
        .expect("categories must load");
    let counted: u64 = categories.iter().map(|category| category.count).sum();
    assert!(counted <= first.total);

    if let Some(post) = first.items.first() {
        let fetched = client
            .try_get_post_by_slug(&post.slug)
            .await
            .expect("get_post_by_slug must succeed")
            .expect("listed post must be found by slug");
        assert_eq!(fetched.id, post.id);
    }

    let missing = client
        .get_post_by_slug("this-slug-should-not-exist-anywhere")
        .await;
    assert!(missing.is_none());
}
