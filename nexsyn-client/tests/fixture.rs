use std::path::PathBuf;

use nexsyn_client::{CategoryFilter, CategorySlug, ContentClient, MemoryContentStore};

fn demo_client() -> ContentClient<MemoryContentStore> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../demos/posts.json");
    let store = MemoryContentStore::from_file(&path).expect("demo fixture must load");
    ContentClient::new(store)
}

#[tokio::test]
async fn demo_fixture_lists_published_posts_newest_first() {
    let client = demo_client();

    let page = client
        .try_list_posts(1, 6, CategoryFilter::Any, None)
        .await
        .expect("list must succeed");

    assert_eq!(page.total, 7);
    let slugs: Vec<&str> = page.items.iter().map(|post| post.slug.as_str()).collect();
    assert_eq!(slugs[0], "staff-scheduling");
    assert!(!slugs.contains(&"upcoming-pos-integrations"));
}

#[tokio::test]
async fn demo_fixture_categories_merge_label_variants() {
    let client = demo_client();

    let categories = client
        .try_list_categories_with_counts()
        .await
        .expect("categories must load");

    let summary: Vec<(&str, &str, u64)> = categories
        .iter()
        .map(|c| (c.slug.as_str(), c.display_name.as_str(), c.count))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("cafe-operations", "Cafe Operations", 2),
            ("foodservice", "Foodservice", 3),
            ("menu-design", "Menu Design", 2),
        ]
    );

    let slug = CategorySlug::parse("foodservice").expect("canonical slug");
    let filter = client.resolve_category(&slug).await.expect("resolve");
    let page = client
        .try_list_posts(1, 6, filter, None)
        .await
        .expect("list must succeed");
    assert_eq!(page.total, 3);
}
