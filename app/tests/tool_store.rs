use chrono::{Duration, Utc};
use kit::TestDatabase;
use openalt::migrations::Migrator;
use openalt::models::{NewTool, TermKind, ToolPatch, ToolStatus};
use openalt::repositories::{SeaOrmToolStore, ToolFilter, ToolStore};
use pretty_assertions::assert_eq;

async fn store() -> (TestDatabase, SeaOrmToolStore) {
    let db = TestDatabase::fresh::<Migrator>().await.unwrap();
    let store = SeaOrmToolStore::new(db.conn().clone());
    (db, store)
}

fn new_tool(name: &str) -> NewTool {
    NewTool {
        name: name.to_string(),
        website_url: "https://example.test".to_string(),
        repository_url: "https://github.com/example/example".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_derives_slug_and_rejects_duplicates() {
    let (_db, store) = store().await;

    let tool = store.create(&new_tool("Plane Tracker")).await.unwrap();
    assert_eq!(tool.slug, "plane-tracker");
    assert_eq!(tool.status, ToolStatus::Draft);

    let duplicate = store.create(&new_tool("Plane  Tracker")).await.unwrap_err();
    assert_eq!(duplicate.status_code(), 422);

    let found = store.find_by_slug("plane-tracker").await.unwrap().unwrap();
    assert_eq!(found.id, tool.id);
}

#[tokio::test]
async fn update_merges_only_patched_fields() {
    let (_db, store) = store().await;
    let tool = store.create(&new_tool("Foo")).await.unwrap();

    store.update(tool.id, &ToolPatch::favicon("https://cdn.test/f.png")).await.unwrap();
    let updated = store
        .update(tool.id, &ToolPatch::screenshot("https://cdn.test/s.png"))
        .await
        .unwrap();

    assert_eq!(updated.favicon_url.as_deref(), Some("https://cdn.test/f.png"));
    assert_eq!(updated.screenshot_url.as_deref(), Some("https://cdn.test/s.png"));
    assert_eq!(updated.name, "Foo");
}

#[tokio::test]
async fn status_only_moves_forward() {
    let (_db, store) = store().await;
    let tool = store.create(&new_tool("Foo")).await.unwrap();

    let no_date = store
        .update(tool.id, &ToolPatch::status(ToolStatus::Published))
        .await
        .unwrap_err();
    assert_eq!(no_date.status_code(), 422);

    store.update(tool.id, &ToolPatch::schedule(Utc::now())).await.unwrap();
    store
        .update(tool.id, &ToolPatch::status(ToolStatus::Published))
        .await
        .unwrap();

    let backwards = store
        .update(tool.id, &ToolPatch::status(ToolStatus::Scheduled))
        .await
        .unwrap_err();
    assert_eq!(backwards.status_code(), 422);
    assert_eq!(
        store.find_or_fail(tool.id).await.unwrap().status,
        ToolStatus::Published
    );
}

#[tokio::test]
async fn due_filter_selects_elapsed_scheduled_tools() {
    let (_db, store) = store().await;
    let now = Utc::now();

    let mut past = new_tool("Past");
    past.published_at = Some(now - Duration::hours(2));
    let mut future = new_tool("Future");
    future.published_at = Some(now + Duration::hours(2));
    store.create(&past).await.unwrap();
    store.create(&future).await.unwrap();
    store.create(&new_tool("Draft")).await.unwrap();

    let due = store
        .find_many(&ToolFilter::due_for_publication(now))
        .await
        .unwrap();
    let slugs: Vec<&str> = due.iter().map(|t| t.slug.as_str()).collect();
    assert_eq!(slugs, vec!["past"]);

    let listed = store.find_many(&ToolFilter::listed()).await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn terms_resolve_by_name_or_slug_and_replace() {
    let (_db, store) = store().await;
    let tool = store.create(&new_tool("Foo")).await.unwrap();

    let first = store
        .resolve_terms(
            TermKind::Category,
            &["Developer Tools".to_string(), "Analytics".to_string()],
        )
        .await
        .unwrap();
    let again = store
        .resolve_terms(TermKind::Category, &["developer-tools".to_string()])
        .await
        .unwrap();
    assert_eq!(again[0].id, first[0].id);

    store
        .replace_categories(tool.id, &[first[0].id, first[1].id])
        .await
        .unwrap();
    store.replace_categories(tool.id, &[first[1].id]).await.unwrap();

    let linked = store.terms(TermKind::Category, tool.id).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].name, "Analytics");
    assert!(store.terms(TermKind::Alternative, tool.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_tools_and_links() {
    let (_db, store) = store().await;
    let tool = store.create(&new_tool("Foo")).await.unwrap();
    let stacks = store
        .resolve_terms(TermKind::Stack, &["Rust".to_string()])
        .await
        .unwrap();
    store.replace_stacks(tool.id, &[stacks[0].id]).await.unwrap();

    let deleted = store.delete_many(&[tool.id]).await.unwrap();

    assert_eq!(deleted.len(), 1);
    assert!(store.find_by_id(tool.id).await.unwrap().is_none());
    assert!(store.terms(TermKind::Stack, tool.id).await.unwrap().is_empty());
}
