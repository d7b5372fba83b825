use chrono::{Duration, Utc};
use kit::Engine;
use openalt::actions::CreateToolAction;
use openalt::events::Event;
use openalt::models::{NewTool, ToolStatus};
use openalt::repositories::ToolStore;
use openalt::testing;
use openalt::workflows::{self, PublishTools};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn engine(harness: &testing::Harness) -> Engine {
    Engine::new(Arc::new(workflows::registry(&harness.build())))
}

#[tokio::test]
async fn foo_is_published_posted_and_mailed() {
    let harness = testing::deps();
    let foo = CreateToolAction::new(harness.build())
        .execute(&NewTool {
            name: "Foo".to_string(),
            website_url: "https://foo.test".to_string(),
            repository_url: "https://github.com/foo/foo".to_string(),
            submitter_email: Some("a@b.com".to_string()),
            published_at: Some(Utc::now()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(harness.events.sent(), vec![Event::ToolScheduled { slug: "foo".into() }]);

    let report = engine(&harness)
        .run_inline(PublishTools::NAME, json!({}))
        .await
        .unwrap();

    assert!(report.succeeded());
    let stored = harness.store.find_or_fail(foo.id).await.unwrap();
    assert_eq!(stored.status, ToolStatus::Published);
    assert_eq!(harness.social.attempts(), 1);
    assert_eq!(harness.mailer.recipients(), vec!["a@b.com".to_string()]);
    assert_eq!(
        harness.mailer.sent()[0].subject,
        "Foo has been published on FOSS Alternative 🎉"
    );
}

#[tokio::test]
async fn every_due_tool_is_invalidated_once() {
    let harness = testing::deps();
    let due = Utc::now() - Duration::minutes(1);
    for slug in ["alpha", "beta"] {
        harness
            .seed_tool(slug, None, ToolStatus::Scheduled, Some(due))
            .await;
    }

    engine(&harness)
        .run_inline(PublishTools::NAME, json!({}))
        .await
        .unwrap();

    assert_eq!(harness.cache.count("tool-alpha"), 1);
    assert_eq!(harness.cache.count("tool-beta"), 1);
    assert_eq!(harness.cache.count("tools"), 2);
    for slug in ["alpha", "beta"] {
        let tool = harness.store.find_by_slug_or_fail(slug).await.unwrap();
        assert_eq!(tool.status, ToolStatus::Published);
    }
}

#[tokio::test]
async fn rejected_social_post_is_never_repeated() {
    let harness = testing::deps();
    harness.social.set_rejecting(true);
    // a failing email forces the sweep through all of its attempts
    harness.mailer.fail_for("a@b.com");
    let foo = harness
        .seed_tool("foo", Some("a@b.com"), ToolStatus::Scheduled, Some(Utc::now()))
        .await;

    let report = engine(&harness)
        .run_inline(PublishTools::NAME, json!({}))
        .await
        .unwrap();

    assert_eq!(report.attempts, 3);
    assert_eq!(
        harness.store.find_or_fail(foo.id).await.unwrap().status,
        ToolStatus::Published
    );
    assert_eq!(harness.store.updates_for(foo.id).len(), 1);
    assert_eq!(harness.social.attempts(), 1);
    assert_eq!(harness.mailer.attempts(), 3);
}

#[tokio::test]
async fn social_failure_does_not_block_the_email() {
    let harness = testing::deps();
    harness.social.set_rejecting(true);
    harness
        .seed_tool("foo", Some("a@b.com"), ToolStatus::Scheduled, Some(Utc::now()))
        .await;

    let report = engine(&harness)
        .run_inline(PublishTools::NAME, json!({}))
        .await
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.attempts, 1);
    assert_eq!(report.caught[0].label, "post-on-socials-foo");
    assert_eq!(harness.mailer.recipients(), vec!["a@b.com".to_string()]);
}
