mod common;

use std::sync::Arc;

use common::{FlakyStore, Hub, session};
use devhub_types::ErrorKind;
use devhub_types::path::paths;
use devhub_views::channel::CHANNEL_NOT_FOUND;
use devhub_views::{
    ChannelDirectory, ChannelView, NewProject, ProjectCatalog, RelationshipController, ToggleOutcome,
};
use serde_json::json;

async fn seed_channel(hub: &Hub, owner: &str, handle: &str) {
    ChannelDirectory::new(hub.store_as(owner))
        .create_channel(&session(owner), "Acme Labs", handle, "tools", "")
        .await
        .unwrap();
}

async fn seed_project(hub: &Hub, owner: &str, title: &str, private: bool) {
    ProjectCatalog::new(hub.store_as(owner), session(owner))
        .publish(NewProject {
            title: title.to_string(),
            programming_languages: vec!["Rust".into()],
            private,
            ..Default::default()
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn handle_lookup_ignores_case_and_at_sign() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "Acme").await;

    let directory = ChannelDirectory::new(hub.anonymous());
    let plain = directory.resolve("acme").await.unwrap().unwrap();
    let at = directory.resolve("@acme").await.unwrap().unwrap();
    let shouty = directory.resolve("@ACME").await.unwrap().unwrap();

    assert_eq!(plain, at);
    assert_eq!(plain, shouty);
    assert_eq!(plain.id, "b");
    assert_eq!(plain.handle, "acme");
}

#[tokio::test]
async fn taken_handle_is_refused() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let err = ChannelDirectory::new(hub.store_as("c"))
        .create_channel(&session("c"), "Other", "@Acme", "", "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn unknown_handle_shows_not_found_without_fetching_projects() {
    let hub = Hub::new();
    let store = Arc::new(FlakyStore::new(hub.anonymous()));
    let mut view = ChannelView::new(store.clone(), None);
    assert!(view.state().loading);

    assert!(view.load("acme").await);

    let state = view.state();
    assert!(!state.loading);
    let error = state.error.as_ref().unwrap();
    assert_eq!(error.message, CHANNEL_NOT_FOUND);
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert_eq!(store.touched_under("projects"), 0);
    assert_eq!(store.touched_under("channels/"), 0);
}

#[tokio::test]
async fn load_shows_public_projects_and_follower_count() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;
    seed_project(&hub, "b", "public one", false).await;
    seed_project(&hub, "b", "secret", true).await;
    seed_project(&hub, "c", "someone else's", false).await;

    let mut view = ChannelView::new(hub.anonymous(), None);
    view.load("@acme").await;

    let state = view.state();
    assert!(state.error.is_none());
    assert_eq!(state.channel.as_ref().unwrap().name, "Acme Labs");
    let titles: Vec<&str> = state.projects.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["public one"]);
    assert_eq!(state.follow.follower_count, 0);
    assert!(!view.can_follow());
}

#[tokio::test]
async fn following_increments_count_and_enables_messaging() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let mut view = ChannelView::new(hub.store_as("a"), Some(session("a")));
    view.load("acme").await;
    assert!(view.can_follow());
    assert!(!view.can_message());
    let before = view.state().follow.follower_count;

    let outcome = view.toggle_follow().await.unwrap();

    assert_eq!(outcome, ToggleOutcome::Applied(true));
    assert_eq!(view.state().follow.follower_count, before + 1);
    assert!(view.state().follow.is_following);
    assert!(view.can_message());

    // both halves of the edge exist
    assert!(hub.db.get_document(&paths::follower("b", "a").unwrap()).unwrap().is_some());
    assert!(hub.db.get_document(&paths::followed("a", "b").unwrap()).unwrap().is_some());

    // a fresh view sees the same thing
    let mut again = ChannelView::new(hub.store_as("a"), Some(session("a")));
    again.load("acme").await;
    assert!(again.state().follow.is_following);
    assert_eq!(again.state().follow.follower_count, before + 1);
}

#[tokio::test]
async fn toggling_twice_restores_original_state() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let mut view = ChannelView::new(hub.store_as("a"), Some(session("a")));
    view.load("acme").await;
    let original = view.state().follow.clone();

    view.toggle_follow().await.unwrap();
    view.toggle_follow().await.unwrap();

    assert_eq!(view.state().follow, original);
    assert!(hub.db.get_document(&paths::follower("b", "a").unwrap()).unwrap().is_none());
    assert!(hub.db.get_document(&paths::followed("a", "b").unwrap()).unwrap().is_none());
}

#[tokio::test]
async fn double_submit_is_ignored_while_pending() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let mut view = ChannelView::new(hub.store_as("a"), Some(session("a")));
    view.load("acme").await;

    let first = view.begin_toggle_follow().unwrap().unwrap();
    assert!(view.begin_toggle_follow().unwrap().is_none());
    assert_eq!(view.state().follow.follower_count, 1);

    let result = first.send().await;
    assert_eq!(view.finish_toggle_follow(first, result), ToggleOutcome::Applied(true));
    assert_eq!(view.state().follow.follower_count, 1);
    assert!(!view.state().follow.pending);
}

#[tokio::test]
async fn failed_follow_is_reverted_with_a_notice() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let store = Arc::new(FlakyStore::new(hub.store_as("a")));
    let mut view = ChannelView::new(store.clone(), Some(session("a")));
    view.load("acme").await;

    // second half of the edge fails; the flaky store is not transactional
    store.fail_under("channels/a/following");
    let outcome = view.toggle_follow().await.unwrap();

    assert_eq!(outcome, ToggleOutcome::Reverted);
    assert!(!view.state().follow.is_following);
    assert_eq!(view.state().follow.follower_count, 0);
    let notices = view.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.contains("follow"));
    assert!(view.take_notices().is_empty());

    // the first half landed; sweeping rolls it back
    let orphan = paths::follower("b", "a").unwrap();
    assert!(hub.db.get_document(&orphan).unwrap().is_some());
    let relations = RelationshipController::new(hub.store_as("a"));
    assert_eq!(relations.reconcile_edges("a", &["b".to_string()]).await.unwrap(), 1);
    assert!(hub.db.get_document(&orphan).unwrap().is_none());
    assert_eq!(relations.reconcile_edges("a", &["b".to_string()]).await.unwrap(), 0);
}

#[tokio::test]
async fn bare_sweep_finds_interrupted_follows() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;
    seed_channel(&hub, "c", "initech").await;

    // follow got as far as the follower record on b
    hub.db
        .put_document(&paths::follower("b", "a").unwrap(), &json!({ "timestamp": 1 }))
        .unwrap();

    let relations = RelationshipController::new(hub.store_as("a"));
    assert_eq!(relations.reconcile_edges("a", &[]).await.unwrap(), 1);
    assert_eq!(relations.follower_count("b").await.unwrap(), 0);
    assert_eq!(relations.reconcile_edges("a", &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn interrupted_unfollow_is_rolled_back() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;
    let relations = RelationshipController::new(hub.store_as("a"));
    relations.follow("a", "b").await.unwrap();

    // unfollow got as far as the follower record
    hub.db.delete_document(&paths::follower("b", "a").unwrap()).unwrap();
    assert_eq!(relations.follower_count("b").await.unwrap(), 0);

    assert_eq!(relations.reconcile_edges("a", &[]).await.unwrap(), 1);
    assert!(relations.is_following("a", "b").await.unwrap());
    assert_eq!(relations.follower_count("b").await.unwrap(), 1);
    assert_eq!(relations.following_count("a").await.unwrap(), 1);
}

#[tokio::test]
async fn nobody_writes_another_user_s_edges() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let err = RelationshipController::new(hub.store_as("c"))
        .follow("a", "b")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(hub.db.get_document(&paths::follower("b", "a").unwrap()).unwrap().is_none());
}

#[tokio::test]
async fn failed_membership_check_does_not_fail_the_load() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let store = Arc::new(FlakyStore::new(hub.store_as("a")));
    store.fail_under("channels/b/followers/a");
    let mut view = ChannelView::new(store, Some(session("a")));
    view.load("acme").await;

    assert!(view.state().error.is_none());
    assert!(!view.state().follow.is_following);
    assert!(view.state().channel.is_some());
}

#[tokio::test]
async fn failed_project_fetch_fails_the_load_and_clears_loading() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let store = Arc::new(FlakyStore::new(hub.anonymous()));
    store.fail_under("projects");
    let mut view = ChannelView::new(store, None);
    view.load("acme").await;

    let state = view.state();
    assert!(!state.loading);
    let error = state.error.as_ref().unwrap();
    assert_eq!(error.message, "Failed to load channel data");
    assert_eq!(error.kind, ErrorKind::BackendUnavailable);
    assert!(state.channel.is_none());
}

#[tokio::test]
async fn follow_requires_sign_in_and_someone_else_s_channel() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let mut anon = ChannelView::new(hub.anonymous(), None);
    anon.load("acme").await;
    let err = anon.toggle_follow().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthenticated);

    let mut own = ChannelView::new(hub.store_as("b"), Some(session("b")));
    own.load("acme").await;
    assert!(!own.can_follow());
    let err = own.toggle_follow().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
    assert_eq!(own.state().follow.follower_count, 0);
}

#[tokio::test]
async fn closed_view_ignores_load() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let mut view = ChannelView::new(hub.anonymous(), None);
    view.close();
    assert!(!view.load("acme").await);
    assert!(view.state().channel.is_none());
}

#[tokio::test]
async fn closing_mid_load_discards_results() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let store = Arc::new(FlakyStore::new(hub.anonymous()).holding_finds());
    let mut view = ChannelView::new(store, None);
    let token = view.cancellation_token();

    let (applied, _) = tokio::join!(view.load("acme"), async {
        tokio::task::yield_now().await;
        token.cancel();
    });

    assert!(!applied);
    assert!(view.state().channel.is_none());
    assert!(view.state().error.is_none());
}

#[tokio::test]
async fn closed_reload_keeps_the_previous_error() {
    let hub = Hub::new();
    seed_channel(&hub, "b", "acme").await;

    let store = Arc::new(FlakyStore::new(hub.anonymous()).holding_finds());
    store.fail_under("channels");
    let mut view = ChannelView::new(store.clone(), None);
    assert!(view.load("acme").await);
    let before = view.state().clone();
    assert!(!before.loading);
    assert_eq!(before.error.as_ref().unwrap().message, "Failed to load channel data");

    store.heal();
    let token = view.cancellation_token();
    let (applied, _) = tokio::join!(view.load("acme"), async {
        tokio::task::yield_now().await;
        token.cancel();
    });

    assert!(!applied);
    assert_eq!(view.state(), &before);
}
