mod support;

use std::sync::Arc;

use yatube::{
    application::{
        groups::{CreateGroupCommand, GroupError, GroupService},
        repos::{GroupsRepo, PostsRepo},
    },
    domain::{entities::DEFAULT_GROUP_TITLE, forms::GROUP_TITLE_MAX},
};

use support::MemoryStore;

fn service(store: &Arc<MemoryStore>) -> GroupService {
    GroupService::new(store.clone())
}

fn titled(title: &str) -> CreateGroupCommand {
    CreateGroupCommand {
        title: Some(title.to_string()),
        ..CreateGroupCommand::default()
    }
}

#[tokio::test]
async fn blank_title_falls_back_to_default() {
    let store = MemoryStore::new();

    let group = service(&store)
        .create(titled("   "))
        .await
        .expect("group created");

    assert_eq!(group.title, DEFAULT_GROUP_TITLE);
    assert_eq!(group.slug, "untitled-group");
}

#[tokio::test]
async fn derived_slugs_get_numeric_suffixes() {
    let store = MemoryStore::new();
    let groups = service(&store);

    let mut slugs = Vec::new();
    for _ in 0..3 {
        slugs.push(groups.create(titled("Cats")).await.expect("group").slug);
    }

    assert_eq!(slugs, ["cats", "cats-2", "cats-3"]);
}

#[tokio::test]
async fn explicit_duplicate_slug_is_taken() {
    let store = MemoryStore::new();
    store.insert_group("Cats", "cats");

    let result = service(&store)
        .create(CreateGroupCommand {
            title: Some("More cats".to_string()),
            slug: Some("cats".to_string()),
            description: String::new(),
        })
        .await;

    assert!(matches!(result, Err(GroupError::SlugTaken(slug)) if slug == "cats"));
    assert_eq!(store.list_groups().await.expect("list").len(), 1);
}

#[tokio::test]
async fn explicit_slug_must_be_url_safe() {
    let store = MemoryStore::new();

    let result = service(&store)
        .create(CreateGroupCommand {
            title: Some("Cats".to_string()),
            slug: Some("cats and dogs".to_string()),
            description: String::new(),
        })
        .await;

    assert!(matches!(result, Err(GroupError::Invalid { field: "slug", .. })));
    assert!(store.list_groups().await.expect("list").is_empty());
}

#[tokio::test]
async fn overlong_title_is_rejected() {
    let store = MemoryStore::new();

    let result = service(&store)
        .create(titled(&"t".repeat(GROUP_TITLE_MAX + 1)))
        .await;

    assert!(matches!(result, Err(GroupError::Invalid { field: "title", .. })));
}

#[tokio::test]
async fn deleting_unknown_group_is_not_found() {
    let store = MemoryStore::new();

    let result = service(&store).delete("nope").await;

    assert!(matches!(result, Err(GroupError::NotFound(slug)) if slug == "nope"));
}

#[tokio::test]
async fn deleting_a_group_keeps_its_posts() {
    let store = MemoryStore::new();
    let author = store.insert_user("leo");
    let group = store.insert_group("Cats", "cats");
    let post = store.insert_post(&author, "still here", Some(&group));

    service(&store).delete("cats").await.expect("deleted");

    let remaining = store.find_post(post.id).await.expect("lookup").expect("post kept");
    assert_eq!(remaining.post.group_id, None);
    assert!(remaining.group.is_none());
}
