use super::*;

fn sample_conversation() -> Conversation {
    let mut conv = Conversation::untitled();
    conv.push_message(ChatMessage::user("make sky blue", Some("https://x/img.png".into())));
    let image = GeneratedImage::new("https://cdn/1.png", "make sky blue", Some("fast-edit".into()));
    let image_id = image.id;
    conv.push_image(image);
    conv.push_message(ChatMessage::assistant("Here is your edited image.", Some(image_id)));
    conv
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let store = Store::in_memory().await.unwrap();
    let conv = sample_conversation();

    store.put(&conv).await.unwrap();
    let loaded = store.get(conv.id).await.unwrap().unwrap();

    assert_eq!(loaded, conv);
}

#[tokio::test]
async fn get_missing_returns_none() {
    let store = Store::in_memory().await.unwrap();
    assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn append_and_put_adds_exactly_one_message() {
    let store = Store::in_memory().await.unwrap();
    let mut conv = sample_conversation();
    store.put(&conv).await.unwrap();
    let before = store.get(conv.id).await.unwrap().unwrap();

    conv.push_message(ChatMessage::user("now add clouds", None));
    store.put(&conv).await.unwrap();
    let after = store.get(conv.id).await.unwrap().unwrap();

    assert_eq!(after.messages.len(), before.messages.len() + 1);
    assert_eq!(&after.messages[..before.messages.len()], &before.messages[..]);
    assert_eq!(after.messages.last().unwrap().content, "now add clouds");
}

#[tokio::test]
async fn error_flag_and_optional_fields_survive() {
    let store = Store::in_memory().await.unwrap();
    let mut conv = Conversation::new("errors");
    conv.push_message(ChatMessage::user("edit", Some("data:image/png;base64,AAAA".into())));
    conv.push_message(ChatMessage::assistant_error("Image generation failed: boom"));
    conv.push_image(GeneratedImage::new("https://cdn/x.png", "edit", None));
    store.put(&conv).await.unwrap();

    let loaded = store.get(conv.id).await.unwrap().unwrap();
    assert!(loaded.messages[1].is_error);
    assert_eq!(loaded.messages[0].source_image.as_deref(), Some("data:image/png;base64,AAAA"));
    assert_eq!(loaded.images[0].model, None);
}

#[tokio::test]
async fn put_rejects_invalid_conversation() {
    let store = Store::in_memory().await.unwrap();
    let mut conv = Conversation::untitled();
    conv.push_message(ChatMessage::assistant("orphan", Some(Uuid::new_v4())));

    let err = store.put(&conv).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
    assert!(store.get(conv.id).await.unwrap().is_none());
}

#[tokio::test]
async fn put_replaces_title_and_children() {
    let store = Store::in_memory().await.unwrap();
    let mut conv = sample_conversation();
    store.put(&conv).await.unwrap();

    conv.title = "Renamed".into();
    conv.messages.truncate(1);
    conv.images.clear();
    store.put(&conv).await.unwrap();

    let loaded = store.get(conv.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, "Renamed");
    assert_eq!(loaded.messages.len(), 1);
    assert!(loaded.images.is_empty());
}

#[tokio::test]
async fn list_orders_by_most_recent_update() {
    let store = Store::in_memory().await.unwrap();
    let mut older = Conversation::new("older");
    older.updated_at = 1_000;
    older.created_at = 1_000;
    let mut newer = Conversation::new("newer");
    newer.updated_at = 2_000;
    newer.created_at = 2_000;

    store.put(&older).await.unwrap();
    store.put(&newer).await.unwrap();

    let titles: Vec<String> = store.list().await.unwrap().into_iter().map(|c| c.title).collect();
    assert_eq!(titles, vec!["newer".to_string(), "older".to_string()]);
}

#[tokio::test]
async fn delete_removes_conversation_and_children() {
    let store = Store::in_memory().await.unwrap();
    let conv = sample_conversation();
    let other = sample_conversation();
    store.put(&conv).await.unwrap();
    store.put(&other).await.unwrap();

    assert!(store.delete(conv.id).await.unwrap());
    assert!(store.get(conv.id).await.unwrap().is_none());
    assert!(!store.delete(conv.id).await.unwrap());

    let remaining = store.list().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0], other);
}

#[tokio::test]
async fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DEFAULT_DB_FILE);
    let conv = sample_conversation();

    let store = Store::open(&path).await.unwrap();
    store.put(&conv).await.unwrap();
    store.close().await;

    let reopened = Store::open(&path).await.unwrap();
    assert_eq!(reopened.get(conv.id).await.unwrap(), Some(conv));
    reopened.close().await;
}

#[test]
fn unknown_role_row_is_corrupt() {
    let row: MessageRow = (Uuid::new_v4(), "system".into(), "hi".into(), None, None, false, 0);
    let err = message_from_row(row).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
    assert!(err.to_string().contains("unknown role \"system\""));
}
