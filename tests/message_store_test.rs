use ringo_chat::application::services::{MessageStore, StoreEvent};
use ringo_chat::domain::{Conversation, ConversationId, GUEST_USER_ID, Message, MessageContent};

fn store_with(titles: &[&str]) -> (MessageStore, Vec<ConversationId>) {
    let mut store = MessageStore::new();
    let ids = titles
        .iter()
        .map(|title| {
            let conversation = Conversation::new(GUEST_USER_ID, Some(title.to_string()));
            let id = conversation.id;
            store.add_conversation(conversation);
            id
        })
        .collect();
    (store, ids)
}

#[test]
fn given_same_message_twice_when_adding_then_it_is_stored_once() {
    let (mut store, ids) = store_with(&["Chat"]);
    let message = Message::user(ids[0], "hello");

    assert!(store.add_message(message.clone()));
    let revision = store.revision();
    assert!(!store.add_message(message));

    assert_eq!(store.messages(ids[0]).len(), 1);
    assert_eq!(store.revision(), revision);
}

#[test]
fn given_unknown_conversation_when_adding_message_then_store_is_unchanged() {
    let (mut store, ids) = store_with(&["Chat"]);

    let added = store.add_message(Message::user(ConversationId::new(), "lost"));

    assert!(!added);
    assert!(store.messages(ids[0]).is_empty());
}

#[test]
fn given_messages_when_adding_then_insertion_order_is_kept_and_updated_at_advances() {
    let (mut store, ids) = store_with(&["Chat"]);
    let created = store.conversation(ids[0]).unwrap().updated_at;
    let first = Message::user(ids[0], "one");
    let second = Message::assistant(ids[0], "two");
    let expected = vec![first.id, second.id];

    store.add_message(first);
    store.add_message(second);

    let order: Vec<_> = store.messages(ids[0]).iter().map(|m| m.id).collect();
    assert_eq!(order, expected);
    assert!(store.conversation(ids[0]).unwrap().updated_at >= created);
}

#[test]
fn given_message_when_removing_then_only_that_message_goes() {
    let (mut store, ids) = store_with(&["Chat"]);
    let keep = Message::user(ids[0], "keep");
    let drop = Message::assistant(ids[0], "drop");
    let drop_id = drop.id;
    store.add_message(keep);
    store.add_message(drop);

    let removed = store.remove_message(drop_id).unwrap();

    assert_eq!(removed.content, MessageContent::text("drop"));
    assert_eq!(store.messages(ids[0]).len(), 1);
    assert!(store.find_message(drop_id).is_none());
}

#[test]
fn given_term_when_searching_then_titles_and_message_text_match_case_insensitively() {
    let (mut store, ids) = store_with(&["Rust lifetimes", "Cooking", "Travel"]);
    store.add_message(Message::user(ids[1], "How long to boil an EGG?"));

    let titles = |found: Vec<&Conversation>| -> Vec<String> {
        found.iter().filter_map(|c| c.title.clone()).collect()
    };

    assert_eq!(titles(store.search("rust")), vec!["Rust lifetimes"]);
    assert_eq!(titles(store.search("egg")), vec!["Cooking"]);
    assert_eq!(store.search("").len(), 3);
    assert!(store.search("nothing here").is_empty());
}

#[test]
fn given_store_when_clearing_then_everything_is_removed_and_published() {
    let (mut store, ids) = store_with(&["a", "b"]);
    store.add_message(Message::user(ids[0], "x"));
    let mut events = store.subscribe();

    store.clear_all();

    assert!(store.conversations().is_empty());
    assert!(store.current_id().is_none());
    assert_eq!(events.try_recv().ok(), Some(StoreEvent::Cleared));
}

#[test]
fn given_error_when_set_and_cleared_then_both_changes_are_published() {
    let mut store = MessageStore::new();
    let mut events = store.subscribe();

    store.set_error(Some("boom".to_string()));
    store.clear_error();
    store.clear_error();

    assert_eq!(
        events.try_recv().ok(),
        Some(StoreEvent::ErrorChanged(Some("boom".to_string())))
    );
    assert_eq!(events.try_recv().ok(), Some(StoreEvent::ErrorChanged(None)));
    assert!(events.try_recv().is_err());
    assert!(store.error().is_none());
}
