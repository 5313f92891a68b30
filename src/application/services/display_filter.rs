use chrono::Duration;

use crate::domain::Message;

const DUPLICATE_WINDOW_MS: i64 = 1000;

/// Drops entries that repeat any earlier entry's role and content within one
/// second of it, whether or not that earlier entry is shown. Render-time only:
/// the slice is never modified.
pub fn dedupe_for_display(messages: &[Message]) -> Vec<Message> {
    let window = Duration::milliseconds(DUPLICATE_WINDOW_MS);
    let mut kept: Vec<Message> = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        let is_duplicate = messages[..index].iter().any(|earlier| {
            let delta = message.created_at - earlier.created_at;
            earlier.role == message.role
                && earlier.content == message.content
                && delta <= window
                && delta >= -window
        });

        if is_duplicate {
            tracing::debug!(message_id = %message.id, "Filtering duplicate message from view");
        } else {
            kept.push(message.clone());
        }
    }

    kept
}
