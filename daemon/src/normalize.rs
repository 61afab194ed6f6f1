use crate::model::{NormalizedEvent, RawNotificationEvent};

/// Events whose merged content is shorter than this (in characters) are dropped.
pub const MIN_CONTENT_CHARS: usize = 10;

/// Merges title, text, sub-text and big-text into a single content string.
///
/// Returns `None` for near-empty notifications (fewer than
/// [`MIN_CONTENT_CHARS`] characters after trimming).
pub fn normalize(raw: &RawNotificationEvent) -> Option<NormalizedEvent> {
    let joined = [
        raw.title.as_str(),
        raw.text.as_str(),
        raw.sub_text.as_str(),
        raw.big_text.as_str(),
    ]
    .join(" ");
    let content = joined.trim();

    // Counted in Unicode scalar values, so an emoji is one character, not two.
    if content.chars().count() < MIN_CONTENT_CHARS {
        return None;
    }

    Some(NormalizedEvent {
        package_name: raw.package_name.clone(),
        title: raw.title.clone(),
        content: content.to_string(),
        posted_at_millis: raw.posted_at_millis,
    })
}
