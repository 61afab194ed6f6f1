use serde::{Deserialize, Serialize};

/// A notification exactly as the capture source reported it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawNotificationEvent {
    /// Identifier of the posting application (e.g. "com.whatsapp").
    pub package_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sub_text: String,
    #[serde(default)]
    pub big_text: String,
    /// Post time in milliseconds since the Unix epoch.
    #[serde(default = "now_millis")]
    pub posted_at_millis: i64,
}

/// A raw notification whose text fields were merged into one content string.
///
/// Only constructed by [`crate::normalize::normalize`], which guarantees
/// `content` holds at least [`crate::normalize::MIN_CONTENT_CHARS`] characters.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub package_name: String,
    pub title: String,
    pub content: String,
    pub posted_at_millis: i64,
}

/// Coarse source category of a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[serde(rename = "SMS")]
    Sms,
    WhatsApp,
    Telegram,
    Email,
    Banking,
    #[serde(rename = "OTP")]
    Otp,
    SocialMedia,
    Other,
}

impl Category {
    /// Wire name, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Sms => "SMS",
            Category::WhatsApp => "WhatsApp",
            Category::Telegram => "Telegram",
            Category::Email => "Email",
            Category::Banking => "Banking",
            Category::Otp => "OTP",
            Category::SocialMedia => "SocialMedia",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit handed to the registered listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEvent {
    pub package_name: String,
    /// Human-readable name of the source app.
    #[serde(rename = "appName")]
    pub display_name: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub title: String,
    pub content: String,
    #[serde(rename = "timestamp")]
    pub posted_at_millis: i64,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_event_optional_text_fields_default_to_empty() {
        let raw: RawNotificationEvent =
            serde_json::from_str(r#"{"packageName":"com.whatsapp","postedAtMillis":5}"#).unwrap();
        assert_eq!(raw.package_name, "com.whatsapp");
        assert!(raw.title.is_empty());
        assert!(raw.sub_text.is_empty());
        assert!(raw.big_text.is_empty());
        assert_eq!(raw.posted_at_millis, 5);
    }

    #[test]
    fn raw_event_missing_timestamp_uses_wall_clock() {
        let before = chrono::Utc::now().timestamp_millis();
        let raw: RawNotificationEvent =
            serde_json::from_str(r#"{"packageName":"com.whatsapp"}"#).unwrap();
        assert!(raw.posted_at_millis >= before);
    }

    #[test]
    fn category_serializes_to_wire_names() {
        let all = [
            Category::Sms,
            Category::WhatsApp,
            Category::Telegram,
            Category::Email,
            Category::Banking,
            Category::Otp,
            Category::SocialMedia,
            Category::Other,
        ];
        for category in all {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn classified_event_uses_listener_wire_keys() {
        let event = ClassifiedEvent {
            package_name: "com.whatsapp".to_string(),
            display_name: "WhatsApp".to_string(),
            category: Category::WhatsApp,
            title: "Mom".to_string(),
            content: "Mom call me when you land".to_string(),
            posted_at_millis: 1000,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["packageName"], "com.whatsapp");
        assert_eq!(value["appName"], "WhatsApp");
        assert_eq!(value["type"], "WhatsApp");
        assert_eq!(value["title"], "Mom");
        assert_eq!(value["timestamp"], 1000);
    }
}
