/// Capture-source adapter.
///
/// The platform notification hook is outside this daemon; it hands us one
/// JSON object per posted notification, one per line:
///
/// ```text
/// {"packageName":"com.whatsapp","title":"Mom","text":"Call me","postedAtMillis":1700000000000}
/// ```
///
/// Each line is parsed, normalized, classified and delivered to the
/// [`EventBridge`] on a dedicated OS thread, so a slow listener never holds up
/// reading.  Bad lines are logged and skipped.
use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bridge::{Delivery, EventBridge};
use crate::classify::classify;
use crate::error::PipelineError;
use crate::event::DaemonEvent;
use crate::model::RawNotificationEvent;
use crate::normalize::normalize;

const PREVIEW_CHARS: usize = 100;

/// Per-run counts of what happened to the lines read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    pub lines: u64,
    pub malformed: u64,
    /// Parsed but too short to classify.
    pub skipped: u64,
    /// Handed to the bridge (whatever it did with them).
    pub forwarded: u64,
}

/// Parses one capture line into a raw notification.
pub fn parse_line(line: &str) -> Result<RawNotificationEvent, PipelineError> {
    let raw: RawNotificationEvent =
        serde_json::from_str(line).map_err(|e| PipelineError::malformed(e.to_string()))?;
    if raw.package_name.trim().is_empty() {
        return Err(PipelineError::malformed("packageName is empty"));
    }
    Ok(raw)
}

/// Runs one raw notification through normalize → classify → deliver.
///
/// Returns `None` when the notification was too short to forward.
pub fn process(raw: &RawNotificationEvent, bridge: &EventBridge) -> Option<Delivery> {
    let Some(normalized) = normalize(raw) else {
        debug!(package = %raw.package_name, "Notification without enough text; skipped");
        return None;
    };
    let classified = classify(&normalized);
    debug!(
        app = %classified.display_name,
        category = %classified.category,
        content = %preview(&classified.content),
        "Notification classified"
    );
    Some(bridge.deliver(classified))
}

/// Decodes one raw capture line, without its terminator.
fn decode_line(bytes: &[u8]) -> Result<&str, PipelineError> {
    std::str::from_utf8(bytes)
        .map(str::trim)
        .map_err(|e| PipelineError::malformed(format!("line is not valid UTF-8: {e}")))
}

/// Reads capture lines until end of input.
///
/// Only I/O failures end the read; undecodable or unparsable lines are
/// counted as malformed and skipped.
pub fn read_events<R: BufRead>(mut reader: R, bridge: &EventBridge) -> Result<CaptureSummary> {
    let mut summary = CaptureSummary::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .context("Failed to read from capture source")?;
        if read == 0 {
            break;
        }

        let raw = match decode_line(&buf) {
            Ok("") => continue,
            Ok(line) => {
                summary.lines += 1;
                parse_line(line)
            }
            Err(e) => {
                summary.lines += 1;
                Err(e)
            }
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                summary.malformed += 1;
                warn!("{e}");
                continue;
            }
        };
        match process(&raw, bridge) {
            Some(_) => summary.forwarded += 1,
            None => summary.skipped += 1,
        }
    }
    Ok(summary)
}

/// Reads `reader` on a named thread and sends [`DaemonEvent::CaptureClosed`]
/// when it is exhausted or fails.
pub fn spawn<R>(
    reader: R,
    bridge: Arc<EventBridge>,
    tx: mpsc::Sender<DaemonEvent>,
) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("capture-reader".into())
        .spawn(move || {
            match read_events(reader, &bridge) {
                Ok(summary) => info!(
                    lines = summary.lines,
                    forwarded = summary.forwarded,
                    skipped = summary.skipped,
                    malformed = summary.malformed,
                    "Capture source closed"
                ),
                Err(e) => error!("Capture source failed: {e:#}"),
            }
            let _ = tx.blocking_send(DaemonEvent::CaptureClosed);
        })
}

fn preview(content: &str) -> &str {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => &content[..end],
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::tests::RecordingListener;
    use crate::bridge::EventListener;
    use crate::model::Category;
    use crate::permission::tests::{denied_gate, granted_gate};
    use std::io::Cursor;

    fn listening_bridge() -> (Arc<EventBridge>, Arc<RecordingListener>) {
        let bridge = Arc::new(EventBridge::new(granted_gate(), 64));
        let listener = Arc::new(RecordingListener::default());
        let handle: Arc<dyn EventListener> = listener.clone();
        bridge.start(handle).unwrap();
        (bridge, listener)
    }

    // ── parse_line ────────────────────────────────────────────────────────────

    #[test]
    fn parse_line_reads_all_fields() {
        let raw = parse_line(
            r#"{"packageName":"com.whatsapp","title":"Mom","text":"Call me","subText":"2 new","bigText":"Call me back","postedAtMillis":77}"#,
        )
        .unwrap();
        assert_eq!(raw.package_name, "com.whatsapp");
        assert_eq!(raw.title, "Mom");
        assert_eq!(raw.text, "Call me");
        assert_eq!(raw.sub_text, "2 new");
        assert_eq!(raw.big_text, "Call me back");
        assert_eq!(raw.posted_at_millis, 77);
    }

    #[test]
    fn parse_line_rejects_invalid_json() {
        let err = parse_line("{not json").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedEvent { .. }));
    }

    #[test]
    fn parse_line_requires_package_name() {
        assert!(parse_line(r#"{"title":"Hello","text":"no package here"}"#).is_err());
        assert!(parse_line(r#"{"packageName":"  ","text":"blank package"}"#).is_err());
    }

    #[test]
    fn parse_line_rejects_wrong_field_types() {
        assert!(parse_line(r#"{"packageName":"com.a","postedAtMillis":"yesterday"}"#).is_err());
    }

    // ── process ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn sms_with_otp_end_to_end() {
        let (bridge, listener) = listening_bridge();
        let raw = RawNotificationEvent {
            package_name: "com.google.android.apps.messaging".to_string(),
            title: "John".to_string(),
            text: "Your OTP is 482910, do not share".to_string(),
            sub_text: String::new(),
            big_text: String::new(),
            posted_at_millis: 1000,
        };

        assert_eq!(process(&raw, &bridge), Some(Delivery::Queued));
        bridge.stop().await;

        let events = listener.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.category, Category::Sms);
        assert_eq!(event.display_name, "Messages");
        assert_eq!(event.content, "John Your OTP is 482910, do not share");
        assert!(event.content.chars().count() >= 10);
        assert_eq!(event.posted_at_millis, 1000);
    }

    #[tokio::test]
    async fn short_notification_is_not_delivered() {
        let (bridge, listener) = listening_bridge();
        let raw = parse_line(r#"{"packageName":"com.whatsapp","title":"Hi","text":"ok"}"#).unwrap();
        assert_eq!(process(&raw, &bridge), None);
        bridge.stop().await;
        assert!(listener.contents().is_empty());
    }

    #[tokio::test]
    async fn process_while_stopped_is_ignored() {
        let bridge = EventBridge::new(denied_gate(), 8);
        let raw = parse_line(r#"{"packageName":"com.whatsapp","text":"long enough message"}"#)
            .unwrap();
        assert_eq!(process(&raw, &bridge), Some(Delivery::Ignored));
    }

    // ── read_events ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn read_events_skips_bad_lines_and_keeps_order() {
        let (bridge, listener) = listening_bridge();
        let input = [
            r#"{"packageName":"com.whatsapp","text":"first real message"}"#,
            "",
            "garbage",
            r#"{"packageName":"com.whatsapp","text":"tiny"}"#,
            r#"{"packageName":"com.sbi.bank.app","text":"Your OTP code is 1234"}"#,
        ]
        .join("\n");

        let summary = read_events(Cursor::new(input), &bridge).unwrap();
        bridge.stop().await;

        assert_eq!(
            summary,
            CaptureSummary {
                lines: 4,
                malformed: 1,
                skipped: 1,
                forwarded: 2,
            }
        );
        let events = listener.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].category, Category::WhatsApp);
        assert_eq!(events[1].category, Category::Banking);
    }

    #[tokio::test]
    async fn non_utf8_line_is_skipped_and_reading_continues() {
        let (bridge, listener) = listening_bridge();
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"packageName":"com.whatsapp","text":"first real message"}"#);
        input.extend_from_slice(b"\n{\"packageName\":\"com.x\",\"text\":\"\xff\xfe broken\"}\n");
        input.extend_from_slice(br#"{"packageName":"com.whatsapp","text":"second real message"}"#);

        let summary = read_events(Cursor::new(input), &bridge).unwrap();
        bridge.stop().await;

        assert_eq!(summary.lines, 3);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.forwarded, 2);
        assert_eq!(
            listener.contents(),
            vec!["first real message", "second real message"]
        );
    }

    #[test]
    fn decode_line_rejects_invalid_utf8() {
        let err = decode_line(b"\xff\xfe").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedEvent { .. }));
        assert_eq!(decode_line(b"  {}\r\n").unwrap(), "{}");
    }

    #[tokio::test]
    async fn duplicate_posts_pass_through() {
        let (bridge, listener) = listening_bridge();
        let line = r#"{"packageName":"com.whatsapp","text":"same message twice","postedAtMillis":5}"#;
        let input = format!("{line}\n{line}\n");
        read_events(Cursor::new(input), &bridge).unwrap();
        bridge.stop().await;
        assert_eq!(listener.contents().len(), 2);
    }

    #[tokio::test]
    async fn spawn_reports_capture_closed() {
        let (bridge, listener) = listening_bridge();
        let (tx, mut rx) = mpsc::channel(4);
        let input = r#"{"packageName":"org.telegram.messenger","text":"channel update posted"}"#;

        let handle = spawn(Cursor::new(input.to_string()), Arc::clone(&bridge), tx).unwrap();
        assert!(matches!(rx.recv().await, Some(DaemonEvent::CaptureClosed)));
        handle.join().unwrap();
        bridge.stop().await;
        assert_eq!(listener.contents(), vec!["channel update posted"]);
    }

    // ── preview ───────────────────────────────────────────────────────────────

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }
}
