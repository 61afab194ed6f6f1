use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::{MAX_HISTORY_LENGTH, MIN_HISTORY_LENGTH};
use crate::model::{Category, ClassifiedEvent};

/// What the history keeps of a forwarded notification.  Title and content
/// are never retained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentEvent {
    #[serde(rename = "appName")]
    pub app_name: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub timestamp: i64,
}

impl From<&ClassifiedEvent> for RecentEvent {
    fn from(event: &ClassifiedEvent) -> Self {
        Self {
            app_name: event.display_name.clone(),
            category: event.category,
            timestamp: event.posted_at_millis,
        }
    }
}

/// Bounded list of the most recently forwarded notifications.
///
/// Holds at most `capacity` events (clamped to
/// [`MIN_HISTORY_LENGTH`]–[`MAX_HISTORY_LENGTH`]).  When full, the oldest event
/// is evicted to make room for the newest.
pub struct RecentEvents {
    events: VecDeque<RecentEvent>,
    capacity: usize,
}

impl RecentEvents {
    pub fn new(capacity: u32) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: Self::clamp_capacity(capacity),
        }
    }

    /// Pushes a new event, evicting the oldest if at capacity.
    pub fn push(&mut self, event: &ClassifiedEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(RecentEvent::from(event));
    }

    /// Newest first, the order a notification feed is read in.
    pub fn newest_first(&self) -> Vec<RecentEvent> {
        self.events.iter().rev().cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Changes the capacity; the oldest events go if the history no longer fits.
    pub fn resize(&mut self, capacity: u32) {
        self.capacity = Self::clamp_capacity(capacity);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    fn clamp_capacity(capacity: u32) -> usize {
        capacity.clamp(MIN_HISTORY_LENGTH, MAX_HISTORY_LENGTH) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(index: i64) -> ClassifiedEvent {
        ClassifiedEvent {
            package_name: "com.example.app".to_string(),
            display_name: "App".to_string(),
            category: Category::Other,
            title: String::new(),
            content: format!("notification {index}"),
            posted_at_millis: index,
        }
    }

    fn timestamps(history: &RecentEvents) -> Vec<i64> {
        history.newest_first().iter().map(|e| e.timestamp).collect()
    }

    #[test]
    fn new_clamps_below_min() {
        let mut history = RecentEvents::new(0);
        for i in 0..MIN_HISTORY_LENGTH as i64 + 1 {
            history.push(&make_event(i));
        }
        assert_eq!(history.len(), MIN_HISTORY_LENGTH as usize);
    }

    #[test]
    fn new_clamps_above_max() {
        let mut history = RecentEvents::new(u32::MAX);
        for i in 0..MAX_HISTORY_LENGTH as i64 + 1 {
            history.push(&make_event(i));
        }
        assert_eq!(history.len(), MAX_HISTORY_LENGTH as usize);
    }

    #[test]
    fn push_evicts_oldest() {
        let mut history = RecentEvents::new(5);
        for i in 0..8 {
            history.push(&make_event(i));
        }
        assert_eq!(timestamps(&history), vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn empty_history() {
        let history = RecentEvents::new(20);
        assert!(history.is_empty());
        assert!(history.newest_first().is_empty());
    }

    #[test]
    fn resize_smaller_keeps_newest() {
        let mut history = RecentEvents::new(10);
        for i in 0..10 {
            history.push(&make_event(i));
        }
        history.resize(6);
        assert_eq!(timestamps(&history), vec![9, 8, 7, 6, 5, 4]);
    }

    #[test]
    fn resize_larger_keeps_everything() {
        let mut history = RecentEvents::new(5);
        for i in 0..5 {
            history.push(&make_event(i));
        }
        history.resize(50);
        history.push(&make_event(5));
        assert_eq!(history.len(), 6);
    }

    #[test]
    fn keeps_metadata_only() {
        let mut history = RecentEvents::new(5);
        let mut event = make_event(3);
        event.title = "Bank".to_string();
        event.content = "Your OTP is 482910".to_string();
        history.push(&event);

        let recent = history.newest_first();
        assert_eq!(
            recent,
            vec![RecentEvent {
                app_name: "App".to_string(),
                category: Category::Other,
                timestamp: 3,
            }]
        );
        let json = serde_json::to_string(&recent[0]).unwrap();
        assert_eq!(json, r#"{"appName":"App","type":"Other","timestamp":3}"#);
    }
}
