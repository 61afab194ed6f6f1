use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};

use crate::bridge::EventListener;
use crate::history::RecentEvents;
use crate::model::ClassifiedEvent;
use crate::status::StatusFile;

/// The daemon's listener: prints each event as a JSON line for the downstream
/// analyser, keeps the recent-events history and refreshes the status file.
pub struct DaemonSink {
    out: Mutex<Box<dyn Write + Send>>,
    history: Mutex<RecentEvents>,
    status: Arc<StatusFile>,
}

impl DaemonSink {
    pub fn new(out: Box<dyn Write + Send>, history_length: u32, status: Arc<StatusFile>) -> Self {
        Self {
            out: Mutex::new(out),
            history: Mutex::new(RecentEvents::new(history_length)),
            status,
        }
    }

    pub fn resize_history(&self, history_length: u32) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resize(history_length);
    }
}

impl EventListener for DaemonSink {
    fn on_classified_event(&self, event: &ClassifiedEvent) -> Result<()> {
        let line = serde_json::to_string(event).context("Failed to serialize classified event")?;
        {
            let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
            writeln!(out, "{line}").context("Failed to write classified event")?;
            out.flush().context("Failed to flush classified event")?;
        }

        let recent = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push(event);
            history.newest_first()
        };
        self.status.update(|status| {
            status.record_event(event);
            status.recent = recent;
        });
        Ok(())
    }
}
