//! Synchronous test doubles for driving the plugin without a runtime.

use std::sync::Mutex;

use reqwest::Url;

use crate::{model::CorrelationId, transport::Transport};

/// Records every submitted request instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Url, CorrelationId)>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<(Url, CorrelationId)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Transport for RecordingTransport {
    fn send_get(&self, uri: Url, context: CorrelationId) {
        self.sent.lock().unwrap().push((uri, context));
    }
}
