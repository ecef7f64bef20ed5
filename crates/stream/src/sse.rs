//! SSE frame assembly and announcement payload decoding for the StackStorm
//! event stream.

use serde::Deserialize;

/// A single SSE frame received from the stream service.
#[derive(Debug, Clone)]
pub struct SseFrame {
    /// The SSE event type (from the `event:` line).
    pub event: Option<String>,
    /// The event ID (from the `id:` line).
    pub id: Option<String>,
    /// The event data (from the `data:` line(s)).
    pub data: String,
}

/// Intermediate state for parsing SSE frames line-by-line.
#[derive(Default)]
pub(crate) struct SseFrameState {
    pub(crate) event: Option<String>,
    pub(crate) id: Option<String>,
    data: Vec<String>,
}

impl SseFrameState {
    pub(crate) fn push_data(&mut self, line: &str) {
        self.data.push(line.to_string());
    }

    pub(crate) fn take_frame(&mut self) -> Option<SseFrame> {
        if self.data.is_empty() && self.event.is_none() && self.id.is_none() {
            return None;
        }
        let frame = SseFrame {
            event: self.event.take(),
            id: self.id.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        };
        Some(frame)
    }
}

/// Envelope of a stream announcement event.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncementEnvelope {
    /// Present on enquiry notifications, which are logged rather than
    /// relayed.
    pub context: Option<serde_json::Value>,
    /// The chat-relay payload.
    pub payload: Option<Announcement>,
}

/// Chat-relay payload carried by an announcement event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Announcement {
    /// Deliver as a private message rather than into a channel.
    #[serde(default)]
    pub whisper: bool,
    pub message: Option<String>,
    pub user: Option<String>,
    pub channel: Option<String>,
    /// Backend-specific extra formatting data, passed through untouched.
    #[serde(default)]
    pub extra: serde_json::Value,
}
