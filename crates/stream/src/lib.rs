pub mod listener;
pub mod sse;

pub use listener::{StreamError, StreamListener};
pub use sse::{Announcement, AnnouncementEnvelope, SseFrame};
