//! Scripted chat assistant for the report screen.
//!
//! The responder is a pure function of the user's text and the loaded
//! report view: a fixed rule list, first match wins, case-insensitive
//! substring matching. The session wraps it with the visible transcript and
//! a single-flight reply queue: at most one armed assistant reply at a
//! time, later sends enqueued and drained in send order after the fixed
//! thinking delay. The transcript lives only in memory.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::models::report::ReportView;

/// Opening assistant message seeding every transcript.
pub const GREETING: &str =
    "Hello! I'm your medical AI assistant. How can I help you understand your report?";

/// Simulated thinking delay before an assistant reply appears.
const THINKING_DELAY: Duration = Duration::from_millis(900);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
}

/// Scripted reply for one user message. First matching rule wins.
pub fn respond(text: &str, view: &ReportView) -> String {
    let lower = text.to_lowercase();

    if lower.contains("tumor") {
        if view.tumor_detected {
            format!(
                "The analysis identified a {} with {} confidence. \
                 Would you like to know more about what this means?",
                view.tumor_type,
                view.confidence_display(),
            )
        } else {
            format!(
                "The analysis did not detect a tumor in this scan \
                 ({} confidence). Regular follow-up imaging is still \
                 recommended by your care team.",
                view.confidence_display(),
            )
        }
    } else if lower.contains("confidence") {
        format!(
            "The model reported {} confidence for this analysis. Confidence \
             reflects how strongly the imaging features matched the \
             predicted category.",
            view.confidence_display(),
        )
    } else if lower.contains("treatment") || lower.contains("therapy") {
        "Treatment decisions are made by your care team, not by this \
         assistant. Your report's recommendations are a good starting point \
         for that conversation, so please discuss them with your physician."
            .to_string()
    } else {
        "I can help explain any part of your report. Try asking about the \
         tumor, the confidence score, or treatment follow-up."
            .to_string()
    }
}

/// A reply waiting its turn. Only the queue head carries a deadline.
#[derive(Debug)]
struct PendingReply {
    text: String,
    ready_at: Option<Instant>,
}

/// One chat session over a loaded report.
pub struct ChatSession {
    view: ReportView,
    transcript: Vec<ChatMessage>,
    queue: VecDeque<PendingReply>,
    delay: Duration,
}

impl ChatSession {
    pub fn new(view: ReportView) -> Self {
        Self::with_delay(view, THINKING_DELAY)
    }

    /// Session with an explicit thinking delay (tests use zero).
    pub fn with_delay(view: ReportView, delay: Duration) -> Self {
        Self {
            view,
            transcript: vec![ChatMessage {
                speaker: Speaker::Assistant,
                text: GREETING.to_string(),
            }],
            queue: VecDeque::new(),
            delay,
        }
    }

    /// Append the user message and enqueue its scripted reply.
    ///
    /// Blank sends are ignored. The reply's deadline is armed only when it
    /// reaches the head of the queue, so replies drain strictly in send
    /// order, one in flight while the rest wait.
    pub fn send(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.transcript.push(ChatMessage {
            speaker: Speaker::User,
            text: text.to_string(),
        });

        let reply = respond(text, &self.view);
        let armed = self.queue.is_empty();
        self.queue.push_back(PendingReply {
            text: reply,
            ready_at: armed.then(|| Instant::now() + self.delay),
        });
    }

    /// Drain every reply whose delay has elapsed, arming the next one as it
    /// reaches the head. Call from the UI tick. Returns the assistant
    /// messages appended by this call.
    pub fn poll(&mut self) -> Vec<ChatMessage> {
        let mut appended = Vec::new();
        loop {
            let now = Instant::now();
            let Some(head) = self.queue.front_mut() else {
                break;
            };
            let ready_at = *head.ready_at.get_or_insert(now + self.delay);
            if now < ready_at {
                break;
            }

            let Some(reply) = self.queue.pop_front() else {
                break;
            };
            let message = ChatMessage {
                speaker: Speaker::Assistant,
                text: reply.text,
            };
            self.transcript.push(message.clone());
            appended.push(message);

            if let Some(next) = self.queue.front_mut() {
                next.ready_at = Some(Instant::now() + self.delay);
            }
        }
        appended
    }

    /// Replies still waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
