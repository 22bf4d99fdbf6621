use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use toolbridge_core::{Arguments, ToolOutcome};

/// Progress of a turn, streamed to an observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    ToolCallStarted {
        call_id: String,
        tool: String,
        arguments: Arguments,
    },
    ToolCallFinished {
        call_id: String,
        tool: String,
        outcome: ToolOutcome,
    },
    TurnCancelled,
    /// The observer fell behind and `count` events were discarded.
    EventsDropped { count: u64 },
}

/// Create a bounded event channel.
pub fn channel(capacity: usize) -> (EventSink, mpsc::Receiver<AgentEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventSink {
            tx: Some(tx),
            dropped: 0,
        },
        rx,
    )
}

/// Sending half of the event channel.
///
/// Never blocks: when the buffer is full the event is dropped and counted,
/// and the count is reported as [`AgentEvent::EventsDropped`] ahead of the
/// next event that fits.
#[derive(Debug, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<AgentEvent>>,
    dropped: u64,
}

impl EventSink {
    /// A sink with no observer; every event is discarded silently.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Events dropped since the last successful report.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn emit(&mut self, event: AgentEvent) {
        if self.dropped > 0 {
            let report = AgentEvent::EventsDropped {
                count: self.dropped,
            };
            if self.try_send(report) {
                self.dropped = 0;
            } else {
                self.drop_event();
                return;
            }
        }

        if !self.try_send(event) {
            self.drop_event();
        }
    }

    /// Returns false only when the buffer is full.
    fn try_send(&mut self, event: AgentEvent) -> bool {
        let Some(tx) = &self.tx else {
            return true;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("event observer went away");
                self.tx = None;
                true
            }
        }
    }

    fn drop_event(&mut self) {
        self.dropped += 1;
        tracing::warn!(dropped = self.dropped, "event observer is behind, dropping event");
    }

    /// Detach the observer; its receiver sees the channel close.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(n: u32) -> AgentEvent {
        AgentEvent::ToolCallStarted {
            call_id: format!("call_{n}"),
            tool: "sum".to_string(),
            arguments: Arguments::new(),
        }
    }

    #[tokio::test]
    async fn full_buffer_drops_and_reports() {
        let (mut sink, mut rx) = channel(2);
        sink.emit(started(1));
        sink.emit(started(2));
        sink.emit(started(3));
        assert_eq!(sink.dropped(), 1);

        assert_eq!(rx.recv().await.unwrap(), started(1));
        assert_eq!(rx.recv().await.unwrap(), started(2));

        sink.emit(started(4));
        assert_eq!(sink.dropped(), 0);
        assert_eq!(rx.recv().await.unwrap(), AgentEvent::EventsDropped { count: 1 });
        assert_eq!(rx.recv().await.unwrap(), started(4));
    }

    #[tokio::test]
    async fn report_that_does_not_fit_keeps_counting() {
        let (mut sink, mut rx) = channel(1);
        sink.emit(started(1));
        sink.emit(started(2));
        assert_eq!(sink.dropped(), 1);

        // Nothing drained: neither the report nor the event fits.
        sink.emit(started(3));
        assert_eq!(sink.dropped(), 2);

        assert_eq!(rx.recv().await.unwrap(), started(1));
        sink.emit(started(4));
        assert_eq!(rx.recv().await.unwrap(), AgentEvent::EventsDropped { count: 2 });
    }

    #[test]
    fn closed_observer_is_ignored() {
        let (mut sink, rx) = channel(1);
        drop(rx);
        sink.emit(started(1));
        sink.emit(started(2));
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn disabled_sink_discards() {
        let mut sink = EventSink::disabled();
        sink.emit(AgentEvent::TurnCancelled);
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn event_wire_shape() {
        let json = serde_json::to_value(AgentEvent::EventsDropped { count: 3 }).unwrap();
        assert_eq!(json["event"], "events_dropped");
        assert_eq!(json["count"], 3);
    }
}
