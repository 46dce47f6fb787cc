//! Incremental execution state events, serialized onto the SSE stream.

use serde::Serialize;

use crate::message::Message;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted { thread_id: String },
    Message { message: Message },
    Done,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged() {
        let event = RunEvent::RunStarted {
            thread_id: "t1".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "run_started");
        assert_eq!(value["thread_id"], "t1");

        let value = serde_json::to_value(RunEvent::Done).unwrap();
        assert_eq!(value["event"], "done");
    }
}
