use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every message the server sends to a connected client. Tagged by `type`,
/// the way the teacher's `WsMessage` enum tags client/server frames, so the
/// wire format is a flat JSON object with a discriminant field rather than
/// an externally-tagged wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ConnectionEstablished {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    SessionBegin {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    SessionTerminated {
        total_audio_duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    PartialTranscript {
        text: String,
        timestamp: DateTime<Utc>,
    },
    TurnCompleted {
        turn_number: u64,
        text: String,
        timestamp: DateTime<Utc>,
    },
    TurnUpdated {
        turn_number: u64,
        final_transcript: String,
        timestamp: DateTime<Utc>,
    },
    FinalTranscript {
        turn_number: u64,
        text: String,
        timestamp: DateTime<Utc>,
    },
    LlmStreamingStart {
        turn_number: u64,
        timestamp: DateTime<Utc>,
    },
    LlmChunk {
        turn_number: u64,
        chunk: String,
        accumulated: String,
        timestamp: DateTime<Utc>,
    },
    LlmStreamingComplete {
        turn_number: u64,
        full_response: String,
        timestamp: DateTime<Utc>,
    },
    LlmError {
        turn_number: Option<u64>,
        error: String,
        timestamp: DateTime<Utc>,
    },
    AudioChunk {
        turn_number: u64,
        audio_data: String,
        #[serde(rename = "final")]
        is_final: bool,
        timestamp: DateTime<Utc>,
    },
    AudioStreamingComplete {
        turn_number: u64,
        total_chunks: u64,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerEvent {
    /// The `type` discriminant, for logging without re-serializing the
    /// whole event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::SessionBegin { .. } => "session_begin",
            Self::SessionTerminated { .. } => "session_terminated",
            Self::PartialTranscript { .. } => "partial_transcript",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::TurnUpdated { .. } => "turn_updated",
            Self::FinalTranscript { .. } => "final_transcript",
            Self::LlmStreamingStart { .. } => "llm_streaming_start",
            Self::LlmChunk { .. } => "llm_chunk",
            Self::LlmStreamingComplete { .. } => "llm_streaming_complete",
            Self::LlmError { .. } => "llm_error",
            Self::AudioChunk { .. } => "audio_chunk",
            Self::AudioStreamingComplete { .. } => "audio_streaming_complete",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let ev = ServerEvent::ConnectionEstablished {
            session_id: "abc".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "connection_established");
        assert_eq!(json["session_id"], "abc");
    }

    #[test]
    fn audio_chunk_final_field_renamed() {
        let ev = ServerEvent::AudioChunk {
            turn_number: 1,
            audio_data: String::new(),
            is_final: true,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["final"], true);
    }
}
