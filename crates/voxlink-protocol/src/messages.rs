//! Message envelopes exchanged with the remote voice service.
//!
//! Every record is a flat JSON object with a required `type`
//! discriminator. Audio payloads travel base64-encoded in an `audio`
//! string field.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Client → remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// One capture slice, streamed while listening.
    AudioChunk {
        #[serde(with = "base64_bytes")]
        audio: Vec<u8>,
        format: String,
        timestamp: u64,
    },
    /// The accumulated utterance audio, sent on flush.
    AudioComplete {
        #[serde(with = "base64_bytes")]
        audio: Vec<u8>,
        format: String,
        timestamp: u64,
    },
    /// Whole-utterance upload in one message. Legacy shape accepted by
    /// older servers; current clients stream chunks instead.
    Audio {
        #[serde(with = "base64_bytes")]
        audio: Vec<u8>,
        format: String,
        timestamp: u64,
    },
    /// A finalized transcript, or typed fallback input.
    Text { text: String, timestamp: u64 },
    /// Keep-alive; the server answers with `pong`.
    Ping { timestamp: u64 },
    /// Graceful termination before the channel closes.
    EndCall { timestamp: u64 },
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            OutboundMessage::AudioChunk { timestamp, .. }
            | OutboundMessage::AudioComplete { timestamp, .. }
            | OutboundMessage::Audio { timestamp, .. }
            | OutboundMessage::Text { timestamp, .. }
            | OutboundMessage::Ping { timestamp }
            | OutboundMessage::EndCall { timestamp } => *timestamp,
        }
    }
}

/// Remote → client.
///
/// Parsing an unknown `type` fails; the transport treats that as a
/// forward-compatible no-op rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Connection {
        #[serde(default)]
        status: Option<String>,
        message: String,
    },
    /// Server-side ASR echo of a user utterance.
    Transcription { text: String },
    /// The assistant's answer; optional synthesized audio payload.
    Response {
        text: String,
        #[serde(default, with = "base64_bytes_opt")]
        audio: Option<Vec<u8>>,
        #[serde(default)]
        audio_format: Option<String>,
        #[serde(default)]
        timestamp: Option<u64>,
    },
    /// Display-only status while the remote thinks.
    Processing {
        #[serde(default)]
        message: Option<String>,
    },
    Error { message: String },
    Pong {
        #[serde(default)]
        timestamp: Option<u64>,
    },
}

impl InboundMessage {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_chunk_encodes_base64_payload() {
        let msg = OutboundMessage::AudioChunk {
            audio: vec![0x01, 0x02, 0x03],
            format: "pcm_s16le".into(),
            timestamp: 1234,
        };
        let json = msg.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "audio_chunk");
        assert_eq!(value["audio"], "AQID");
        assert_eq!(value["format"], "pcm_s16le");
        assert_eq!(value["timestamp"], 1234);
    }

    #[test]
    fn legacy_audio_uses_plain_audio_tag() {
        let msg = OutboundMessage::Audio {
            audio: vec![0xAA],
            format: "wav".into(),
            timestamp: 9,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "audio");
    }

    #[test]
    fn text_round_trips() {
        let msg = OutboundMessage::Text {
            text: "hello".into(),
            timestamp: 42,
        };
        let json = msg.to_json().unwrap();
        let back: OutboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn response_with_audio_parses() {
        let raw = r#"{"type":"response","text":"hi","audio":"AQID","audio_format":"mp3"}"#;
        let msg = InboundMessage::parse(raw).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Response {
                text: "hi".into(),
                audio: Some(vec![1, 2, 3]),
                audio_format: Some("mp3".into()),
                timestamp: None,
            }
        );
    }

    #[test]
    fn response_without_audio_parses() {
        let raw = r#"{"type":"response","text":"just text"}"#;
        let msg = InboundMessage::parse(raw).unwrap();
        assert!(matches!(
            msg,
            InboundMessage::Response {
                audio: None,
                audio_format: None,
                ..
            }
        ));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let raw = r#"{"type":"telemetry_v2","payload":{}}"#;
        assert!(InboundMessage::parse(raw).is_err());
    }

    #[test]
    fn connection_message_parses_with_status() {
        let raw = r#"{"type":"connection","status":"connected","message":"Voice assistant ready"}"#;
        let msg = InboundMessage::parse(raw).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Connection {
                status: Some("connected".into()),
                message: "Voice assistant ready".into(),
            }
        );
    }

    #[test]
    fn malformed_audio_base64_is_rejected() {
        let raw = r#"{"type":"response","text":"x","audio":"not base64!!"}"#;
        assert!(InboundMessage::parse(raw).is_err());
    }
}
