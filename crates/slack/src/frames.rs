//! Decoding of Socket Mode text frames into typed envelopes.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    commands::SlashCommandPayload,
    events::{BlockActionEvent, SlackEnvelope, SlackEvent},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("socket frame is not valid json: {0}")]
    Json(String),
    #[error("socket frame of type `{0}` has no envelope_id")]
    MissingEnvelopeId(String),
    #[error("socket frame payload for `{frame_type}` is malformed: {message}")]
    Payload { envelope_id: String, frame_type: String, message: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct RawSlashCommand {
    command: String,
    #[serde(default)]
    text: String,
    channel_id: String,
    user_id: String,
    #[serde(default)]
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    #[serde(rename = "type")]
    interaction_type: String,
    user: RawId,
    #[serde(default)]
    channel: Option<RawId>,
    #[serde(default)]
    response_url: Option<String>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    selected_option: Option<RawSelectedOption>,
}

#[derive(Debug, Deserialize)]
struct RawSelectedOption {
    value: String,
}

pub fn parse_socket_frame(text: &str) -> Result<SocketFrame, FrameError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|error| FrameError::Json(error.to_string()))?;

    match raw.frame_type.as_str() {
        "hello" => return Ok(SocketFrame::Hello),
        "disconnect" => {
            return Ok(SocketFrame::Disconnect {
                reason: raw.reason.unwrap_or_else(|| "unspecified".to_owned()),
            })
        }
        _ => {}
    }

    let envelope_id = raw
        .envelope_id
        .clone()
        .ok_or_else(|| FrameError::MissingEnvelopeId(raw.frame_type.clone()))?;
    let payload_error = |message: String| FrameError::Payload {
        envelope_id: envelope_id.clone(),
        frame_type: raw.frame_type.clone(),
        message,
    };
    let event = match raw.frame_type.as_str() {
        "slash_commands" => {
            let command: RawSlashCommand = decode_payload(&raw.payload).map_err(payload_error)?;
            SlackEvent::SlashCommand(SlashCommandPayload {
                command: command.command,
                text: command.text,
                channel_id: command.channel_id,
                user_id: command.user_id,
                request_id: envelope_id.clone(),
                response_url: command.response_url,
            })
        }
        "interactive" => interaction_event(&raw.payload).map_err(payload_error)?,
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    };

    Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id, event }))
}

fn interaction_event(payload: &Value) -> Result<SlackEvent, String> {
    let interaction: RawInteraction = decode_payload(payload)?;
    if interaction.interaction_type != "block_actions" {
        return Ok(SlackEvent::Unsupported {
            event_type: format!("interactive:{}", interaction.interaction_type),
        });
    }

    let Some(action) = interaction.actions.into_iter().next() else {
        return Err("block_actions without actions".to_owned());
    };
    let value = action.selected_option.map(|option| option.value).or(action.value);

    Ok(SlackEvent::BlockAction(BlockActionEvent {
        channel_id: interaction.channel.map(|channel| channel.id),
        user_id: interaction.user.id,
        action_id: action.action_id,
        value,
        response_url: interaction.response_url,
    }))
}

fn decode_payload<T>(payload: &Value) -> Result<T, String>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(payload).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_socket_frame, FrameError, SocketFrame};
    use crate::events::SlackEvent;

    #[test]
    fn hello_and_disconnect_frames_are_recognized() {
        assert_eq!(
            parse_socket_frame(r#"{"type":"hello","num_connections":1}"#),
            Ok(SocketFrame::Hello)
        );
        assert_eq!(
            parse_socket_frame(r#"{"type":"disconnect","reason":"refresh_requested"}"#),
            Ok(SocketFrame::Disconnect { reason: "refresh_requested".to_owned() })
        );
    }

    #[test]
    fn slash_command_frame_uses_envelope_id_as_request_id() {
        let frame = json!({
            "envelope_id": "env-slash",
            "type": "slash_commands",
            "accepts_response_payload": true,
            "payload": {
                "command": "/book",
                "text": "search 데미안",
                "channel_id": "C1",
                "user_id": "U1",
                "trigger_id": "T1",
                "response_url": "https://hooks.slack.com/commands/1"
            }
        });

        let Ok(SocketFrame::Envelope(envelope)) = parse_socket_frame(&frame.to_string()) else {
            panic!("expected envelope");
        };

        assert_eq!(envelope.envelope_id, "env-slash");
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            panic!("expected slash command");
        };
        assert_eq!(payload.request_id, "env-slash");
        assert_eq!(payload.text, "search 데미안");
        assert_eq!(envelope.response_url(), Some("https://hooks.slack.com/commands/1"));
    }

    #[test]
    fn static_select_value_comes_from_selected_option() {
        let frame = json!({
            "envelope_id": "env-select",
            "type": "interactive",
            "payload": {
                "type": "block_actions",
                "user": {"id": "U2"},
                "channel": {"id": "C2"},
                "response_url": "https://hooks.slack.com/actions/2",
                "trigger_id": "T2",
                "actions": [{
                    "action_id": "book.genre.select.v1",
                    "type": "static_select",
                    "selected_option": {"text": {"type": "plain_text", "text": "경제"}, "value": "경제"}
                }]
            }
        });

        let Ok(SocketFrame::Envelope(envelope)) = parse_socket_frame(&frame.to_string()) else {
            panic!("expected envelope");
        };
        let SlackEvent::BlockAction(action) = envelope.event else {
            panic!("expected block action");
        };

        assert_eq!(action.action_id, "book.genre.select.v1");
        assert_eq!(action.value.as_deref(), Some("경제"));
        assert_eq!(action.channel_id.as_deref(), Some("C2"));
    }

    #[test]
    fn other_envelopes_are_kept_for_acknowledgement() {
        let frame = json!({
            "envelope_id": "env-events",
            "type": "events_api",
            "payload": {"event": {"type": "app_mention"}}
        });

        let Ok(SocketFrame::Envelope(envelope)) = parse_socket_frame(&frame.to_string()) else {
            panic!("expected envelope");
        };

        assert_eq!(envelope.envelope_id, "env-events");
        assert_eq!(envelope.event, SlackEvent::Unsupported { event_type: "events_api".to_owned() });
    }

    #[test]
    fn malformed_frames_report_errors() {
        assert!(matches!(parse_socket_frame("not json"), Err(FrameError::Json(_))));
        assert_eq!(
            parse_socket_frame(r#"{"type":"slash_commands","payload":{}}"#),
            Err(FrameError::MissingEnvelopeId("slash_commands".to_owned()))
        );
        assert!(matches!(
            parse_socket_frame(r#"{"envelope_id":"e","type":"slash_commands","payload":{"text":"x"}}"#),
            Err(FrameError::Payload { ref envelope_id, .. }) if envelope_id == "e"
        ));
    }
}
