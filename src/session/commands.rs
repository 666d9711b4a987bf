use anyhow::{Context, Result};
use serde::Deserialize;

use crate::db::SessionInfo;
use crate::sensing::FaceObservation;

use super::SessionController;

/// One line of driver input.
///
/// ```json
/// {"type":"frame","frameWidth":640,"frameHeight":480,"face":{"boundingBox":{"width":200,"height":240}}}
/// {"type":"lux","lux":320.0}
/// {"type":"pause"}
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundMessage {
    Frame(FaceObservation),
    Lux { lux: f32 },
    Pause,
    Resume,
    Stop,
}

impl InboundMessage {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).with_context(|| "failed to parse inbound message")
    }
}

/// Apply one message to the controller. Returns the final record when the message stopped
/// the session.
pub async fn apply_message(
    controller: &SessionController,
    message: InboundMessage,
) -> Result<Option<SessionInfo>> {
    match message {
        InboundMessage::Frame(observation) => {
            controller.submit_observation(observation).await?;
        }
        InboundMessage::Lux { lux } => controller.update_ambient_lux(lux),
        InboundMessage::Pause => controller.pause().await?,
        InboundMessage::Resume => controller.resume().await?,
        InboundMessage::Stop => return controller.stop().await.map(Some),
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_message_kind() {
        let frame = InboundMessage::parse(
            r#"{"type":"frame","frameWidth":640,"frameHeight":480,"face":null}"#,
        )
        .unwrap();
        assert_eq!(frame, InboundMessage::Frame(FaceObservation::no_face(640, 480)));

        assert_eq!(
            InboundMessage::parse(r#"{"type":"lux","lux":12.5}"#).unwrap(),
            InboundMessage::Lux { lux: 12.5 }
        );
        assert_eq!(
            InboundMessage::parse(r#"{"type":"stop"}"#).unwrap(),
            InboundMessage::Stop
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(InboundMessage::parse(r#"{"type":"reboot"}"#).is_err());
    }
}
