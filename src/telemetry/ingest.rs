//! Publisher Message Handling
//!
//! Decodes messages from devices and the control page into a
//! `PublisherMessage`, applies them to the shared state and produces the
//! status reply. Both the one-shot HTTP form and the persistent WebSocket
//! form go through `PublisherHandler`; they differ only in framing and in
//! whether commands are honoured.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use super::reading::{Mode, Reading};
use super::state::SharedState;
use crate::websocket::{BroadcastHub, WsEvent};

pub const MSG_ACCEPTED: &str = "Datos recibidos";
pub const MSG_IGNORED_MOCK: &str = "Datos ignorados (modo mock activo)";
pub const MSG_INCOMPLETE: &str = "Datos incompletos";
pub const MSG_MALFORMED: &str = "Formato JSON inválido";
pub const MSG_INVALID_MODE: &str = "Valor de modo inválido, se esperaba true o false";

const COMMAND_USE_MOCK: &str = "use_mock_data";
const COMMAND_GET_MODE: &str = "get_mode";

/// How a message reached the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingress {
    /// Single HTTP request; readings only, commands are not recognised
    OneShot,
    /// Persistent WebSocket connection; readings and commands
    Stream,
}

/// Raw `T`, `PH`, `C` values, coerced to numbers only once a write is allowed
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingFields {
    pub turbidity: Value,
    pub ph: Value,
    pub conductivity: Value,
}

impl ReadingFields {
    /// Coerce every field to a finite float
    pub fn coerce(&self) -> Result<Reading, IngestError> {
        Ok(Reading::new(
            coerce_field("T", &self.turbidity)?,
            coerce_field("PH", &self.ph)?,
            coerce_field("C", &self.conductivity)?,
        ))
    }
}

/// A decoded publisher message
#[derive(Debug, Clone, PartialEq)]
pub enum PublisherMessage {
    /// `{"command": "use_mock_data", "value": <bool>}`
    ModeCommand { use_mock: bool },
    /// `{"command": "get_mode"}`
    ModeQuery,
    /// `use_mock_data` whose `value` is not a boolean
    InvalidModeValue,
    /// Object carrying all of `T`, `PH` and `C`
    ReadingUpdate(ReadingFields),
    /// Anything else, including partial readings
    Unrecognized,
}

impl PublisherMessage {
    /// Parse and classify a text payload
    pub fn decode(text: &str, ingress: Ingress) -> Result<Self, IngestError> {
        let value: Value = serde_json::from_str(text).map_err(|_| IngestError::MalformedJson)?;
        Ok(Self::from_value(&value, ingress))
    }

    /// Classify an already-parsed JSON value
    pub fn from_value(value: &Value, ingress: Ingress) -> Self {
        let Some(object) = value.as_object() else {
            return PublisherMessage::Unrecognized;
        };

        if ingress == Ingress::Stream {
            if let Some(command) = decode_command(object) {
                return command;
            }
        }

        match (object.get("T"), object.get("PH"), object.get("C")) {
            (Some(t), Some(ph), Some(c)) => PublisherMessage::ReadingUpdate(ReadingFields {
                turbidity: t.clone(),
                ph: ph.clone(),
                conductivity: c.clone(),
            }),
            _ => PublisherMessage::Unrecognized,
        }
    }
}

/// Unknown commands fall through to reading handling.
fn decode_command(object: &Map<String, Value>) -> Option<PublisherMessage> {
    match object.get("command").and_then(Value::as_str) {
        Some(COMMAND_USE_MOCK) => match object.get("value") {
            None => Some(PublisherMessage::ModeCommand { use_mock: true }),
            Some(Value::Bool(flag)) => Some(PublisherMessage::ModeCommand { use_mock: *flag }),
            Some(_) => Some(PublisherMessage::InvalidModeValue),
        },
        Some(COMMAND_GET_MODE) => Some(PublisherMessage::ModeQuery),
        _ => None,
    }
}

fn coerce_field(field: &'static str, value: &Value) -> Result<f64, IngestError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(IngestError::InvalidField {
            field,
            reason: format!("could not convert {} to a finite number", value),
        }),
    }
}

/// Why a message did not change the reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    MockModeActive,
    IncompleteFields,
    InvalidModeValue,
}

/// Result of applying one publisher message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PublishOutcome {
    Accepted(Reading),
    ModeChanged { previous: Mode, current: Mode },
    ModeReported(Mode),
    Ignored(IgnoreReason),
}

impl PublishOutcome {
    /// The status reply sent back to the publisher
    pub fn reply(&self) -> PublishReply {
        match self {
            PublishOutcome::Accepted(_) => PublishReply::ok(MSG_ACCEPTED),
            PublishOutcome::ModeChanged { current, .. } => {
                PublishReply::ok(format!("Modo cambiado a {}", current.label()))
                    .with_mode(*current)
            }
            PublishOutcome::ModeReported(mode) => {
                PublishReply::ok(format!("Modo actual: {}", mode.label())).with_mode(*mode)
            }
            PublishOutcome::Ignored(IgnoreReason::MockModeActive) => {
                PublishReply::info(MSG_IGNORED_MOCK)
            }
            PublishOutcome::Ignored(IgnoreReason::IncompleteFields) => {
                PublishReply::info(MSG_INCOMPLETE)
            }
            PublishOutcome::Ignored(IgnoreReason::InvalidModeValue) => {
                PublishReply::info(MSG_INVALID_MODE)
            }
        }
    }
}

/// Reply status tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Info,
    Error,
}

/// `{"status": .., "message": .., "mode": ..}` reply body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishReply {
    pub status: ReplyStatus,
    pub message: String,
    /// Current `use_mock_data` flag, on mode replies only
    #[serde(rename = "mode", skip_serializing_if = "Option::is_none")]
    pub use_mock: Option<bool>,
}

impl PublishReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(ReplyStatus::Ok, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ReplyStatus::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ReplyStatus::Error, message)
    }

    fn new(status: ReplyStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            use_mock: None,
        }
    }

    fn with_mode(mut self, mode: Mode) -> Self {
        self.use_mock = Some(mode.uses_mock());
        self
    }
}

/// Errors while handling a publisher message
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{}", MSG_MALFORMED)]
    MalformedJson,

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Applies publisher messages to the shared state
#[derive(Clone)]
pub struct PublisherHandler {
    state: Arc<SharedState>,
    hub: Arc<BroadcastHub>,
}

impl PublisherHandler {
    pub fn new(state: Arc<SharedState>, hub: Arc<BroadcastHub>) -> Self {
        Self { state, hub }
    }

    /// Decode a text payload and apply it
    pub async fn handle_text(
        &self,
        text: &str,
        ingress: Ingress,
    ) -> Result<PublishOutcome, IngestError> {
        let message = PublisherMessage::decode(text, ingress)?;
        self.handle(message).await
    }

    /// Apply a decoded message
    pub async fn handle(&self, message: PublisherMessage) -> Result<PublishOutcome, IngestError> {
        match message {
            PublisherMessage::ModeCommand { use_mock } => {
                let current = Mode::from_use_mock(use_mock);
                let previous = self.state.set_mode(current);
                tracing::info!(%previous, %current, "Data mode switched");
                if previous != current {
                    self.hub.publish(WsEvent::mode_changed(current)).await;
                }
                Ok(PublishOutcome::ModeChanged { previous, current })
            }
            PublisherMessage::ModeQuery => Ok(PublishOutcome::ModeReported(self.state.mode())),
            PublisherMessage::InvalidModeValue => {
                tracing::debug!(mode = %self.state.mode(), "Mode command with non-boolean value");
                Ok(PublishOutcome::Ignored(IgnoreReason::InvalidModeValue))
            }
            PublisherMessage::ReadingUpdate(fields) => {
                if self.state.mode() == Mode::Synthetic {
                    return Ok(PublishOutcome::Ignored(IgnoreReason::MockModeActive));
                }
                let reading = fields.coerce()?;
                match self.state.set_if_mode(Mode::Real, reading) {
                    Ok(()) => {
                        tracing::info!(%reading, "Reading updated from publisher");
                        Ok(PublishOutcome::Accepted(reading))
                    }
                    // Mode flipped between the check and the write
                    Err(_) => Ok(PublishOutcome::Ignored(IgnoreReason::MockModeActive)),
                }
            }
            PublisherMessage::Unrecognized => {
                let reason = match self.state.mode() {
                    Mode::Synthetic => IgnoreReason::MockModeActive,
                    Mode::Real => IgnoreReason::IncompleteFields,
                };
                Ok(PublishOutcome::Ignored(reason))
            }
        }
    }
}
