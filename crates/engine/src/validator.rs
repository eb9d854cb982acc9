use serde_json::Value;

use common::SignalError;
use common::models::{Side, Signal};

/// Pure payload validation. No I/O, so validating the same body twice
/// always gives the same answer.
pub struct Validator;

impl Validator {
    /// Parse a raw webhook body into a `Signal`. The bot id comes from
    /// the request path and is authoritative; a `bot_id` key in the body
    /// is ignored.
    ///
    /// Alerting services sometimes deliver the payload as a JSON string
    /// containing JSON, so a top-level string is unwrapped once before
    /// field extraction.
    pub fn parse(bot_id: &str, raw_body: &str) -> Result<Signal, SignalError> {
        let value: Value = serde_json::from_str(raw_body.trim())
            .map_err(|_| SignalError::MalformedSignal("body is not valid JSON"))?;

        let value = match value {
            Value::String(inner) => serde_json::from_str(&inner)
                .map_err(|_| SignalError::MalformedSignal("quoted body is not valid JSON"))?,
            other => other,
        };

        let obj = value
            .as_object()
            .ok_or(SignalError::MalformedSignal("body is not a JSON object"))?;

        let side_raw = obj
            .get("side")
            .and_then(Value::as_str)
            .ok_or(SignalError::InvalidSignal("missing side"))?;
        let side: Side = side_raw
            .parse()
            .map_err(|_| SignalError::InvalidSignal("side must be buy or sell"))?;

        let pair = obj
            .get("Pair")
            .or_else(|| obj.get("pair"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        // Charting services emit the size as a string placeholder, but a
        // bare number is accepted too.
        let position_size = match obj.get("position_size") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(Signal {
            bot_id: bot_id.to_string(),
            side,
            pair,
            position_size,
        })
    }
}
