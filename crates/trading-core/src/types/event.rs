//! Event bus topics and payloads.
//!
//! Payloads are short strings of the form `VERB` or `VERB:BODY`. The vocabulary
//! is fixed per topic; anything else parses to an [`EnvelopeError`] which
//! consumers log and ignore.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::order::Side;
use crate::error::EnvelopeError;

pub const VERB_CANDLE_SAVED: &str = "CANDLE_SAVED";
pub const VERB_SEND: &str = "SEND";

/// A bus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Ingestion to analysis
    Analysis,
    /// Analysis to trading
    Trading,
    /// Any process to the manager
    Manager,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Analysis => "analysis",
            Topic::Trading => "trading",
            Topic::Manager => "manager",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(Topic::Analysis),
            "trading" => Ok(Topic::Trading),
            "manager" => Ok(Topic::Manager),
            other => Err(format!("unknown topic: {other}")),
        }
    }
}

/// A raw notification as delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: Topic,
    pub payload: String,
}

impl Envelope {
    pub fn new(topic: Topic, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
        }
    }

    /// Split the payload into verb and optional body.
    pub fn payload(&self) -> Payload<'_> {
        Payload::parse(&self.payload)
    }

    /// Interpret the payload against the topic vocabulary.
    pub fn event(&self) -> Result<Event, EnvelopeError> {
        Event::parse(self.topic, &self.payload)
    }
}

/// `VERB` or `VERB:BODY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload<'a> {
    pub verb: &'a str,
    pub body: Option<&'a str>,
}

impl<'a> Payload<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match raw.split_once(':') {
            Some((verb, body)) => Self {
                verb: verb.trim(),
                body: Some(body),
            },
            None => Self {
                verb: raw.trim(),
                body: None,
            },
        }
    }

    /// Comma-separated, trimmed, non-empty body arguments.
    pub fn args(&self) -> Vec<&'a str> {
        self.body
            .map(|b| {
                b.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Typed view of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// New candles are stored; an empty list means every configured symbol.
    CandleSaved { symbols: Vec<String> },
    /// Analysis decided to trade a symbol.
    TradeDecision { side: Side, symbol: String },
    /// Free text for the notification sink.
    Send { text: String },
}

impl Event {
    pub fn candle_saved(symbols: Vec<String>) -> Self {
        Event::CandleSaved { symbols }
    }

    pub fn trade(side: Side, symbol: impl Into<String>) -> Self {
        Event::TradeDecision {
            side,
            symbol: symbol.into(),
        }
    }

    pub fn send(text: impl Into<String>) -> Self {
        Event::Send { text: text.into() }
    }

    /// Topic this event travels on.
    pub fn topic(&self) -> Topic {
        match self {
            Event::CandleSaved { .. } => Topic::Analysis,
            Event::TradeDecision { .. } => Topic::Trading,
            Event::Send { .. } => Topic::Manager,
        }
    }

    /// Wire payload.
    pub fn payload(&self) -> String {
        match self {
            Event::CandleSaved { symbols } if symbols.is_empty() => VERB_CANDLE_SAVED.to_string(),
            Event::CandleSaved { symbols } => {
                format!("{VERB_CANDLE_SAVED}:{}", symbols.join(","))
            }
            Event::TradeDecision { side, symbol } => format!("{side}:{symbol}"),
            Event::Send { text } => format!("{VERB_SEND}:{text}"),
        }
    }

    /// Parse a payload received on `topic`.
    pub fn parse(topic: Topic, raw: &str) -> Result<Self, EnvelopeError> {
        let payload = Payload::parse(raw);
        match topic {
            // An empty ingestion payload is a bare tick.
            Topic::Analysis if payload.verb.is_empty() || payload.verb == VERB_CANDLE_SAVED => {
                Ok(Event::CandleSaved {
                    symbols: payload.args().into_iter().map(String::from).collect(),
                })
            }
            Topic::Trading => {
                let side: Side = payload.verb.parse().map_err(|_| unknown(topic, payload.verb))?;
                let symbol = payload
                    .args()
                    .first()
                    .map(|s| s.to_string())
                    .ok_or_else(|| EnvelopeError::MissingArgument(payload.verb.to_string()))?;
                Ok(Event::TradeDecision { side, symbol })
            }
            Topic::Manager if payload.verb == VERB_SEND => Ok(Event::Send {
                text: payload.body.unwrap_or_default().to_string(),
            }),
            _ if raw.trim().is_empty() => Err(EnvelopeError::Empty),
            _ => Err(unknown(topic, payload.verb)),
        }
    }
}

fn unknown(topic: Topic, verb: &str) -> EnvelopeError {
    EnvelopeError::UnknownVerb {
        topic: topic.to_string(),
        verb: verb.to_string(),
    }
}
