//! Normalized event envelope.
//!
//! An [`Event`] is what every ingested chat message turns into before it is
//! handed to the intake API. The shape follows the CloudEvents structure:
//! an id, a source, a type, a spec version, typed attributes and an
//! optional text body.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Envelope spec version stamped on every event.
pub const SPEC_VERSION: &str = "1.0";

/// A strongly typed event attribute value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AttributeValue {
    /// UTF-8 string value.
    String(String),
    /// Signed 32-bit integer value.
    Integer(i32),
    /// Point in time (UTC).
    Timestamp(DateTime<Utc>),
    /// Boolean flag.
    Boolean(bool),
}

impl AttributeValue {
    /// Returns the string payload, if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer attribute.
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the timestamp payload, if this is a timestamp attribute.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean attribute.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// The normalized, sink-bound representation of one ingested message.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Globally unique event id.
    pub id: String,
    /// Source identifier (the channel link; may be empty).
    pub source: String,
    /// Envelope spec version, always [`SPEC_VERSION`].
    pub spec_version: String,
    /// Event type, carries the shard discriminator.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub event_type: String,
    /// Named attributes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Text body. Events without a body are never delivered.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub data: Option<String>,
}

impl Event {
    /// Create an event with no attributes and no body.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            spec_version: SPEC_VERSION.to_string(),
            event_type: event_type.into(),
            attributes: BTreeMap::new(),
            data: None,
        }
    }

    /// Builder-style attribute insertion.
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Builder-style body assignment.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.data = Some(text.into());
        self
    }

    /// Insert or replace an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(key.into(), value);
    }

    /// Look up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Look up a string attribute by key.
    pub fn string_attribute(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(AttributeValue::as_str)
    }

    /// Look up an integer attribute by key.
    pub fn integer_attribute(&self, key: &str) -> Option<i32> {
        self.attribute(key).and_then(AttributeValue::as_integer)
    }

    /// Look up a timestamp attribute by key.
    pub fn timestamp_attribute(&self, key: &str) -> Option<DateTime<Utc>> {
        self.attribute(key).and_then(AttributeValue::as_timestamp)
    }

    /// The text body, if any.
    pub fn text(&self) -> Option<&str> {
        self.data.as_deref()
    }

    /// Whether the event carries a body and is therefore deliverable.
    pub fn has_body(&self) -> bool {
        self.data.is_some()
    }
}
