//! # chanrelay-proto
//!
//! Shared data model for the chanrelay ingestion service:
//!
//! - [`chat`]: the subset of the chat platform's update/message model the
//!   relay consumes (messages, content variants, remote files, chats).
//! - [`event`]: the normalized event envelope that is handed to the event
//!   intake API.
//!
//! With the `serde` feature enabled every type derives `Serialize` and
//! `Deserialize`, which is what the HTTP adapters in the main crate use.
//!
//! ```rust
//! use chanrelay_proto::{AttributeValue, Event};
//!
//! let evt = Event::new("evt-1", "@news", "com.chanrelay.source-0.v1")
//!     .with_attribute("tgmessageid", AttributeValue::String("42".into()))
//!     .with_text("hello");
//!
//! assert_eq!(evt.text(), Some("hello"));
//! assert_eq!(evt.string_attribute("tgmessageid"), Some("42"));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod chat;
pub mod event;

pub use chat::{
    Audio, Chat, ChatType, Document, File, FormattedText, Location, Message, MessageContent,
    Photo, PhotoSize, RemoteFile, Supergroup, SupergroupFullInfo, Update, Video,
};
pub use event::{AttributeValue, Event, SPEC_VERSION};
