//! Chat platform model.
//!
//! Only the parts of the platform's update stream and chat metadata that the
//! relay actually inspects are modelled here. Message content is a tagged
//! union; anything the relay does not understand arrives as
//! [`MessageContent::Unsupported`] carrying the platform's type name.

/// An update pushed by the chat platform.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Update {
    /// A new message arrived in some chat.
    NewMessage {
        /// The message itself.
        message: Message,
    },
    /// Any other update class; ignored by the relay.
    Other {
        /// Platform type name, kept for logging.
        kind: String,
    },
}

impl Update {
    /// Short type name for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::NewMessage { .. } => "new_message",
            Self::Other { kind } => kind,
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// Platform message id.
    pub id: i64,
    /// Id of the chat the message belongs to.
    pub chat_id: i64,
    /// Origination time, unix seconds.
    pub date: i64,
    /// True when the message was sent by the relay's own account.
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_outgoing: bool,
    /// Message payload.
    pub content: MessageContent,
}

/// Message payload variants.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum MessageContent {
    /// Audio file with caption.
    Audio {
        /// Audio metadata.
        audio: Audio,
        /// Caption text.
        caption: FormattedText,
    },
    /// Generic document with caption.
    Document {
        /// Document metadata.
        document: Document,
        /// Caption text.
        caption: FormattedText,
    },
    /// Geographic point, no caption.
    Location {
        /// Coordinates.
        location: Location,
    },
    /// Photo with caption.
    Photo {
        /// Available sizes of the photo.
        photo: Photo,
        /// Caption text.
        caption: FormattedText,
    },
    /// Plain text message.
    Text {
        /// Message text.
        text: FormattedText,
    },
    /// Video with caption.
    Video {
        /// Video metadata.
        video: Video,
        /// Caption text.
        caption: FormattedText,
    },
    /// Anything else (stickers, polls, service messages, ...).
    Unsupported {
        /// Platform content type name.
        kind: String,
    },
}

impl MessageContent {
    /// Short type name for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::Audio { .. } => "audio",
            Self::Document { .. } => "document",
            Self::Location { .. } => "location",
            Self::Photo { .. } => "photo",
            Self::Text { .. } => "text",
            Self::Video { .. } => "video",
            Self::Unsupported { kind } => kind,
        }
    }
}

/// Text with (ignored) formatting entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormattedText {
    /// Raw text.
    #[cfg_attr(feature = "serde", serde(default))]
    pub text: String,
}

impl FormattedText {
    /// Wrap a plain string.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A file stored by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct File {
    /// Local file id.
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: i32,
    /// Remote location; absent for files not yet uploaded.
    #[cfg_attr(feature = "serde", serde(default))]
    pub remote: Option<RemoteFile>,
}

/// Remote identifiers of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemoteFile {
    /// Remote file id (may change over time).
    pub id: String,
    /// Stable unique id.
    pub unique_id: String,
}

/// Audio metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Audio {
    /// Duration in seconds.
    pub duration: i32,
    /// The audio file.
    pub audio: File,
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    /// Original file name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub file_name: String,
    /// The document file.
    pub document: File,
}

/// Geographic point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A photo, as a list of sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Photo {
    /// Available sizes; the first one is used for attributes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sizes: Vec<PhotoSize>,
}

/// One size of a photo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhotoSize {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// The image file.
    pub photo: File,
}

/// Video metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Video {
    /// Duration in seconds.
    pub duration: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// The video file.
    pub video: File,
}

/// Chat metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chat {
    /// Chat id.
    pub id: i64,
    /// Display title.
    #[cfg_attr(feature = "serde", serde(default))]
    pub title: String,
    /// Chat kind.
    pub chat_type: ChatType,
}

/// Kind of a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum ChatType {
    /// One-to-one chat.
    Private,
    /// Legacy small group.
    BasicGroup,
    /// Supergroup or broadcast channel.
    Supergroup {
        /// Supergroup id (differs from the chat id).
        supergroup_id: i64,
        /// True for broadcast channels.
        #[cfg_attr(feature = "serde", serde(default))]
        is_channel: bool,
    },
    /// Secret chat.
    Secret,
}

/// Supergroup metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Supergroup {
    /// Supergroup id.
    pub id: i64,
    /// Active public usernames, primary first.
    #[cfg_attr(feature = "serde", serde(default))]
    pub active_usernames: Vec<String>,
    /// Number of members.
    #[cfg_attr(feature = "serde", serde(default))]
    pub member_count: i32,
    /// True for broadcast channels.
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_channel: bool,
}

/// Extended supergroup metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SupergroupFullInfo {
    /// Free-form description set by the owners.
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
}
