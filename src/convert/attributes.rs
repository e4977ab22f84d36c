//! Event attribute keys and value constants.

/// Event type, parameterised by the shard index.
pub fn event_type(shard_index: u16) -> String {
    format!("com.chanrelay.source-{}.v1", shard_index)
}

pub const ATTR_MESSAGE_ID: &str = "tgmessageid";
pub const ATTR_TIME: &str = "time";
pub const ATTR_LATITUDE: &str = "latitude";
pub const ATTR_LONGITUDE: &str = "longitude";

// File attributes
pub const ATTR_FILE_ID: &str = "tgfileid";
pub const ATTR_FILE_UNIQUE_ID: &str = "tgfileuniqueid";
pub const ATTR_FILE_MEDIA_DURATION: &str = "tgfilemediaduration";
pub const ATTR_FILE_IMG_HEIGHT: &str = "tgfileimgheight";
pub const ATTR_FILE_IMG_WIDTH: &str = "tgfileimgwidth";
pub const ATTR_FILE_TYPE: &str = "tgfiletype";

/// Kind of file attached to a message, encoded as an integer attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FileType {
    Undefined = 0,
    Audio = 1,
    Document = 2,
    Image = 3,
    Video = 4,
}

impl FileType {
    /// Integer attribute value.
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }
}
