//! Chat message to event conversion.
//!
//! Pure transformation, no I/O. Every event gets a fresh id, the spec
//! version, a shard-specific type and two base attributes (message id and
//! origination time). Content-specific attributes are added per variant.
//! Every variant that carries user text goes through [`convert_text`],
//! which is also where the `#nobot` veto is enforced.

pub mod attributes;

use self::attributes::*;
use crate::error::ConvertError;
use crate::tags::contains_no_bot_tag;
use chanrelay_proto::{
    Audio, AttributeValue, Document, Event, File, FormattedText, Location, Message,
    MessageContent, PhotoSize, Video,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Converts chat messages into events for one shard.
#[derive(Debug, Clone)]
pub struct EventConverter {
    event_type: String,
}

impl EventConverter {
    /// Create a converter stamping `shard_index` into the event type.
    pub fn new(shard_index: u16) -> Self {
        Self {
            event_type: event_type(shard_index),
        }
    }

    /// Convert a message, logging and swallowing drop reasons.
    ///
    /// `source` is the channel link; it may be empty when the channel is not
    /// (yet) in the joined registry.
    pub fn convert(&self, source: &str, msg: &Message) -> Option<Event> {
        match self.try_convert(source, msg) {
            Ok(evt) => {
                debug!(
                    message_id = msg.id,
                    chat_id = msg.chat_id,
                    event_id = %evt.id,
                    source = %evt.source,
                    "Converted message to event"
                );
                Some(evt)
            }
            Err(e @ ConvertError::Unsupported(_)) => {
                info!(message_id = msg.id, chat_id = msg.chat_id, "{}", e);
                crate::metrics::record_drop(e.reason());
                None
            }
            Err(e) => {
                warn!(
                    message_id = msg.id,
                    chat_id = msg.chat_id,
                    error = %e,
                    "Dropping message"
                );
                crate::metrics::record_drop(e.reason());
                None
            }
        }
    }

    /// Convert a message, returning the drop reason as an error.
    pub fn try_convert(&self, source: &str, msg: &Message) -> Result<Event, ConvertError> {
        let time = DateTime::<Utc>::from_timestamp(msg.date, 0).unwrap_or_default();
        let mut evt = Event::new(Uuid::new_v4().to_string(), source, self.event_type.as_str())
            .with_attribute(ATTR_MESSAGE_ID, AttributeValue::String(msg.id.to_string()))
            .with_attribute(ATTR_TIME, AttributeValue::Timestamp(time));

        match &msg.content {
            MessageContent::Audio { audio, caption } => {
                convert_audio(audio, &mut evt);
                convert_text(caption, &mut evt)?;
            }
            MessageContent::Document { document, caption } => {
                convert_document(document, &mut evt);
                convert_text(caption, &mut evt)?;
            }
            MessageContent::Location { location } => {
                convert_location(location, &mut evt);
            }
            MessageContent::Photo { photo, caption } => {
                if let Some(size) = photo.sizes.first() {
                    convert_image(size, &mut evt);
                }
                convert_text(caption, &mut evt)?;
            }
            MessageContent::Text { text } => {
                convert_text(text, &mut evt)?;
            }
            MessageContent::Video { video, caption } => {
                convert_video(video, &mut evt);
                convert_text(caption, &mut evt)?;
            }
            MessageContent::Unsupported { kind } => {
                return Err(ConvertError::Unsupported(kind.clone()));
            }
        }

        Ok(evt)
    }
}

fn convert_audio(audio: &Audio, evt: &mut Event) {
    convert_file(&audio.audio, evt);
    set_file_type(FileType::Audio, evt);
    evt.set_attribute(
        ATTR_FILE_MEDIA_DURATION,
        AttributeValue::Integer(audio.duration),
    );
}

fn convert_document(doc: &Document, evt: &mut Event) {
    convert_file(&doc.document, evt);
    set_file_type(FileType::Document, evt);
}

fn convert_location(loc: &Location, evt: &mut Event) {
    evt.set_attribute(
        ATTR_LATITUDE,
        AttributeValue::String(format!("{:.6}", loc.latitude)),
    );
    evt.set_attribute(
        ATTR_LONGITUDE,
        AttributeValue::String(format!("{:.6}", loc.longitude)),
    );
}

fn convert_image(size: &PhotoSize, evt: &mut Event) {
    convert_file(&size.photo, evt);
    set_file_type(FileType::Image, evt);
    evt.set_attribute(ATTR_FILE_IMG_HEIGHT, AttributeValue::Integer(size.height));
    evt.set_attribute(ATTR_FILE_IMG_WIDTH, AttributeValue::Integer(size.width));
}

fn convert_video(video: &Video, evt: &mut Event) {
    convert_file(&video.video, evt);
    set_file_type(FileType::Video, evt);
    evt.set_attribute(
        ATTR_FILE_MEDIA_DURATION,
        AttributeValue::Integer(video.duration),
    );
    evt.set_attribute(ATTR_FILE_IMG_HEIGHT, AttributeValue::Integer(video.height));
    evt.set_attribute(ATTR_FILE_IMG_WIDTH, AttributeValue::Integer(video.width));
}

/// Shared text step: veto on `#nobot`, otherwise the text becomes the body.
fn convert_text(text: &FormattedText, evt: &mut Event) -> Result<(), ConvertError> {
    if contains_no_bot_tag(&text.text) {
        return Err(ConvertError::NoBotTag);
    }
    evt.data = Some(text.text.clone());
    Ok(())
}

fn convert_file(file: &File, evt: &mut Event) {
    // Files that were never uploaded have no remote ids.
    if let Some(remote) = &file.remote {
        evt.set_attribute(ATTR_FILE_ID, AttributeValue::String(remote.id.clone()));
        evt.set_attribute(
            ATTR_FILE_UNIQUE_ID,
            AttributeValue::String(remote.unique_id.clone()),
        );
    }
}

fn set_file_type(file_type: FileType, evt: &mut Event) {
    evt.set_attribute(ATTR_FILE_TYPE, AttributeValue::Integer(file_type.code()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanrelay_proto::{Photo, RemoteFile};

    fn message(content: MessageContent) -> Message {
        Message {
            id: 42,
            chat_id: -1001,
            date: 1_700_000_000,
            is_outgoing: false,
            content,
        }
    }

    fn remote_file(id: &str) -> File {
        File {
            id: 1,
            remote: Some(RemoteFile {
                id: id.to_string(),
                unique_id: format!("{id}-unique"),
            }),
        }
    }

    fn caption(text: &str) -> FormattedText {
        FormattedText::new(text)
    }

    #[test]
    fn text_message_becomes_body_with_base_attributes() {
        let conv = EventConverter::new(2);
        let evt = conv
            .try_convert("@news", &message(MessageContent::Text { text: caption("hello world") }))
            .unwrap();

        assert_eq!(evt.text(), Some("hello world"));
        assert_eq!(evt.source, "@news");
        assert_eq!(evt.spec_version, "1.0");
        assert_eq!(evt.event_type, "com.chanrelay.source-2.v1");
        assert_eq!(evt.string_attribute(ATTR_MESSAGE_ID), Some("42"));
        assert_eq!(
            evt.timestamp_attribute(ATTR_TIME).map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert!(evt.attribute(ATTR_FILE_TYPE).is_none());
        assert!(evt.attribute(ATTR_FILE_ID).is_none());
        assert_eq!(evt.attributes.len(), 2);
    }

    #[test]
    fn event_ids_are_unique() {
        let conv = EventConverter::new(0);
        let msg = message(MessageContent::Text { text: caption("a") });
        let a = conv.try_convert("", &msg).unwrap();
        let b = conv.try_convert("", &msg).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn no_bot_tag_vetoes_every_text_bearing_variant() {
        let conv = EventConverter::new(0);
        let tagged = caption("hello #nobot");
        let contents = vec![
            MessageContent::Text { text: tagged.clone() },
            MessageContent::Audio {
                audio: Audio::default(),
                caption: tagged.clone(),
            },
            MessageContent::Document {
                document: Document::default(),
                caption: tagged.clone(),
            },
            MessageContent::Photo {
                photo: Photo::default(),
                caption: tagged.clone(),
            },
            MessageContent::Video {
                video: Video::default(),
                caption: tagged.clone(),
            },
        ];
        for content in contents {
            let kind = content.kind().to_string();
            let result = conv.try_convert("@news", &message(content.clone()));
            assert_eq!(result, Err(ConvertError::NoBotTag), "{kind}");
            assert!(conv.convert("@news", &message(content)).is_none(), "{kind}");
        }
    }

    #[test]
    fn tag_must_be_a_standalone_token() {
        let conv = EventConverter::new(0);
        let evt = conv
            .try_convert("", &message(MessageContent::Text { text: caption("#nobots here") }))
            .unwrap();
        assert_eq!(evt.text(), Some("#nobots here"));
    }

    #[test]
    fn unsupported_content_is_dropped() {
        let conv = EventConverter::new(0);
        let msg = message(MessageContent::Unsupported {
            kind: "messageSticker".to_string(),
        });
        assert_eq!(
            conv.try_convert("", &msg),
            Err(ConvertError::Unsupported("messageSticker".to_string()))
        );
        assert!(conv.convert("", &msg).is_none());
    }

    #[test]
    fn photo_uses_first_size() {
        let conv = EventConverter::new(0);
        let photo = Photo {
            sizes: vec![
                PhotoSize {
                    width: 320,
                    height: 240,
                    photo: remote_file("small"),
                },
                PhotoSize {
                    width: 1280,
                    height: 960,
                    photo: remote_file("large"),
                },
            ],
        };
        let evt = conv
            .try_convert(
                "@news",
                &message(MessageContent::Photo {
                    photo,
                    caption: caption("pic"),
                }),
            )
            .unwrap();

        assert_eq!(evt.text(), Some("pic"));
        assert_eq!(evt.integer_attribute(ATTR_FILE_TYPE), Some(FileType::Image.code()));
        assert_eq!(evt.integer_attribute(ATTR_FILE_IMG_WIDTH), Some(320));
        assert_eq!(evt.integer_attribute(ATTR_FILE_IMG_HEIGHT), Some(240));
        assert_eq!(evt.string_attribute(ATTR_FILE_ID), Some("small"));
        assert_eq!(evt.string_attribute(ATTR_FILE_UNIQUE_ID), Some("small-unique"));
    }

    #[test]
    fn photo_without_sizes_keeps_caption() {
        let conv = EventConverter::new(0);
        let evt = conv
            .try_convert(
                "",
                &message(MessageContent::Photo {
                    photo: Photo::default(),
                    caption: caption("pic"),
                }),
            )
            .unwrap();
        assert_eq!(evt.text(), Some("pic"));
        assert!(evt.attribute(ATTR_FILE_TYPE).is_none());
    }

    #[test]
    fn video_sets_media_attributes() {
        let conv = EventConverter::new(0);
        let video = Video {
            duration: 61,
            width: 1920,
            height: 1080,
            video: remote_file("vid"),
        };
        let evt = conv
            .try_convert(
                "",
                &message(MessageContent::Video {
                    video,
                    caption: caption(""),
                }),
            )
            .unwrap();
        assert_eq!(evt.integer_attribute(ATTR_FILE_TYPE), Some(FileType::Video.code()));
        assert_eq!(evt.integer_attribute(ATTR_FILE_MEDIA_DURATION), Some(61));
        assert_eq!(evt.integer_attribute(ATTR_FILE_IMG_WIDTH), Some(1920));
        assert_eq!(evt.integer_attribute(ATTR_FILE_IMG_HEIGHT), Some(1080));
        // Empty caption still produces a body.
        assert_eq!(evt.text(), Some(""));
    }

    #[test]
    fn missing_remote_file_omits_file_ids() {
        let conv = EventConverter::new(0);
        let audio = Audio {
            duration: 30,
            audio: File::default(),
        };
        let evt = conv
            .try_convert(
                "",
                &message(MessageContent::Audio {
                    audio,
                    caption: caption("song"),
                }),
            )
            .unwrap();
        assert_eq!(evt.integer_attribute(ATTR_FILE_TYPE), Some(FileType::Audio.code()));
        assert_eq!(evt.integer_attribute(ATTR_FILE_MEDIA_DURATION), Some(30));
        assert!(evt.attribute(ATTR_FILE_ID).is_none());
        assert!(evt.attribute(ATTR_FILE_UNIQUE_ID).is_none());
    }

    #[test]
    fn document_sets_file_type() {
        let conv = EventConverter::new(0);
        let document = Document {
            file_name: "report.pdf".into(),
            document: remote_file("doc"),
        };
        let evt = conv
            .try_convert(
                "",
                &message(MessageContent::Document {
                    document,
                    caption: caption("report"),
                }),
            )
            .unwrap();
        assert_eq!(evt.integer_attribute(ATTR_FILE_TYPE), Some(FileType::Document.code()));
        assert_eq!(evt.string_attribute(ATTR_FILE_ID), Some("doc"));
        assert_eq!(evt.text(), Some("report"));
    }

    #[test]
    fn location_has_coordinates_but_no_body() {
        let conv = EventConverter::new(0);
        let evt = conv
            .try_convert(
                "",
                &message(MessageContent::Location {
                    location: Location {
                        latitude: 52.52,
                        longitude: 13.405,
                    },
                }),
            )
            .unwrap();
        assert_eq!(evt.string_attribute(ATTR_LATITUDE), Some("52.520000"));
        assert_eq!(evt.string_attribute(ATTR_LONGITUDE), Some("13.405000"));
        assert!(!evt.has_body());
    }
}
