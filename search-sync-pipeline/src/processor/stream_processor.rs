//! Stream processor implementation.
//!
//! Decides, for one change notification, whether the index needs an upsert,
//! a delete, or nothing. The decision is pure; applying it is the
//! synchronizer's job.

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::PipelineError;
use crate::processor::{identifier_text, PublicationFilter};
use search_sync_shared::{CanonicalDocument, EventType, InputError, StreamNotification};
use search_sync_wire::{decode_attribute, decode_item, decode_json, DecodeError};

/// What a notification means for the index.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Index the decoded new image.
    Upsert(CanonicalDocument),
    /// Remove the document with this identifier.
    Delete(String),
    /// Nothing to do.
    Ignore,
}

/// Processor that maps change notifications onto index actions.
///
/// | event  | old image | new image | action            |
/// |--------|-----------|-----------|-------------------|
/// | INSERT |           | published | upsert new image  |
/// | INSERT |           | other     | ignore            |
/// | MODIFY | any       | published | upsert new image  |
/// | MODIFY | published | other     | delete by key     |
/// | MODIFY | other     | other     | ignore            |
/// | REMOVE |           |           | delete by key     |
pub struct StreamProcessor {
    filter: PublicationFilter,
    id_field: String,
}

impl StreamProcessor {
    /// Create a new stream processor.
    ///
    /// # Arguments
    ///
    /// * `filter` - Status field and published value
    /// * `id_field` - Key attribute holding the document identifier
    pub fn new(filter: PublicationFilter, id_field: impl Into<String>) -> Self {
        Self {
            filter,
            id_field: id_field.into(),
        }
    }

    /// Decide what `notification` means for the index.
    ///
    /// # Returns
    ///
    /// * `Ok(SyncAction)` - The action to apply
    /// * `Err(PipelineError::InputError)` - Missing or unknown event type,
    ///   missing key or new image, or an unusable key
    /// * `Err(PipelineError::DecodeError)` - An image that cannot be decoded
    pub fn decide(&self, notification: &StreamNotification) -> Result<SyncAction, PipelineError> {
        let action = match notification.event_type()? {
            EventType::Remove => SyncAction::Delete(self.record_id(notification.keys()?)?),
            EventType::Insert => {
                let new_image = Self::required_new_image(notification)?;
                if self.image_published(new_image)? {
                    SyncAction::Upsert(decode_item(new_image)?)
                } else {
                    SyncAction::Ignore
                }
            }
            EventType::Modify => {
                let new_image = Self::required_new_image(notification)?;
                let was_published = match notification.old_image() {
                    Some(old_image) => self.image_published(old_image)?,
                    None => false,
                };

                if self.image_published(new_image)? {
                    SyncAction::Upsert(decode_item(new_image)?)
                } else if was_published {
                    SyncAction::Delete(self.record_id(notification.keys()?)?)
                } else {
                    SyncAction::Ignore
                }
            }
        };

        debug!(event = notification.log_id(), action = ?ActionKind::of(&action), "Decided stream action");
        Ok(action)
    }

    fn required_new_image(
        notification: &StreamNotification,
    ) -> Result<&Map<String, Value>, InputError> {
        notification
            .new_image()
            .ok_or_else(|| InputError::missing_field("NewImage"))
    }

    /// Whether an image's status attribute is the published value. Only the
    /// status attribute is decoded.
    fn image_published(&self, image: &Map<String, Value>) -> Result<bool, DecodeError> {
        Ok(decode_attribute(image, &self.filter.status_field)?
            .is_some_and(|status| self.filter.is_published_status(&status)))
    }

    /// Document identifier of a record key: the id attribute when the key
    /// has one, otherwise the key's only attribute.
    pub fn record_id(&self, keys: &Map<String, Value>) -> Result<String, PipelineError> {
        let (name, value) = match keys.get(&self.id_field) {
            Some(value) => (self.id_field.as_str(), value),
            None if keys.len() == 1 => keys
                .iter()
                .next()
                .map(|(name, value)| (name.as_str(), value))
                .ok_or_else(|| InputError::malformed("empty record key"))?,
            None if keys.is_empty() => return Err(InputError::malformed("empty record key").into()),
            None => {
                return Err(InputError::malformed(format!(
                    "composite record key without `{}`",
                    self.id_field
                ))
                .into())
            }
        };

        let decoded = decode_json(value).map_err(|e| e.in_field(name))?;
        identifier_text(&decoded).ok_or_else(|| {
            InputError::malformed(format!("record key `{}` is not a string or number", name)).into()
        })
    }
}

/// Loggable shape of an action without its document.
#[derive(Debug)]
enum ActionKind {
    Upsert,
    Delete,
    Ignore,
}

impl ActionKind {
    fn of(action: &SyncAction) -> Self {
        match action {
            SyncAction::Upsert(_) => Self::Upsert,
            SyncAction::Delete(_) => Self::Delete,
            SyncAction::Ignore => Self::Ignore,
        }
    }
}
