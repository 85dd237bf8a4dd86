//! Attachment point lookup

use async_trait::async_trait;

use crate::model::AttachmentPoint;

/// Resolves instances and interface ids to attachment points
#[async_trait]
pub trait AttachmentPointResolver: Send + Sync {
    /// All attachment points owned by an instance (possibly none)
    async fn for_instance(&self, instance_id: &str)
    -> Result<Vec<AttachmentPoint>, crate::Error>;

    /// One attachment point by id
    ///
    /// Returns `Err(Error::NotFound)` if it does not exist.
    async fn get(&self, attachment_point_id: &str) -> Result<AttachmentPoint, crate::Error>;
}
