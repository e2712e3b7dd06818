// Copyright (c) 2024-present, The Portico Authors.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! The external collaborators of the reconciler, behind trait seams.
//!
//! The managed-service clients are explicitly constructed and injected
//! through [Services]; handlers and the reconciler never reach for global
//! client singletons. Tests substitute the in-memory doubles from
//! [crate::test_util].

pub mod dynamodb;
pub mod s3;
pub mod sns;

use crate::config::PorticoConfig;
use crate::error::Result;
use crate::record::ImageRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Key-addressable binary storage for image bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes the body under `key`, overwriting any previous object, and
    /// returns the public URL of the stored blob.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<String>;

    /// Removes the object under `key`. Deleting a missing key is not an
    /// error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Structured store keyed by `(group, id)` with group-scoped scans.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns every record of the group, in no particular order.
    async fn query_group(&self, group: &str) -> Result<Vec<ImageRecord>>;

    /// Writes one record, overwriting any previous version.
    async fn put(&self, record: &ImageRecord) -> Result<()>;

    /// Removes one record. Deleting a missing record is not an error.
    async fn delete(&self, group: &str, id: &str) -> Result<()>;
}

/// Pub/sub notification service.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publishes a message and returns the provider's message id.
    async fn publish(&self, message: &str) -> Result<String>;
}

/// The injected bundle of store handles one request operates on.
#[derive(Clone)]
pub struct Services {
    /// Image bytes.
    pub blobs: Arc<dyn BlobStore>,
    /// Image records.
    pub records: Arc<dyn RecordStore>,
    /// Consult-request notifications.
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// Bundles explicit store handles.
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Services {
            blobs,
            records,
            notifier,
        }
    }

    /// Constructs the production AWS-backed stores from one configuration.
    pub fn from_aws(config: &PorticoConfig) -> Self {
        Services {
            blobs: Arc::new(s3::S3BlobStore::new(config)),
            records: Arc::new(dynamodb::DynamoRecordStore::new(config)),
            notifier: Arc::new(sns::SnsNotifier::new(config)),
        }
    }
}

/// Recovers the blob-store key from a stored URL of the form
/// `https://{bucket}.s3.amazonaws.com/{key}`. Returns `None` for URLs that
/// do not point into the blob store, in which case no blob cleanup is
/// attempted for the record.
pub fn key_from_url(url: &str) -> Option<String> {
    url.split_once(".amazonaws.com/")
        .map(|(_, key)| key.to_string())
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_from_url_round_trip() {
        let url = "https://portico-images.s3.amazonaws.com/uploads/g1/g1-3-x.jpg";
        assert_eq!(Some("uploads/g1/g1-3-x.jpg".to_string()), key_from_url(url));
    }

    #[test]
    fn key_from_url_rejects_foreign_urls() {
        assert_eq!(None, key_from_url("https://example.com/x.jpg"));
        assert_eq!(None, key_from_url("https://b.s3.amazonaws.com/"));
    }
}
