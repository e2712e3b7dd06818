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

//! The AWS S3 implementation of the blob store.

use crate::config::PorticoConfig;
use crate::error::{PorticoError, Result};
use crate::store::BlobStore;
use async_trait::async_trait;
use rusoto_core::ByteStream;
use rusoto_s3::{DeleteObjectRequest, PutObjectRequest, S3Client, S3};

/// Image blobs in one S3 bucket.
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    /// Creates a blob store over the configured bucket.
    pub fn new(config: &PorticoConfig) -> Self {
        S3BlobStore {
            client: S3Client::new(config.aws_region()),
            bucket: config.bucket.clone(),
        }
    }

    /// The public URL objects in this bucket are served from.
    fn url_of(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<String> {
        self.client
            .put_object(PutObjectRequest {
                bucket: self.bucket.clone(),
                key: key.to_owned(),
                body: Some(ByteStream::from(body)),
                content_type: Some(content_type.to_owned()),
                ..Default::default()
            })
            .await
            .map_err(|e| PorticoError::Store(e.to_string()))?;
        Ok(self.url_of(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object(DeleteObjectRequest {
                bucket: self.bucket.clone(),
                key: key.to_owned(),
                ..Default::default()
            })
            .await
            .map_err(|e| PorticoError::Store(e.to_string()))
            .map(|_| ())
    }
}
