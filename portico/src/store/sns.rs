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

//! The AWS SNS implementation of the notifier.

use crate::config::PorticoConfig;
use crate::error::{PorticoError, Result};
use crate::store::Notifier;
use async_trait::async_trait;
use rusoto_sns::{PublishInput, Sns, SnsClient};

/// Consult-request notifications through one SNS topic.
pub struct SnsNotifier {
    client: SnsClient,
    topic_arn: String,
}

impl SnsNotifier {
    /// Creates a notifier over the configured topic.
    pub fn new(config: &PorticoConfig) -> Self {
        SnsNotifier {
            client: SnsClient::new(config.aws_region()),
            topic_arn: config.topic_arn.clone(),
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, message: &str) -> Result<String> {
        let resp = self
            .client
            .publish(PublishInput {
                message: message.to_owned(),
                topic_arn: Some(self.topic_arn.clone()),
                ..Default::default()
            })
            .await
            .map_err(|e| PorticoError::Store(e.to_string()))?;
        resp.message_id
            .ok_or_else(|| PorticoError::Store("publish returned no message id".to_string()))
    }
}
