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

//! Read-only queries over one image group.

use crate::error::{PorticoError, Result};
use crate::record::ImageRecord;
use crate::store::Services;
use itertools::Itertools;

/// Returns the group's image URLs sorted by display order.
///
/// Fails with `NotFound` when the group holds no records at all.
pub async fn list_image_urls(services: &Services, group: &str) -> Result<Vec<String>> {
    let records = services.records.query_group(group).await?;
    if records.is_empty() {
        return Err(PorticoError::NotFound(format!(
            "group {} has no images",
            group
        )));
    }
    Ok(records
        .into_iter()
        .sorted_by_key(|r| r.order)
        .map(|r| r.url)
        .collect())
}

/// Returns the group's title (cover) image.
///
/// When the single-title invariant was violated by an older writer, the
/// lowest-ordered title wins; the lookup never fails on that account. A group
/// holding exactly one record returns that record even when its flag was
/// never set. An empty group is `NotFound`.
pub async fn get_title_image(services: &Services, group: &str) -> Result<ImageRecord> {
    let records = services.records.query_group(group).await?;

    let title = records
        .iter()
        .filter(|r| r.is_title)
        .min_by_key(|r| r.order)
        .cloned();
    match title {
        Some(record) => Ok(record),
        None if records.len() == 1 => Ok(records.into_iter().next().unwrap()),
        None => Err(PorticoError::NotFound(format!(
            "group {} has no title image",
            group
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PorticoConfig;
    use crate::reconcile::{upload_group, NewImage};
    use crate::store::RecordStore;
    use crate::test_util::memory_services;
    use serde_json::Map;

    fn test_config() -> PorticoConfig {
        PorticoConfig {
            region: "ap-northeast-2".to_string(),
            endpoint: None,
            bucket: "memory".to_string(),
            key_prefix: "uploads".to_string(),
            table: "portico-test".to_string(),
            topic_arn: String::new(),
            auth_id: "admin".to_string(),
            auth_password: "pw".to_string(),
            jwt_secret: "secret".to_string(),
            token_ttl_secs: 3600,
        }
    }

    #[tokio::test]
    async fn urls_come_back_in_submission_order() {
        let (services, _, _, _) = memory_services();
        let update = upload_group(
            &services,
            &test_config(),
            "g1",
            Map::new(),
            vec![
                NewImage::new("a.jpg", vec![1]),
                NewImage::new("b.jpg", vec![2]),
                NewImage::new("c.jpg", vec![3]),
            ],
        )
        .await
        .unwrap();

        let urls = list_image_urls(&services, "g1").await.unwrap();
        assert_eq!(
            update
                .images
                .iter()
                .map(|i| i.url.clone())
                .collect::<Vec<_>>(),
            urls
        );
        assert!(urls[0].contains("a.jpg"));
        assert!(urls[2].contains("c.jpg"));
    }

    #[tokio::test]
    async fn empty_group_has_no_urls() {
        let (services, _, _, _) = memory_services();
        let result = list_image_urls(&services, "ghost").await;
        assert!(matches!(result, Err(PorticoError::NotFound(_))));
    }

    #[tokio::test]
    async fn title_lookup_edge_cases() {
        let (services, _, records, _) = memory_services();

        // Empty group: not found.
        let result = get_title_image(&services, "g1").await;
        assert!(matches!(result, Err(PorticoError::NotFound(_))));

        // A single untitled record still counts as the group's face.
        let mut only = ImageRecord::new("g1", 1);
        only.url = "https://memory.s3.amazonaws.com/uploads/g1/g1-1-a.jpg".to_string();
        records.put(&only).await.unwrap();
        assert_eq!("g1-1", get_title_image(&services, "g1").await.unwrap().id);

        // Two titles (violated invariant): lowest order wins, no error.
        let mut second = ImageRecord::new("g1", 2);
        second.is_title = true;
        records.put(&second).await.unwrap();
        let mut third = ImageRecord::new("g1", 3);
        third.is_title = true;
        records.put(&third).await.unwrap();
        assert_eq!("g1-2", get_title_image(&services, "g1").await.unwrap().id);
    }
}
