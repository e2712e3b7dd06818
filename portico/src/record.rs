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

//! The metadata row describing one image within a group.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One image within a named group.
///
/// The record is the durable description of a blob: where it lives, how it is
/// ordered inside its group, and whether it is the group's title (cover)
/// image. Identity and position are decoupled: `id` keeps the order suffix it
/// was minted with even after later reconciliations renumber `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// The partition identifier, e.g. a project gallery name.
    #[serde(rename = "image_group")]
    pub group: String,
    /// Unique within the group, conventionally `{group}-{order-at-mint}`.
    #[serde(rename = "image_id")]
    pub id: String,
    /// Location of the image bytes in the blob store.
    #[serde(rename = "s3_url")]
    pub url: String,
    /// Caller-supplied metadata, opaque to Portico.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Whether this record is the group's representative image. At most one
    /// record per group is the title after any reconciliation.
    #[serde(default)]
    pub is_title: bool,
    /// Display sequence, contiguous `1..=N` after reconciliation. `0` marks a
    /// record that has never been assigned a position.
    #[serde(default)]
    pub order: i64,
}

impl ImageRecord {
    /// Creates a record for a freshly minted image at the given position.
    pub fn new(group: &str, order: i64) -> Self {
        ImageRecord {
            group: group.to_string(),
            id: format!("{}-{}", group, order),
            url: String::new(),
            metadata: Map::new(),
            is_title: false,
            order,
        }
    }
}
