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

//! The image-group reconciler.
//!
//! One manage call reconciles deletions, field patches, and new uploads
//! against the stored state of a group, then renumbers the survivors into a
//! contiguous `1..=N` display order. The computation phase ([plan]) is pure
//! over the snapshot read; [execute] then fans the resulting mutations out to
//! the stores concurrently and aggregates every failure instead of stopping
//! at the first one.
//!
//! No lock is held between the snapshot read and the writes. Two concurrent
//! reconciliations of one group can interleave and lose an update; the
//! durable stores offer no transaction spanning both, so the executor only
//! preserves per-item ordering (blob before record) as a best effort.

use crate::config::PorticoConfig;
use crate::error::{PorticoError, Result};
use crate::record::ImageRecord;
use crate::store::{key_from_url, Services};
use futures::future::join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Content type every uploaded image is stored with.
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// One `updated_images` entry: a partial patch against an existing record.
/// A patch whose id matches no surviving record is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePatch {
    /// Id of the record to patch.
    pub id: String,
    /// New title flag, when present.
    #[serde(rename = "isTitle", default)]
    pub is_title: Option<bool>,
    /// New display position, when present. Renumbering runs afterwards, so
    /// this only has to order the record relative to its peers.
    #[serde(default)]
    pub order: Option<i64>,
}

/// One freshly uploaded image awaiting a place in the group.
#[derive(Debug, Clone)]
pub struct NewImage {
    /// Client-supplied file name, kept as the blob key tail.
    pub filename: String,
    /// The image bytes.
    pub bytes: Vec<u8>,
    /// Caller-supplied metadata stamped onto the minted record.
    pub metadata: Map<String, Value>,
}

impl NewImage {
    /// A new image with empty metadata.
    pub fn new(filename: &str, bytes: Vec<u8>) -> Self {
        NewImage {
            filename: filename.to_string(),
            bytes,
            metadata: Map::new(),
        }
    }
}

/// A blob put followed by the record put that stores its URL.
#[derive(Debug, Clone)]
pub struct BlobWrite {
    /// Blob-store key, `{prefix}/{group}/{id}-{filename}`.
    pub key: String,
    /// The image bytes.
    pub body: Vec<u8>,
    /// Content type to store the blob with.
    pub content_type: String,
    /// The minted record; its `url` is filled in from the blob put.
    pub record: ImageRecord,
}

/// A blob delete followed by the record delete for one removed image.
#[derive(Debug, Clone)]
pub struct Removal {
    /// Blob-store key, when the stored URL points into the blob store.
    pub blob_key: Option<String>,
    /// Id of the record to delete.
    pub id: String,
}

/// Every store mutation one reconciliation needs, grouped so that the
/// executor can honor per-item ordering while running items concurrently.
#[derive(Debug, Clone, Default)]
pub struct MutationPlan {
    /// The group all mutations belong to.
    pub group: String,
    /// New images: blob put, then record put.
    pub uploads: Vec<BlobWrite>,
    /// Removed images: blob delete initiated before the record delete.
    pub removals: Vec<Removal>,
    /// Surviving records whose stored `order`/`is_title` changed.
    pub rewrites: Vec<ImageRecord>,
}

impl MutationPlan {
    /// Whether the plan carries no mutations at all.
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.removals.is_empty() && self.rewrites.is_empty()
    }
}

/// One failed store mutation inside an otherwise executed plan.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    /// What was attempted, e.g. `delete blob uploads/g1/g1-1-x.jpg`.
    pub label: String,
    /// The underlying store error.
    pub reason: String,
}

/// Deterministic aggregation of everything a plan execution did. Partial
/// failure is reported in full rather than first-error-wins: every mutation
/// is attempted and lands in either `completed` or `failed`.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Labels of the mutations that succeeded.
    pub completed: Vec<String>,
    /// Every mutation that failed, with its reason.
    pub failed: Vec<Failure>,
    /// URL of each uploaded blob, keyed by record id.
    pub uploaded_urls: HashMap<String, String>,
}

impl ExecutionReport {
    /// Whether every mutation succeeded.
    pub fn ok(&self) -> bool {
        self.failed.is_empty()
    }

    fn absorb(&mut self, other: ExecutionReport) {
        self.completed.extend(other.completed);
        self.failed.extend(other.failed);
        self.uploaded_urls.extend(other.uploaded_urls);
    }
}

/// The outcome of one group mutation: the final ordered list plus the
/// execution report the HTTP layer surfaces partial failures from.
#[derive(Debug)]
pub struct GroupUpdate {
    /// The group's records after reconciliation, in display order.
    pub images: Vec<ImageRecord>,
    /// What happened to each planned mutation.
    pub report: ExecutionReport,
}

/// Computes the final ordered list and the mutation plan for one group, pure
/// over the given snapshot.
///
/// # Arguments
/// * `group` - The group identifier; must be non-empty.
/// * `snapshot` - The group's current records, as read from the record store.
/// * `deleted_ids` - Ids to remove; unknown ids are ignored (idempotent).
/// * `patches` - Partial updates against surviving records.
/// * `new_items` - Uploads appended after the survivors, in submission order.
/// * `key_prefix` - Blob-store prefix new keys are minted under.
pub fn plan(
    group: &str,
    snapshot: Vec<ImageRecord>,
    deleted_ids: &[String],
    patches: &[ImagePatch],
    new_items: Vec<NewImage>,
    key_prefix: &str,
) -> Result<(Vec<ImageRecord>, MutationPlan)> {
    if group.trim().is_empty() {
        return Err(PorticoError::InvalidArgument(
            "image group must not be empty".to_string(),
        ));
    }
    if let Some(item) = new_items.iter().find(|i| i.bytes.is_empty()) {
        return Err(PorticoError::InvalidArgument(format!(
            "uploaded file {} has an empty payload",
            item.filename
        )));
    }

    let deleted: HashSet<&str> = deleted_ids.iter().map(String::as_str).collect();
    let mut removals = Vec::new();
    let mut survivors = Vec::new();
    for record in snapshot {
        if deleted.contains(record.id.as_str()) {
            removals.push(Removal {
                blob_key: key_from_url(&record.url),
                id: record.id,
            });
        } else {
            survivors.push(record);
        }
    }

    // Stored (order, is_title) before patching, to detect which survivors
    // actually need a rewrite after renumbering.
    let stored: HashMap<String, (i64, bool)> = survivors
        .iter()
        .map(|r| (r.id.clone(), (r.order, r.is_title)))
        .collect();

    // The current title, lowest order first in case the invariant was
    // violated by an older writer.
    let mut title_id = survivors
        .iter()
        .filter(|r| r.is_title)
        .min_by_key(|r| r.order)
        .map(|r| r.id.clone());

    for patch in patches {
        let record = match survivors.iter_mut().find(|r| r.id == patch.id) {
            Some(record) => record,
            // Unknown or just-deleted id: drop the patch on the floor.
            None => continue,
        };
        if let Some(order) = patch.order {
            record.order = order;
        }
        match patch.is_title {
            Some(true) => title_id = Some(record.id.clone()),
            Some(false) if title_id.as_deref() == Some(record.id.as_str()) => title_id = None,
            _ => {}
        }
    }

    // Records that predate order tracking carry order 0 and contribute 0
    // to the max, so fresh uploads still land after everything numbered.
    let max_order = survivors.iter().map(|r| r.order.max(0)).max().unwrap_or(0);

    let existing_ids: HashSet<String> = survivors.iter().map(|r| r.id.clone()).collect();
    let mut pending: HashMap<String, (String, Vec<u8>)> = HashMap::new();
    let mut minted = Vec::new();
    let mut next = max_order;
    for (index, item) in new_items.into_iter().enumerate() {
        next += 1;
        // An id keeps its originally minted suffix forever, even after
        // renumbering moves its order below the suffix. Skip over any
        // suffix a survivor still owns.
        while existing_ids.contains(&format!("{}-{}", group, next)) {
            next += 1;
        }
        let mut record = ImageRecord::new(group, next);
        record.metadata = item.metadata;
        if index == 0 && title_id.is_none() {
            title_id = Some(record.id.clone());
        }
        let key = format!("{}/{}/{}-{}", key_prefix, group, record.id, item.filename);
        pending.insert(record.id.clone(), (key, item.bytes));
        minted.push(record);
    }

    let mut finals = survivors;
    finals.extend(minted);
    finals.sort_by_key(|r| r.order);
    for (index, record) in finals.iter_mut().enumerate() {
        record.order = index as i64 + 1;
        record.is_title = title_id.as_deref() == Some(record.id.as_str());
    }

    let mut uploads = Vec::new();
    let mut rewrites = Vec::new();
    for record in &finals {
        if let Some((key, body)) = pending.remove(&record.id) {
            uploads.push(BlobWrite {
                key,
                body,
                content_type: IMAGE_CONTENT_TYPE.to_string(),
                record: record.clone(),
            });
        } else if stored[&record.id] != (record.order, record.is_title) {
            rewrites.push(record.clone());
        }
    }

    Ok((
        finals,
        MutationPlan {
            group: group.to_string(),
            uploads,
            removals,
            rewrites,
        },
    ))
}

/// Executes every mutation of the plan against the stores.
///
/// Independent items run concurrently. Within one item, a blob put completes
/// before the record storing its URL is written, and a record delete is not
/// issued before its blob delete was initiated.
/// Nothing is rolled back; the report says exactly what happened.
pub async fn execute(services: &Services, plan: MutationPlan) -> ExecutionReport {
    let group = plan.group;

    let uploads = plan
        .uploads
        .into_iter()
        .map(|write| upload_one(services, write));
    let removals = plan
        .removals
        .into_iter()
        .map(|removal| remove_one(services, group.clone(), removal));
    let rewrites = plan
        .rewrites
        .into_iter()
        .map(|record| rewrite_one(services, record));

    let (uploaded, removed, rewritten) =
        futures::join!(join_all(uploads), join_all(removals), join_all(rewrites));

    let mut report = ExecutionReport::default();
    for partial in uploaded.into_iter().chain(removed).chain(rewritten) {
        report.absorb(partial);
    }
    if !report.ok() {
        warn!(
            "group {}: {} of {} mutations failed",
            group,
            report.failed.len(),
            report.failed.len() + report.completed.len()
        );
    }
    report
}

async fn upload_one(services: &Services, write: BlobWrite) -> ExecutionReport {
    let mut report = ExecutionReport::default();
    let blob_label = format!("put blob {}", write.key);
    let url = match services
        .blobs
        .put(&write.key, write.body, &write.content_type)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            // Without the blob there is no URL to store; skip the record
            // put rather than persisting a dangling reference.
            report.failed.push(Failure {
                label: blob_label,
                reason: e.to_string(),
            });
            return report;
        }
    };
    report.completed.push(blob_label);

    let mut record = write.record;
    record.url = url.clone();
    let record_label = format!("put record {}", record.id);
    match services.records.put(&record).await {
        Ok(()) => {
            report.completed.push(record_label);
            report.uploaded_urls.insert(record.id, url);
        }
        Err(e) => report.failed.push(Failure {
            label: record_label,
            reason: e.to_string(),
        }),
    }
    report
}

async fn remove_one(services: &Services, group: String, removal: Removal) -> ExecutionReport {
    let mut report = ExecutionReport::default();
    if let Some(key) = removal.blob_key {
        let label = format!("delete blob {}", key);
        match services.blobs.delete(&key).await {
            Ok(()) => report.completed.push(label),
            Err(e) => report.failed.push(Failure {
                label,
                reason: e.to_string(),
            }),
        }
    }
    // Best effort only: the record goes away even when the blob delete
    // failed, otherwise the group keeps resurrecting a half-deleted image.
    let label = format!("delete record {}", removal.id);
    match services.records.delete(&group, &removal.id).await {
        Ok(()) => report.completed.push(label),
        Err(e) => report.failed.push(Failure {
            label,
            reason: e.to_string(),
        }),
    }
    report
}

async fn rewrite_one(services: &Services, record: ImageRecord) -> ExecutionReport {
    let mut report = ExecutionReport::default();
    let label = format!("put record {}", record.id);
    match services.records.put(&record).await {
        Ok(()) => report.completed.push(label),
        Err(e) => report.failed.push(Failure {
            label,
            reason: e.to_string(),
        }),
    }
    report
}

/// Reconciles one group end to end: snapshot read, plan, execute.
///
/// A group with nothing stored and nothing to add yields an empty list, not
/// an error, so repeating a manage call is harmless.
pub async fn manage_group(
    services: &Services,
    config: &PorticoConfig,
    group: &str,
    deleted_ids: &[String],
    patches: &[ImagePatch],
    new_items: Vec<NewImage>,
) -> Result<GroupUpdate> {
    // Validated here as well so a bad group never reaches the record store,
    // where an empty partition key fails as an opaque service error.
    if group.trim().is_empty() {
        return Err(PorticoError::InvalidArgument(
            "image group must not be empty".to_string(),
        ));
    }
    let snapshot = services.records.query_group(group).await?;
    info!(
        "managing group {}: {} stored, {} deleted, {} patched, {} new",
        group,
        snapshot.len(),
        deleted_ids.len(),
        patches.len(),
        new_items.len()
    );

    let (mut images, mutations) = plan(
        group,
        snapshot,
        deleted_ids,
        patches,
        new_items,
        &config.key_prefix,
    )?;
    let report = execute(services, mutations).await;

    for image in images.iter_mut().filter(|i| i.url.is_empty()) {
        if let Some(url) = report.uploaded_urls.get(&image.id) {
            image.url = url.clone();
        }
    }
    Ok(GroupUpdate { images, report })
}

/// Appends a batch of uploads to a group, stamping the shared metadata on
/// every minted record. The first image stored into an empty group becomes
/// its title.
pub async fn upload_group(
    services: &Services,
    config: &PorticoConfig,
    group: &str,
    metadata: Map<String, Value>,
    files: Vec<NewImage>,
) -> Result<GroupUpdate> {
    if files.is_empty() {
        return Err(PorticoError::InvalidArgument(
            "image_group or files are missing".to_string(),
        ));
    }
    let files = files
        .into_iter()
        .map(|mut f| {
            f.metadata = metadata.clone();
            f
        })
        .collect();
    manage_group(services, config, group, &[], &[], files).await
}

/// Deletes every record and blob of a group. Returns the number of records
/// that were stored, or `NotFound` when the group holds none.
pub async fn delete_group(services: &Services, group: &str) -> Result<(usize, ExecutionReport)> {
    if group.trim().is_empty() {
        return Err(PorticoError::InvalidArgument(
            "image group must not be empty".to_string(),
        ));
    }
    let snapshot = services.records.query_group(group).await?;
    if snapshot.is_empty() {
        return Err(PorticoError::NotFound(format!(
            "group {} has no records",
            group
        )));
    }

    let count = snapshot.len();
    let removals = snapshot
        .into_iter()
        .map(|record| Removal {
            blob_key: key_from_url(&record.url),
            id: record.id,
        })
        .collect();
    let report = execute(
        services,
        MutationPlan {
            group: group.to_string(),
            removals,
            ..Default::default()
        },
    )
    .await;
    Ok((count, report))
}
