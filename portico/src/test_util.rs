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

//! In-memory store doubles for tests.
//!
//! The blob and record fakes can be told to fail individual keys, which is
//! how the partial-failure aggregation of the mutation executor gets
//! exercised without a real AWS account.

use crate::error::{PorticoError, Result};
use crate::record::ImageRecord;
use crate::store::{BlobStore, Notifier, RecordStore, Services};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A [BlobStore] over a mutex-guarded map.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_keys: Mutex<HashSet<String>>,
}

impl MemoryBlobStore {
    /// Creates an empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later operation on `key` fail with a store error.
    pub fn fail_on(&self, key: &str) {
        self.fail_keys.lock().unwrap().insert(key.to_string());
    }

    /// Whether an object is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<String> {
        if self.fail_keys.lock().unwrap().contains(key) {
            return Err(PorticoError::Store(format!("injected put failure: {}", key)));
        }
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(format!("https://memory.s3.amazonaws.com/{}", key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fail_keys.lock().unwrap().contains(key) {
            return Err(PorticoError::Store(format!(
                "injected delete failure: {}",
                key
            )));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// A [RecordStore] over a mutex-guarded map keyed by `(group, id)`.
#[derive(Default)]
pub struct MemoryRecordStore {
    items: Mutex<HashMap<(String, String), ImageRecord>>,
    fail_ids: Mutex<HashSet<String>>,
    fail_groups: Mutex<HashSet<String>>,
}

impl MemoryRecordStore {
    /// Creates an empty record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later put/delete of the record `id` fail.
    pub fn fail_on(&self, id: &str) {
        self.fail_ids.lock().unwrap().insert(id.to_string());
    }

    /// Makes every later query of `group` fail with a store error.
    pub fn fail_on_query(&self, group: &str) {
        self.fail_groups.lock().unwrap().insert(group.to_string());
    }

    /// Number of stored records across all groups.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn query_group(&self, group: &str) -> Result<Vec<ImageRecord>> {
        if self.fail_groups.lock().unwrap().contains(group) {
            return Err(PorticoError::Store(format!(
                "injected query failure: {:?}",
                group
            )));
        }
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.group == group)
            .cloned()
            .collect())
    }

    async fn put(&self, record: &ImageRecord) -> Result<()> {
        if self.fail_ids.lock().unwrap().contains(&record.id) {
            return Err(PorticoError::Store(format!(
                "injected put failure: {}",
                record.id
            )));
        }
        self.items
            .lock()
            .unwrap()
            .insert((record.group.clone(), record.id.clone()), record.clone());
        Ok(())
    }

    async fn delete(&self, group: &str, id: &str) -> Result<()> {
        if self.fail_ids.lock().unwrap().contains(id) {
            return Err(PorticoError::Store(format!("injected delete failure: {}", id)));
        }
        self.items
            .lock()
            .unwrap()
            .remove(&(group.to_string(), id.to_string()));
        Ok(())
    }
}

/// A [Notifier] that records published messages.
#[derive(Default)]
pub struct MemoryNotifier {
    published: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    /// Creates an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message published so far, oldest first.
    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn publish(&self, message: &str) -> Result<String> {
        let mut published = self.published.lock().unwrap();
        published.push(message.to_string());
        Ok(format!("msg-{}", published.len()))
    }
}

/// Bundles fresh in-memory stores into a [Services] handle, returning the
/// concrete fakes alongside so tests can seed and inspect them.
pub fn memory_services() -> (
    Services,
    Arc<MemoryBlobStore>,
    Arc<MemoryRecordStore>,
    Arc<MemoryNotifier>,
) {
    let blobs = Arc::new(MemoryBlobStore::new());
    let records = Arc::new(MemoryRecordStore::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let services = Services::new(blobs.clone(), records.clone(), notifier.clone());
    (services, blobs, records, notifier)
}
