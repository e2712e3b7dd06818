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

//! A "prelude" for users of the portico crate.
//!
//! Like the standard library's prelude, this module simplifies importing of
//! common items. Unlike the standard prelude, the contents of this module must
//! be imported manually:
//!
//! ```
//! use portico::prelude::*;
//! ```

pub use crate::auth::{bearer_token, login, verify, Claims};
pub use crate::config::PorticoConfig;
pub use crate::error::{PorticoError, Result};
pub use crate::query::{get_title_image, list_image_urls};
pub use crate::reconcile::{
    delete_group, manage_group, upload_group, ExecutionReport, GroupUpdate, ImagePatch,
    MutationPlan, NewImage,
};
pub use crate::record::ImageRecord;
pub use crate::store::{BlobStore, Notifier, RecordStore, Services};
