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

#![warn(missing_docs, clippy::needless_borrow)]

//! Portico manages ordered image groups for a portfolio site: image bytes in
//! a blob store (S3), one metadata record per image in a record store
//! (DynamoDB), consult-request notifications over SNS, and a minimal JWT
//! login flow. The core is the image-group reconciler in [reconcile], which
//! turns one manage request (deletions, patches, uploads) into the group's
//! final display order plus the store mutations realizing it.

pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;
pub mod query;
pub mod reconcile;
pub mod record;
pub mod store;
pub mod test_util;
