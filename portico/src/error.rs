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

//! Portico error types

use std::error;
use std::fmt::{Display, Formatter};
use std::io;
use std::result;

/// Result type for operations that could result in a [PorticoError]
pub type Result<T> = result::Result<T, PorticoError>;

/// Portico error
#[derive(Debug)]
pub enum PorticoError {
    /// Error returned when the caller supplied a bad or missing input, such
    /// as an empty group identifier or an unreadable file payload.
    InvalidArgument(String),
    /// Error returned when the referenced group or record does not exist.
    NotFound(String),
    /// Error returned when the supplied credentials are not valid.
    Unauthorized(String),
    /// Error returned when the supplied token is missing, expired, or its
    /// signature does not verify.
    Unauthenticated(String),
    /// Error returned when a call to the blob store, record store, or
    /// notification service fails. Carries the underlying service detail.
    Store(String),
    /// Error returned when serde_json failed to serialize or deserialize data.
    SerdeJson(serde_json::Error),
    /// Error associated to I/O operations and associated traits.
    IoError(io::Error),
    /// Error returned as a consequence of a bug in Portico. This error should
    /// not happen in normal usage.
    Internal(String),
}

impl From<io::Error> for PorticoError {
    fn from(e: io::Error) -> Self {
        PorticoError::IoError(e)
    }
}

impl From<serde_json::Error> for PorticoError {
    fn from(e: serde_json::Error) -> Self {
        PorticoError::SerdeJson(e)
    }
}

impl From<&str> for PorticoError {
    fn from(e: &str) -> Self {
        PorticoError::Internal(e.to_string())
    }
}

impl Display for PorticoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            PorticoError::InvalidArgument(ref desc) => write!(f, "Invalid argument: {}", desc),
            PorticoError::NotFound(ref desc) => write!(f, "Not found: {}", desc),
            PorticoError::Unauthorized(ref desc) => write!(f, "Unauthorized: {}", desc),
            PorticoError::Unauthenticated(ref desc) => write!(f, "Unauthenticated: {}", desc),
            PorticoError::Store(ref desc) => write!(f, "Store error: {}", desc),
            PorticoError::SerdeJson(ref desc) => write!(f, "serde_json error: {:?}", desc),
            PorticoError::IoError(ref desc) => write!(f, "IO error: {}", desc),
            PorticoError::Internal(ref desc) => write!(
                f,
                "Internal error: {}. This was likely caused by a bug in Portico's \
                    code and we would welcome that you file a bug report in our issue tracker",
                desc
            ),
        }
    }
}

impl error::Error for PorticoError {}
