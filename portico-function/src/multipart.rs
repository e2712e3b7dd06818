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

//! Multipart form parsing for the manage/upload endpoints.
//!
//! API Gateway hands the whole body over at once (lambda_http has already
//! undone the base64 transport encoding), so the multer stream is a single
//! chunk. Parts with a filename become uploads; the rest are text fields.

use bytes::Bytes;
use multer::Multipart;
use portico::prelude::*;
use std::collections::HashMap;
use std::convert::Infallible;

/// A parsed multipart form: text fields by name, plus the file parts in
/// submission order.
pub struct MultipartForm {
    /// Text fields, last occurrence wins.
    pub fields: HashMap<String, String>,
    /// File parts, in the order they appeared.
    pub files: Vec<NewImage>,
}

/// Parses a multipart body against the boundary in `content_type`.
pub async fn parse(content_type: &str, body: Vec<u8>) -> Result<MultipartForm> {
    let boundary = multer::parse_boundary(content_type).map_err(|e| {
        PorticoError::InvalidArgument(format!("bad multipart content type: {}", e))
    })?;
    let stream =
        futures::stream::once(async move { Ok::<Bytes, Infallible>(Bytes::from(body)) });
    let mut multipart = Multipart::new(stream, boundary);

    let mut form = MultipartForm {
        fields: HashMap::new(),
        files: Vec::new(),
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PorticoError::InvalidArgument(format!("bad multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let bytes = field.bytes().await.map_err(|e| {
                    PorticoError::InvalidArgument(format!("unreadable file {}: {}", filename, e))
                })?;
                form.files.push(NewImage::new(&filename, bytes.to_vec()));
            }
            None => {
                let text = field.text().await.map_err(|e| {
                    PorticoError::InvalidArgument(format!("unreadable field {}: {}", name, e))
                })?;
                form.fields.insert(name, text);
            }
        }
    }
    Ok(form)
}
