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

//! The Lambda entry point of the Portico gallery API.
//!
//! Configuration and the AWS clients are built once per sandbox and shared
//! across invocations.

mod multipart;
mod router;

use lambda_http::{run, service_fn, Error};
use portico::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Error> {
    env_logger::init();
    let config = PorticoConfig::from_env()?;
    let services = Services::from_aws(&config);
    run(service_fn(|event| router::route(&config, &services, event))).await
}
