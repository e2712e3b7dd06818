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

//! Configuration settings that affect all crates in current system.
//!
//! Defaults ship in `config.toml` and are compiled into the binary; every
//! value can be overridden per process through environment variables. The
//! resulting [PorticoConfig] is an explicitly constructed handle that callers
//! pass down to the stores and HTTP handlers, never a process-wide singleton.

use crate::error::{PorticoError, Result};
use ini::Ini;
use lazy_static::lazy_static;
use rusoto_core::Region;
use std::env;
use std::str::FromStr;

lazy_static! {
    /// Compiled-in default settings.
    pub static ref PORTICO_CONF: Ini = Ini::load_from_str(include_str!("./config.toml")).unwrap();
}

/// Runtime configuration for the gallery service.
#[derive(Debug, Clone)]
pub struct PorticoConfig {
    /// AWS region the managed services live in.
    pub region: String,
    /// Optional custom endpoint, e.g. a localstack URL. When set, `region`
    /// only names the signing region.
    pub endpoint: Option<String>,
    /// S3 bucket holding the image blobs.
    pub bucket: String,
    /// Key prefix under which image blobs are stored.
    pub key_prefix: String,
    /// DynamoDB table holding the image records.
    pub table: String,
    /// SNS topic ARN for consult-request notifications.
    pub topic_arn: String,
    /// Identifier accepted by the login endpoint.
    pub auth_id: String,
    /// Password accepted by the login endpoint.
    pub auth_password: String,
    /// HMAC secret the tokens are signed with.
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: i64,
}

impl PorticoConfig {
    /// Builds the configuration from the compiled-in defaults and the
    /// process environment. Secrets have no defaults; a missing secret fails
    /// fast at startup.
    pub fn from_env() -> Result<Self> {
        Ok(PorticoConfig {
            region: var_or("PORTICO_REGION", &PORTICO_CONF["aws"]["region"]),
            endpoint: env::var("PORTICO_ENDPOINT").ok(),
            bucket: var_or("PORTICO_BUCKET", &PORTICO_CONF["s3"]["bucket"]),
            key_prefix: var_or("PORTICO_KEY_PREFIX", &PORTICO_CONF["s3"]["key_prefix"]),
            table: var_or("PORTICO_TABLE", &PORTICO_CONF["dynamodb"]["table"]),
            topic_arn: env::var("PORTICO_TOPIC_ARN").unwrap_or_default(),
            auth_id: required("AUTH_IDENTIFICATION")?,
            auth_password: required("AUTH_PASSWORD")?,
            jwt_secret: required("AUTH_JWT_SECRET_KEY")?,
            token_ttl_secs: var_or("PORTICO_TOKEN_TTL_SECS", &PORTICO_CONF["auth"]["token_ttl_secs"])
                .parse::<i64>()
                .map_err(|e| PorticoError::InvalidArgument(format!("bad token ttl: {}", e)))?,
        })
    }

    /// The region handle the rusoto clients are constructed with.
    pub fn aws_region(&self) -> Region {
        match &self.endpoint {
            Some(endpoint) => Region::Custom {
                name: self.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => Region::from_str(&self.region).unwrap_or_default(),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| {
        PorticoError::InvalidArgument(format!("environment variable {} is not set", name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let conf = Ini::load_from_str(include_str!("./config.toml")).unwrap();
        assert_eq!("ap-northeast-2", &conf["aws"]["region"]);
        assert_eq!("uploads", &conf["s3"]["key_prefix"]);
        assert_eq!(3600, (&conf["auth"]["token_ttl_secs"]).parse::<i64>().unwrap());
    }

    #[test]
    fn custom_endpoint_builds_custom_region() {
        let config = PorticoConfig {
            region: "ap-northeast-2".to_string(),
            endpoint: Some("http://localhost:4566".to_string()),
            bucket: "b".to_string(),
            key_prefix: "uploads".to_string(),
            table: "t".to_string(),
            topic_arn: String::new(),
            auth_id: "id".to_string(),
            auth_password: "pw".to_string(),
            jwt_secret: "secret".to_string(),
            token_ttl_secs: 3600,
        };
        match config.aws_region() {
            Region::Custom { name, endpoint } => {
                assert_eq!("ap-northeast-2", name);
                assert_eq!("http://localhost:4566", endpoint);
            }
            other => panic!("expected custom region, got {:?}", other),
        }
    }
}
