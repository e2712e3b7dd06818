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

//! Express-style routing over API Gateway proxy events.
//!
//! Every outcome becomes a JSON response; handler errors are mapped to the
//! status codes of the error taxonomy instead of failing the Lambda
//! invocation. Mutating endpoints are gated on a valid bearer token.

use crate::multipart;
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Error, Request, Response};
use log::info;
use portico::prelude::*;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Deserialize)]
struct LoginRequest {
    id: String,
    pw: String,
}

#[derive(Deserialize)]
struct ConsultRequest {
    name: String,
    // Older clients send camelCase.
    #[serde(alias = "phoneNumber")]
    phone_number: String,
    content: String,
}

/// Dispatches one API Gateway request.
pub async fn route(
    config: &PorticoConfig,
    services: &Services,
    event: Request,
) -> std::result::Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    info!("{} {}", method, path);

    let result = match (&method, segments.as_slice()) {
        (&Method::POST, ["login"]) => login_handler(config, &event),
        (&Method::GET, ["auth-check"]) => auth_check_handler(config, &event),
        (&Method::POST, ["image-group", group, "manage"]) => {
            manage_handler(config, services, group, &event).await
        }
        (&Method::POST, ["upload-multiple"]) => {
            upload_multiple_handler(config, services, &event).await
        }
        (&Method::GET, ["image-group", group, "title"]) => {
            title_handler(services, group).await
        }
        (&Method::GET, ["image-group", group, "images"]) => {
            images_handler(services, group).await
        }
        (&Method::DELETE, ["delete-group", group]) => {
            delete_group_handler(config, services, group, &event).await
        }
        (&Method::DELETE, ["delete-group"]) => Err(PorticoError::InvalidArgument(
            "image group is missing".to_string(),
        )),
        (&Method::POST, ["send-message"]) => send_message_handler(services, &event).await,
        _ => json_response(
            StatusCode::NOT_FOUND,
            json!({ "message": "Route not found" }),
        ),
    };

    match result {
        Ok(response) => Ok(response),
        Err(err) => error_response(&err).map_err(Error::from),
    }
}

fn login_handler(config: &PorticoConfig, event: &Request) -> Result<Response<Body>> {
    let body: &[u8] = event.body();
    let request: LoginRequest = serde_json::from_slice(body)
        .map_err(|e| PorticoError::InvalidArgument(format!("bad login body: {}", e)))?;
    let token = login(config, &request.id, &request.pw)?;
    json_response(StatusCode::OK, json!({ "token": token }))
}

fn auth_check_handler(config: &PorticoConfig, event: &Request) -> Result<Response<Body>> {
    authorize(config, event)?;
    json_response(StatusCode::OK, json!({ "message": "ok" }))
}

async fn manage_handler(
    config: &PorticoConfig,
    services: &Services,
    group: &str,
    event: &Request,
) -> Result<Response<Body>> {
    authorize(config, event)?;
    let form = parse_form(event).await?;

    let deleted: Vec<String> = json_field(&form.fields, "deleted_images")?.unwrap_or_default();
    let updated: Vec<ImagePatch> = json_field(&form.fields, "updated_images")?.unwrap_or_default();

    let update = manage_group(services, config, group, &deleted, &updated, form.files).await?;
    update_response(
        update,
        json!({ "message": "Image group updated successfully" }),
        StatusCode::OK,
    )
}

async fn upload_multiple_handler(
    config: &PorticoConfig,
    services: &Services,
    event: &Request,
) -> Result<Response<Body>> {
    authorize(config, event)?;
    let form = parse_form(event).await?;

    let group = form
        .fields
        .get("image_group")
        .cloned()
        .ok_or_else(|| PorticoError::InvalidArgument("image_group is missing".to_string()))?;
    let metadata: Map<String, Value> = json_field(&form.fields, "metadata")?.unwrap_or_default();

    let update = upload_group(services, config, &group, metadata, form.files).await?;
    let saved: Vec<Value> = update
        .images
        .iter()
        .map(|i| json!({ "image_id": i.id, "s3_url": i.url }))
        .collect();
    update_response(
        update,
        json!({ "message": "Images uploaded successfully", "savedImages": saved }),
        StatusCode::CREATED,
    )
}

async fn title_handler(services: &Services, group: &str) -> Result<Response<Body>> {
    let title = get_title_image(services, group).await?;
    json_response(StatusCode::OK, json!({ "titleImage": title }))
}

async fn images_handler(services: &Services, group: &str) -> Result<Response<Body>> {
    let urls = list_image_urls(services, group).await?;
    json_response(StatusCode::OK, json!({ "images": urls }))
}

async fn delete_group_handler(
    config: &PorticoConfig,
    services: &Services,
    group: &str,
    event: &Request,
) -> Result<Response<Body>> {
    authorize(config, event)?;
    let (count, report) = delete_group(services, group).await?;
    if report.ok() {
        json_response(
            StatusCode::OK,
            json!({ "message": "Image group deleted", "deleted_count": count }),
        )
    } else {
        json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "message": "Some deletions failed",
                "error": report.failed,
                "completed": report.completed,
            }),
        )
    }
}

async fn send_message_handler(services: &Services, event: &Request) -> Result<Response<Body>> {
    let body: &[u8] = event.body();
    let request: ConsultRequest = serde_json::from_slice(body).map_err(|_| {
        PorticoError::InvalidArgument("name, phone_number, and content are required".to_string())
    })?;
    if request.name.is_empty() || request.phone_number.is_empty() || request.content.is_empty() {
        return Err(PorticoError::InvalidArgument(
            "name, phone_number, and content are required".to_string(),
        ));
    }

    let message = format!(
        "Consultation requested by {}.\nContact: {}\nDetails:\n{}",
        request.name, request.phone_number, request.content
    );
    let message_id = services.notifier.publish(&message).await?;
    json_response(
        StatusCode::OK,
        json!({ "message": "Message sent successfully", "messageId": message_id }),
    )
}

/// Checks the bearer token of a protected endpoint.
fn authorize(config: &PorticoConfig, event: &Request) -> Result<Claims> {
    let header = event
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PorticoError::Unauthorized("Unauthorized".to_string()))?;
    let token = bearer_token(header)
        .ok_or_else(|| PorticoError::Unauthorized("Unauthorized".to_string()))?;
    verify(config, token)
}

async fn parse_form(event: &Request) -> Result<multipart::MultipartForm> {
    let content_type = event
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            PorticoError::InvalidArgument("expected a multipart content type".to_string())
        })?;
    multipart::parse(content_type, event.body().to_vec()).await
}

fn json_field<T: serde::de::DeserializeOwned>(
    fields: &std::collections::HashMap<String, String>,
    name: &str,
) -> Result<Option<T>> {
    fields
        .get(name)
        .map(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| PorticoError::InvalidArgument(format!("bad {}: {}", name, e)))
        })
        .transpose()
}

/// A mutation response: the chosen success payload when every store call
/// went through, otherwise a 500 naming each failed mutation. Partial
/// failures are reported in full, never first-error-wins.
fn update_response(
    update: GroupUpdate,
    mut success: Value,
    status: StatusCode,
) -> Result<Response<Body>> {
    if update.report.ok() {
        success["images"] = serde_json::to_value(&update.images)?;
        json_response(status, success)
    } else {
        json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "message": "Some mutations failed",
                "error": update.report.failed,
                "completed": update.report.completed,
                "images": update.images,
            }),
        )
    }
}

fn json_response(status: StatusCode, value: Value) -> Result<Response<Body>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .map_err(|e| PorticoError::Internal(e.to_string()))
}

fn error_response(err: &PorticoError) -> Result<Response<Body>> {
    let status = match err {
        PorticoError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        PorticoError::NotFound(_) => StatusCode::NOT_FOUND,
        PorticoError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        PorticoError::Unauthenticated(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        json_response(
            status,
            json!({ "message": "Request failed", "error": err.to_string() }),
        )
    } else {
        json_response(status, json!({ "message": err.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http::Request as HttpRequest;
    use portico::test_util::memory_services;

    fn test_config() -> PorticoConfig {
        PorticoConfig {
            region: "ap-northeast-2".to_string(),
            endpoint: None,
            bucket: "memory".to_string(),
            key_prefix: "uploads".to_string(),
            table: "portico-test".to_string(),
            topic_arn: String::new(),
            auth_id: "admin".to_string(),
            auth_password: "hunter2".to_string(),
            jwt_secret: "portico-test-secret".to_string(),
            token_ttl_secs: 3600,
        }
    }

    fn body_json(response: &Response<Body>) -> Value {
        match response.body() {
            Body::Text(text) => serde_json::from_str(text).unwrap(),
            other => panic!("expected a text body, got {:?}", other),
        }
    }

    fn request(method: &str, path: &str, body: Body) -> Request {
        HttpRequest::builder()
            .method(method)
            .uri(path)
            .body(body)
            .unwrap()
    }

    fn token_for(config: &PorticoConfig) -> String {
        login(config, &config.auth_id, &config.auth_password).unwrap()
    }

    const BOUNDARY: &str = "portico-router-test";

    fn multipart_request(path: &str, token: &str, parts: Vec<(String, Option<String>, Vec<u8>)>) -> Request {
        let mut body = Vec::new();
        for (name, filename, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: image/jpeg\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(&content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        HttpRequest::builder()
            .method("POST")
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn login_round_trip() {
        let (services, _, _, _) = memory_services();
        let config = test_config();

        let ok = route(
            &config,
            &services,
            request(
                "POST",
                "/login",
                Body::from(r#"{"id":"admin","pw":"hunter2"}"#),
            ),
        )
        .await
        .unwrap();
        assert_eq!(200, ok.status().as_u16());
        let token = body_json(&ok)["token"].as_str().unwrap().to_string();

        let check = HttpRequest::builder()
            .method("GET")
            .uri("/auth-check")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::Empty)
            .unwrap();
        let checked = route(&config, &services, check).await.unwrap();
        assert_eq!(200, checked.status().as_u16());
    }

    #[tokio::test]
    async fn bad_credentials_are_rejected() {
        let (services, _, _, _) = memory_services();
        let response = route(
            &test_config(),
            &services,
            request("POST", "/login", Body::from(r#"{"id":"admin","pw":"no"}"#)),
        )
        .await
        .unwrap();
        assert_eq!(401, response.status().as_u16());
    }

    #[tokio::test]
    async fn manage_requires_a_token() {
        let (services, _, _, _) = memory_services();
        let response = route(
            &test_config(),
            &services,
            request("POST", "/image-group/g1/manage", Body::Empty),
        )
        .await
        .unwrap();
        assert_eq!(401, response.status().as_u16());

        let garbage = HttpRequest::builder()
            .method("POST")
            .uri("/image-group/g1/manage")
            .header("authorization", "Bearer not-a-token")
            .body(Body::Empty)
            .unwrap();
        let response = route(&test_config(), &services, garbage).await.unwrap();
        assert_eq!(403, response.status().as_u16());
    }

    #[tokio::test]
    async fn upload_then_manage_then_read() {
        let (services, _, _, _) = memory_services();
        let config = test_config();
        let token = token_for(&config);

        // Seed the group through /upload-multiple.
        let upload = multipart_request(
            "/upload-multiple",
            &token,
            vec![
                ("image_group".to_string(), None, b"g1".to_vec()),
                ("metadata".to_string(), None, b"{\"project\":\"river\"}".to_vec()),
                ("file".to_string(), Some("a.jpg".to_string()), vec![1]),
                ("file".to_string(), Some("b.jpg".to_string()), vec![2]),
            ],
        );
        let uploaded = route(&config, &services, upload).await.unwrap();
        assert_eq!(201, uploaded.status().as_u16());
        assert_eq!(
            2,
            body_json(&uploaded)["savedImages"].as_array().unwrap().len()
        );

        // Drop the title image and append a third one.
        let manage = multipart_request(
            "/image-group/g1/manage",
            &token,
            vec![
                ("deleted_images".to_string(), None, b"[\"g1-1\"]".to_vec()),
                ("updated_images".to_string(), None, b"[]".to_vec()),
                ("file".to_string(), Some("c.jpg".to_string()), vec![3]),
            ],
        );
        let managed = route(&config, &services, manage).await.unwrap();
        assert_eq!(200, managed.status().as_u16());
        let images = body_json(&managed)["images"].as_array().unwrap().clone();
        assert_eq!(2, images.len());
        assert_eq!("g1-2", images[0]["image_id"]);
        assert_eq!(1, images[0]["order"]);

        let listed = route(
            &config,
            &services,
            request("GET", "/image-group/g1/images", Body::Empty),
        )
        .await
        .unwrap();
        assert_eq!(200, listed.status().as_u16());
        assert_eq!(2, body_json(&listed)["images"].as_array().unwrap().len());

        let title = route(
            &config,
            &services,
            request("GET", "/image-group/g1/title", Body::Empty),
        )
        .await
        .unwrap();
        assert_eq!(200, title.status().as_u16());
    }

    #[tokio::test]
    async fn reads_on_an_empty_group_are_not_found() {
        let (services, _, _, _) = memory_services();
        let config = test_config();

        for path in ["/image-group/ghost/title", "/image-group/ghost/images"] {
            let response = route(&config, &services, request("GET", path, Body::Empty))
                .await
                .unwrap();
            assert_eq!(404, response.status().as_u16());
        }
    }

    #[tokio::test]
    async fn delete_group_paths() {
        let (services, _, _, _) = memory_services();
        let config = test_config();
        let token = token_for(&config);

        let authorized = |path: &str| {
            HttpRequest::builder()
                .method("DELETE")
                .uri(path)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::Empty)
                .unwrap()
        };

        // Missing group segment.
        let response = route(&config, &services, authorized("/delete-group"))
            .await
            .unwrap();
        assert_eq!(400, response.status().as_u16());

        // Unknown group.
        let response = route(&config, &services, authorized("/delete-group/ghost"))
            .await
            .unwrap();
        assert_eq!(404, response.status().as_u16());

        // Existing group.
        let upload = multipart_request(
            "/upload-multiple",
            &token,
            vec![
                ("image_group".to_string(), None, b"g1".to_vec()),
                ("file".to_string(), Some("a.jpg".to_string()), vec![1]),
                ("file".to_string(), Some("b.jpg".to_string()), vec![2]),
            ],
        );
        route(&config, &services, upload).await.unwrap();

        let response = route(&config, &services, authorized("/delete-group/g1"))
            .await
            .unwrap();
        assert_eq!(200, response.status().as_u16());
        assert_eq!(2, body_json(&response)["deleted_count"]);
    }

    #[tokio::test]
    async fn send_message_publishes() {
        let (services, _, _, notifier) = memory_services();
        let config = test_config();

        let response = route(
            &config,
            &services,
            request(
                "POST",
                "/send-message",
                Body::from(
                    r#"{"name":"Kim","phone_number":"010-0000-0000","content":"call me"}"#,
                ),
            ),
        )
        .await
        .unwrap();
        assert_eq!(200, response.status().as_u16());
        assert_eq!(1, notifier.published().len());
        assert!(notifier.published()[0].contains("Kim"));

        // Older clients send camelCase.
        let camel = route(
            &config,
            &services,
            request(
                "POST",
                "/send-message",
                Body::from(r#"{"name":"Lee","phoneNumber":"010-1111-1111","content":"hi"}"#),
            ),
        )
        .await
        .unwrap();
        assert_eq!(200, camel.status().as_u16());
        assert_eq!(2, notifier.published().len());

        let missing = route(
            &config,
            &services,
            request("POST", "/send-message", Body::from(r#"{"name":"Kim"}"#)),
        )
        .await
        .unwrap();
        assert_eq!(400, missing.status().as_u16());
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let (services, _, _, _) = memory_services();
        let response = route(
            &test_config(),
            &services,
            request("GET", "/nope/nothing", Body::Empty),
        )
        .await
        .unwrap();
        assert_eq!(404, response.status().as_u16());
        assert_eq!("Route not found", body_json(&response)["message"]);
    }
}
