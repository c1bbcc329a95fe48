//! `uri`: issue an HTTP request from the control node (not the target) and
//! optionally validate the response status and save the body.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Form,
    Raw,
}

impl BodyFormat {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "form" | "form-urlencoded" => BodyFormat::Form,
            "raw" | "text" => BodyFormat::Raw,
            _ => BodyFormat::Json,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuth2TokenResponse {
    access_token: String,
}

fn parse_method(method: &str) -> Result<Method> {
    match method.to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        "PATCH" => Ok(Method::PATCH),
        "HEAD" => Ok(Method::HEAD),
        "OPTIONS" => Ok(Method::OPTIONS),
        other => Err(Error::config(format!(
            "uri: unsupported method '{other}' (expected GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS)"
        ))),
    }
}

fn build_client(timeout_secs: u64, validate_certs: bool) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .danger_accept_invalid_certs(!validate_certs)
        .build()
        .map_err(|e| Error::config(format!("uri: failed to build HTTP client: {e}")))
}

async fn oauth2_token(client: &Client, params: &ModuleParams) -> Result<String> {
    let token_url = params.get_string_required("auth_token_url")?;
    let client_id = params.get_string_required("auth_client_id")?;
    let client_secret = params.get_string_required("auth_client_secret")?;

    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", "client_credentials".to_string());
    form.insert("client_id", client_id);
    form.insert("client_secret", client_secret);
    if let Some(scope) = params.get_string("auth_scope") {
        form.insert("scope", scope);
    }

    let response = client
        .post(&token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::config(format!("uri: oauth2 token request failed: {e}")))?;
    if !response.status().is_success() {
        return Err(Error::config(format!("uri: oauth2 token request returned {}", response.status())));
    }
    let token: OAuth2TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::config(format!("uri: failed to parse oauth2 token response: {e}")))?;
    Ok(token.access_token)
}

pub struct UriModule;

#[async_trait]
impl super::Module for UriModule {
    fn name(&self) -> &'static str {
        "uri"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        params.get_string_required("url")?;
        if let Some(method) = params.get_string("method") {
            parse_method(&method)?;
        }
        Ok(())
    }

    async fn execute(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let url = params.get_string_required("url")?;
        let method = parse_method(&params.get_string("method").unwrap_or_else(|| "GET".to_string()))?;
        let timeout_secs = params.get_i64("timeout").unwrap_or(DEFAULT_TIMEOUT_SECS as i64).max(1) as u64;
        let validate_certs = params.get_bool_or("validate_certs", true);
        let status_codes = params
            .get_vec_string("status_code")
            .unwrap_or_else(|| vec!["200".to_string(), "201".to_string(), "204".to_string()]);
        let return_content = params.get_bool_or("return_content", false);
        let body_format = BodyFormat::parse(&params.get_string("body_format").unwrap_or_else(|| "json".to_string()));

        let client = build_client(timeout_secs, validate_certs)?;
        let mut request = client.request(method, &url);

        if let Some(headers) = params.get("headers").and_then(|v| v.as_object()) {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key.as_str(), value);
                }
            }
        }

        match params.get_string("auth_type").as_deref() {
            Some("basic") => {
                let user = params.get_string_required("auth_user")?;
                let password = params.get_string("auth_password").unwrap_or_default();
                request = request.basic_auth(user, Some(password));
            }
            Some("bearer") => {
                let token = params.get_string_required("auth_token")?;
                request = request.bearer_auth(token);
            }
            Some("oauth2") | Some("oauth2_client_credentials") => {
                let token = oauth2_token(&client, params).await?;
                request = request.bearer_auth(token);
            }
            _ => {}
        }

        if let Some(body) = params.get("body") {
            request = match body_format {
                BodyFormat::Json => request.json(body),
                BodyFormat::Form => request.form(body),
                BodyFormat::Raw => request.body(body.as_str().unwrap_or_default().to_string()),
            };
        }

        let response = request.send().await.map_err(|e| Error::config(format!("uri: request failed: {e}")))?;
        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body_text = response.text().await.unwrap_or_default();

        let status_ok = status_codes.iter().any(|c| c == status.as_str());
        if !status_ok {
            return Err(Error::config(format!(
                "uri: '{url}' returned status {} (expected one of {:?})",
                status.as_u16(),
                status_codes
            )));
        }

        let mut result = ModuleResult::ok(format!("'{url}' returned {}", status.as_u16()))
            .with_data("status", serde_json::json!(status.as_u16()))
            .with_data("url", serde_json::json!(final_url));
        if let Some(ct) = content_type {
            result = result.with_data("content_type", serde_json::json!(ct));
        }
        if return_content {
            result = result.with_data("content", serde_json::json!(body_text.clone()));
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body_text) {
                result = result.with_data("json", json);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Module;
    use crate::provider::{ConnectionKind, HostDescriptor, LocalProvider};
    use crate::template::TemplateEngine;
    use indexmap::IndexMap;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    #[test]
    fn parse_method_accepts_known_verbs() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("DELETE").unwrap(), Method::DELETE);
        assert!(parse_method("FETCH").is_err());
    }

    #[test]
    fn body_format_defaults_to_json() {
        assert_eq!(BodyFormat::parse("bogus"), BodyFormat::Json);
        assert_eq!(BodyFormat::parse("raw"), BodyFormat::Raw);
    }

    fn local_ctx() -> TaskContext {
        let descriptor = HostDescriptor {
            name: "control".to_string(),
            connection: ConnectionKind::Local,
            hostname: None,
            port: None,
            username: None,
            password: None,
            private_key: None,
            private_key_password: None,
            timeout: None,
        };
        let provider: Box<dyn crate::provider::Provider> =
            Box::new(LocalProvider::new(descriptor));
        TaskContext::new(
            "control".to_string(),
            Arc::new(AsyncMutex::new(provider)),
            IndexMap::new(),
            IndexMap::new(),
            Arc::new(TemplateEngine::new()),
            false,
        )
    }

    #[tokio::test]
    async fn get_request_returns_status_and_captures_content() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/health"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let ctx = local_ctx();
        let mut params: ModuleParams = HashMap::new();
        params.insert("url".to_string(), serde_json::json!(format!("{}/health", server.uri())));
        params.insert("method".to_string(), serde_json::json!("GET"));
        params.insert("return_content".to_string(), serde_json::json!(true));

        let result = UriModule.execute(&ctx, &params).await.unwrap();
        assert_eq!(result.data.get("status"), Some(&serde_json::json!(200)));
        assert_eq!(result.data.get("content"), Some(&serde_json::json!("ok")));
    }

    #[tokio::test]
    async fn unexpected_status_code_is_an_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/missing"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let ctx = local_ctx();
        let mut params: ModuleParams = HashMap::new();
        params.insert("url".to_string(), serde_json::json!(format!("{}/missing", server.uri())));

        assert!(UriModule.execute(&ctx, &params).await.is_err());
    }
}
