use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::config_model::ParseServer;

const APPLICATION_ID_HEADER: &str = "X-Parse-Application-Id";
const REST_API_KEY_HEADER: &str = "X-Parse-REST-API-Key";
const MASTER_KEY_HEADER: &str = "X-Parse-Master-Key";
const SESSION_TOKEN_HEADER: &str = "X-Parse-Session-Token";

/// REST client for the Parse Server holding users, subscriptions, products and prices.
///
/// Object reads and writes use the master key. The current-user lookup sends the
/// caller's session token instead so the server decides who the caller is.
pub struct ParseClient {
    http: reqwest::Client,
    api_url: String,
    application_id: String,
    rest_api_key: String,
    master_key: String,
}

#[derive(Debug, Deserialize)]
struct ParseErrorEnvelope {
    code: Option<i64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResults<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedObject {
    object_id: String,
}

impl ParseClient {
    pub fn new(config: &ParseServer) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .with_context(|| format!("API_URL is not a valid URL: {}", config.api_url))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_url: api_url.as_str().trim_end_matches('/').to_string(),
            application_id: config.application_id.clone(),
            rest_api_key: config.rest_api_key.clone(),
            master_key: config.master_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header(APPLICATION_ID_HEADER, &self.application_id)
            .header(REST_API_KEY_HEADER, &self.rest_api_key)
    }

    fn master_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, path)
            .header(MASTER_KEY_HEADER, &self.master_key)
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };
        let envelope = serde_json::from_str::<ParseErrorEnvelope>(&body).ok();

        error!(
            status = %status,
            parse_error_code = ?envelope.as_ref().and_then(|e| e.code),
            parse_error = ?envelope.as_ref().and_then(|e| e.error.as_deref()),
            response_body = %body,
            context = %context,
            "parse: api request failed"
        );

        anyhow::bail!("Parse API request failed: {} (status {})", context, status);
    }

    /// First object of `class` matching `where_clause`, optionally ordered.
    pub async fn find_first<T: DeserializeOwned>(
        &self,
        class: &str,
        where_clause: &Value,
        order: Option<&str>,
    ) -> Result<Option<T>> {
        let context = format!("query {class}");
        let mut query = vec![
            ("where", where_clause.to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(order) = order {
            query.push(("order", order.to_string()));
        }

        let resp = self
            .master_request(Method::GET, &format!("classes/{class}"))
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Parse request failed: {context}"))?;
        let resp = Self::ensure_success(resp, &context).await?;

        let found: QueryResults<T> = resp
            .json()
            .await
            .with_context(|| format!("Parse response could not be decoded: {context}"))?;
        Ok(found.results.into_iter().next())
    }

    /// Object at `path`, or `None` when the server answers 404.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let context = format!("get {path}");
        let resp = self
            .master_request(Method::GET, path)
            .send()
            .await
            .with_context(|| format!("Parse request failed: {context}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(path, "parse: object not found");
            return Ok(None);
        }
        let resp = Self::ensure_success(resp, &context).await?;

        resp.json()
            .await
            .map(Some)
            .with_context(|| format!("Parse response could not be decoded: {context}"))
    }

    /// Creates an object and returns its new object id.
    pub async fn create(&self, class: &str, body: &Value) -> Result<String> {
        let context = format!("create {class}");
        let resp = self
            .master_request(Method::POST, &format!("classes/{class}"))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Parse request failed: {context}"))?;
        let resp = Self::ensure_success(resp, &context).await?;

        let created: CreatedObject = resp
            .json()
            .await
            .with_context(|| format!("Parse response could not be decoded: {context}"))?;
        debug!(class, object_id = %created.object_id, "parse: object created");
        Ok(created.object_id)
    }

    /// Applies `body` to an existing object at `path` (`classes/{Class}/{id}` or `users/{id}`).
    pub async fn update(&self, path: &str, body: &Value) -> Result<()> {
        let context = format!("update {path}");
        let resp = self
            .master_request(Method::PUT, path)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Parse request failed: {context}"))?;
        Self::ensure_success(resp, &context).await?;
        Ok(())
    }

    pub async fn destroy(&self, path: &str) -> Result<()> {
        let context = format!("destroy {path}");
        let resp = self
            .master_request(Method::DELETE, path)
            .send()
            .await
            .with_context(|| format!("Parse request failed: {context}"))?;
        Self::ensure_success(resp, &context).await?;
        Ok(())
    }

    /// Owner of `session_token`, or `None` when the server rejects the token.
    pub async fn current_user<T: DeserializeOwned>(&self, session_token: &str) -> Result<Option<T>> {
        let resp = self
            .request(Method::GET, "users/me")
            .header(SESSION_TOKEN_HEADER, session_token)
            .send()
            .await
            .context("Parse request failed: current user")?;

        if resp.status().is_client_error() {
            let status = resp.status();
            let envelope = resp.json::<ParseErrorEnvelope>().await.ok();
            warn!(
                status = %status,
                parse_error_code = ?envelope.as_ref().and_then(|e| e.code),
                "parse: session token rejected"
            );
            return Ok(None);
        }
        let resp = Self::ensure_success(resp, "current user").await?;

        resp.json()
            .await
            .map(Some)
            .context("Parse response could not be decoded: current user")
    }
}

pub fn class_path(class: &str, object_id: &str) -> String {
    format!("classes/{class}/{object_id}")
}

pub fn user_path(user_id: &str) -> String {
    format!("users/{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_url: &str) -> ParseServer {
        ParseServer {
            api_url: api_url.to_string(),
            application_id: "app".to_string(),
            rest_api_key: "rest".to_string(),
            master_key: "master".to_string(),
        }
    }

    #[test]
    fn endpoint_keeps_the_server_mount_path() {
        let client = ParseClient::new(&config("https://parseapi.back4app.com/parse")).unwrap();

        assert_eq!(
            client.endpoint("classes/Subscription"),
            "https://parseapi.back4app.com/parse/classes/Subscription"
        );
        assert_eq!(client.endpoint("/users/me"), "https://parseapi.back4app.com/parse/users/me");
    }

    #[test]
    fn rejects_an_invalid_api_url() {
        assert!(ParseClient::new(&config("not a url")).is_err());
    }

    #[test]
    fn builds_object_paths() {
        assert_eq!(class_path("Price", "abc123"), "classes/Price/abc123");
        assert_eq!(user_path("user_1"), "users/user_1");
    }

    #[test]
    fn master_requests_carry_every_key() {
        let client = ParseClient::new(&config("https://parse.example.com/parse")).unwrap();

        let request = client
            .master_request(Method::GET, "classes/Product")
            .build()
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers[APPLICATION_ID_HEADER], "app");
        assert_eq!(headers[REST_API_KEY_HEADER], "rest");
        assert_eq!(headers[MASTER_KEY_HEADER], "master");
    }

    #[test]
    fn session_requests_never_send_the_master_key() {
        let client = ParseClient::new(&config("https://parse.example.com/parse")).unwrap();

        let request = client.request(Method::GET, "users/me").build().unwrap();

        assert!(request.headers().get(MASTER_KEY_HEADER).is_none());
    }
}
