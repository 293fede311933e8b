//! W3C WebDriver client
//!
//! Speaks the JSON-over-HTTP WebDriver protocol to a server such as
//! geckodriver, chromedriver or a Selenium grid. Every response carries a
//! `value` member; failures carry `value.error` and `value.message`.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

use crate::common::config::WebDriverConfig;
use crate::common::{Error, Result};

use super::{Driver, Element, Locator, Rect};

/// Key under which the protocol returns element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// HTTP plumbing shared by the session and its elements
#[derive(Clone)]
struct Transport {
    http: reqwest::Client,
    base: String,
    session_id: String,
}

impl Transport {
    fn session_url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("{}/session/{}", self.base, self.session_id)
        } else {
            format!("{}/session/{}/{}", self.base, self.session_id, path)
        }
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.session_url(path);
        send(&self.http, method, &url, path, body).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.command(Method::GET, path, None).await
    }
}

async fn send(
    http: &reqwest::Client,
    method: Method,
    url: &str,
    command: &str,
    body: Option<Value>,
) -> Result<Value> {
    tracing::debug!("WebDriver {} {}", method, url);

    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::webdriver(command, e.to_string()))?;
    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|e| Error::webdriver(command, format!("invalid response body: {}", e)))?;

    if !status.is_success() {
        return Err(error_from_body(command, &payload)
            .unwrap_or_else(|| Error::webdriver(command, format!("HTTP status {}", status))));
    }

    Ok(payload.get("value").cloned().unwrap_or(Value::Null))
}

/// Build an error from a protocol failure body, if it has the W3C shape
fn error_from_body(command: &str, payload: &Value) -> Option<Error> {
    let value = payload.get("value")?;
    let code = value.get("error")?.as_str()?;
    let message = value.get("message").and_then(Value::as_str).unwrap_or("");
    Some(Error::webdriver(command, format!("{}: {}", code, message)))
}

fn as_string(command: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Err(Error::webdriver(
            command,
            format!("expected a string, got {}", other),
        )),
    }
}

fn as_bool(command: &str, value: Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::webdriver(command, format!("expected a boolean, got {}", value)))
}

fn element_id(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY)?.as_str().map(str::to_string)
}

/// A live WebDriver session
pub struct WebDriverClient {
    transport: Transport,
}

impl WebDriverClient {
    /// Open a new session against the configured server
    pub async fn connect(config: &WebDriverConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Driver(format!("failed to build HTTP client: {}", e)))?;
        let base = config.url.trim_end_matches('/').to_string();

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": { "browserName": config.browser }
            }
        });
        let url = format!("{}/session", base);
        let value = send(&http, Method::POST, &url, "new session", Some(capabilities)).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::webdriver("new session", "response has no sessionId"))?
            .to_string();

        tracing::info!("WebDriver session {} opened at {}", session_id, base);

        Ok(Self {
            transport: Transport {
                http,
                base,
                session_id,
            },
        })
    }
}

#[async_trait]
impl Driver for WebDriverClient {
    fn session_id(&self) -> &str {
        &self.transport.session_id
    }

    async fn quit(&self) -> Result<()> {
        self.transport.command(Method::DELETE, "", None).await?;
        tracing::info!("WebDriver session {} closed", self.transport.session_id);
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        as_string("title", self.transport.get("title").await?)
    }

    async fn current_url(&self) -> Result<String> {
        as_string("url", self.transport.get("url").await?)
    }

    async fn page_source(&self) -> Result<String> {
        as_string("source", self.transport.get("source").await?)
    }

    async fn window_handle(&self) -> Result<String> {
        as_string("window", self.transport.get("window").await?)
    }

    async fn find_element(&self, locator: &Locator) -> Result<Box<dyn Element>> {
        let body = json!({ "using": locator.strategy.as_str(), "value": locator.value });
        let value = self
            .transport
            .command(Method::POST, "element", Some(body))
            .await
            .map_err(|e| match e {
                Error::WebDriver { ref message, .. } if message.starts_with("no such element") => {
                    Error::ElementNotFound {
                        strategy: locator.strategy.to_string(),
                        value: locator.value.clone(),
                    }
                }
                other => other,
            })?;

        let id = element_id(&value)
            .ok_or_else(|| Error::webdriver("find element", "response has no element reference"))?;

        Ok(Box::new(WebDriverElement {
            transport: self.transport.clone(),
            id,
        }))
    }
}

/// `<command>/<value>` with the step-supplied value as one escaped segment
fn parameter_path(command: &str, value: &str) -> String {
    format!("{}/{}", command, urlencoding::encode(value))
}

/// Element reference within a WebDriver session
struct WebDriverElement {
    transport: Transport,
    id: String,
}

impl WebDriverElement {
    async fn get(&self, path: &str) -> Result<Value> {
        self.transport
            .get(&format!("element/{}/{}", self.id, path))
            .await
    }
}

#[async_trait]
impl Element for WebDriverElement {
    async fn text(&self) -> Result<String> {
        as_string("element text", self.get("text").await?)
    }

    async fn is_enabled(&self) -> Result<bool> {
        as_bool("element enabled", self.get("enabled").await?)
    }

    async fn is_displayed(&self) -> Result<bool> {
        as_bool("element displayed", self.get("displayed").await?)
    }

    async fn is_selected(&self) -> Result<bool> {
        as_bool("element selected", self.get("selected").await?)
    }

    async fn rect(&self) -> Result<Rect> {
        let value = self.get("rect").await?;
        serde_json::from_value(value)
            .map_err(|e| Error::webdriver("element rect", e.to_string()))
    }

    async fn tag_name(&self) -> Result<String> {
        as_string("element name", self.get("name").await?)
    }

    async fn css_value(&self, property: &str) -> Result<String> {
        as_string("element css", self.get(&parameter_path("css", property)).await?)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        match self.get(&parameter_path("attribute", name)).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }
}
