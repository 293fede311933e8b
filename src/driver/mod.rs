//! Automation driver capability surfaces
//!
//! Two surfaces are exposed to queries: [`Driver`] for session-level reads
//! (title, URL, source, window handle) and [`Element`] for reads against a
//! single located UI element.

pub mod webdriver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::{Error, Result};

pub use webdriver::WebDriverClient;

/// W3C element location strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "css selector")]
    Css,
    #[serde(rename = "xpath")]
    XPath,
    #[serde(rename = "link text")]
    LinkText,
    #[serde(rename = "partial link text")]
    PartialLinkText,
    #[serde(rename = "tag name")]
    TagName,
}

impl Strategy {
    /// Wire name used by the W3C protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Css => "css selector",
            Strategy::XPath => "xpath",
            Strategy::LinkText => "link text",
            Strategy::PartialLinkText => "partial link text",
            Strategy::TagName => "tag name",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An element-location descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub strategy: Strategy,
    pub value: String,
}

impl Locator {
    /// Build a locator from a step's `locatorType` and `locatorSpec` cells
    ///
    /// `id`, `name` and `class` are expressed as CSS selectors since the W3C
    /// protocol has no dedicated strategies for them.
    pub fn from_step_fields(locator_type: &str, spec: &str) -> Result<Self> {
        let value = spec.trim();
        if value.is_empty() {
            return Err(Error::InvalidLocator(format!(
                "locator spec is blank for type '{}'",
                locator_type.trim()
            )));
        }

        let kind = locator_type.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        let (strategy, value) = match kind.as_str() {
            "id" => (Strategy::Css, format!("[id=\"{}\"]", css_escape(value))),
            "name" => (Strategy::Css, format!("[name=\"{}\"]", css_escape(value))),
            "class" | "classname" => (Strategy::Css, format!(".{}", value)),
            "css" | "cssselector" => (Strategy::Css, value.to_string()),
            "xpath" => (Strategy::XPath, value.to_string()),
            "linktext" | "link" => (Strategy::LinkText, value.to_string()),
            "partiallinktext" | "partiallink" => (Strategy::PartialLinkText, value.to_string()),
            "tagname" | "tag" => (Strategy::TagName, value.to_string()),
            other => {
                return Err(Error::InvalidLocator(format!(
                    "unknown locator type '{}'",
                    other
                )))
            }
        };

        Ok(Self { strategy, value })
    }
}

fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Position and size of an element
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Location rendered as `(x, y)`
    pub fn location(&self) -> String {
        format!("({}, {})", self.x.round() as i64, self.y.round() as i64)
    }

    /// Size rendered as `(width, height)`
    pub fn size(&self) -> String {
        format!("({}, {})", self.width.round() as i64, self.height.round() as i64)
    }
}

/// Session-level capability surface
#[async_trait]
pub trait Driver: Send + Sync {
    /// Identifier of the live automation session
    fn session_id(&self) -> &str;

    async fn title(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    async fn page_source(&self) -> Result<String>;

    async fn window_handle(&self) -> Result<String>;

    /// Locate a single element
    async fn find_element(&self, locator: &Locator) -> Result<Box<dyn Element>>;

    /// End the automation session
    async fn quit(&self) -> Result<()> {
        Ok(())
    }
}

/// Element-level capability surface
#[async_trait]
pub trait Element: Send + Sync {
    async fn text(&self) -> Result<String>;

    async fn is_enabled(&self) -> Result<bool>;

    async fn is_displayed(&self) -> Result<bool>;

    async fn is_selected(&self) -> Result<bool>;

    async fn rect(&self) -> Result<Rect>;

    async fn tag_name(&self) -> Result<String>;

    async fn css_value(&self, property: &str) -> Result<String>;

    /// Attribute value, `None` when the attribute is absent
    async fn attribute(&self, name: &str) -> Result<Option<String>>;
}
