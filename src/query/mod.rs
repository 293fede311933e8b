//! Query dispatch
//!
//! A step's `qryFunction` names a read against one of two capability
//! surfaces. Names map onto [`QueryFunction`]; each function belongs to a
//! [`Surface`] and is served by the matching [`QueryStrategy`]
//! ([`SessionQuery`] or [`ElementQuery`]).
//!
//! [`query`] never fails: any error becomes a step error and the result is
//! the empty string. A successful result is saved under the step's `saveas`
//! name, both on the step and in the session variables, so later steps can
//! substitute it.

pub mod element;
pub mod session;

use async_trait::async_trait;
use std::fmt;

use crate::common::{Error, Result};
use crate::driver::{Element, Locator};
use crate::session::SessionContext;
use crate::step::{EventKind, TestStep};

pub use element::ElementQuery;
pub use session::SessionQuery;

/// Capability surface a query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Session,
    Element,
}

/// Supported query functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFunction {
    Title,
    CurrentUrl,
    PageSource,
    WindowHandle,
    Text,
    Enabled,
    Displayed,
    Selected,
    Location,
    Size,
    TagName,
    Class,
    CssValue,
    Attribute,
}

impl QueryFunction {
    pub const ALL: [QueryFunction; 14] = [
        QueryFunction::Title,
        QueryFunction::CurrentUrl,
        QueryFunction::PageSource,
        QueryFunction::WindowHandle,
        QueryFunction::Text,
        QueryFunction::Enabled,
        QueryFunction::Displayed,
        QueryFunction::Selected,
        QueryFunction::Location,
        QueryFunction::Size,
        QueryFunction::TagName,
        QueryFunction::Class,
        QueryFunction::CssValue,
        QueryFunction::Attribute,
    ];

    /// Look up a function by its step-table name (case-insensitive)
    pub fn parse(name: &str) -> Result<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| Error::UnsupportedQuery(name.trim().to_string()))
    }

    /// Step-table name
    pub fn name(&self) -> &'static str {
        match self {
            QueryFunction::Title => "gettitle",
            QueryFunction::CurrentUrl => "getcurrenturl",
            QueryFunction::PageSource => "getpagesource",
            QueryFunction::WindowHandle => "getwindowhandle",
            QueryFunction::Text => "gettext",
            QueryFunction::Enabled => "isenabled",
            QueryFunction::Displayed => "isdisplayed",
            QueryFunction::Selected => "isselected",
            QueryFunction::Location => "getlocation",
            QueryFunction::Size => "getsize",
            QueryFunction::TagName => "gettagname",
            QueryFunction::Class => "getclass",
            QueryFunction::CssValue => "getcssvalue",
            QueryFunction::Attribute => "getattribute",
        }
    }

    pub fn surface(&self) -> Surface {
        match self {
            QueryFunction::Title
            | QueryFunction::CurrentUrl
            | QueryFunction::PageSource
            | QueryFunction::WindowHandle => Surface::Session,
            _ => Surface::Element,
        }
    }

    /// Whether the function reads a side parameter from the `param` data key
    pub fn needs_parameter(&self) -> bool {
        matches!(self, QueryFunction::CssValue | QueryFunction::Attribute)
    }
}

impl fmt::Display for QueryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One capability surface's way of answering a query
#[async_trait]
pub trait QueryStrategy: Send + Sync {
    async fn query(&self, function: QueryFunction, step: &TestStep) -> Result<String>;
}

/// Run the step's query, locating the target element through the session
/// driver when the function is element-level
pub async fn query(step: &mut TestStep, ctx: &mut SessionContext) -> String {
    let result = resolve_and_run(step, ctx).await;
    complete(step, ctx, result)
}

/// Run the step's query against an element the caller already holds
///
/// Session-level functions still go to the session driver.
pub async fn query_element(
    step: &mut TestStep,
    ctx: &mut SessionContext,
    element: &dyn Element,
) -> String {
    let result = match QueryFunction::parse(step.query_function()) {
        Ok(function) if function.surface() == Surface::Element => {
            ElementQuery::new(Some(element)).query(function, step).await
        }
        Ok(function) => SessionQuery::new(ctx.driver()).query(function, step).await,
        Err(e) => Err(e),
    };
    complete(step, ctx, result)
}

async fn resolve_and_run(step: &TestStep, ctx: &SessionContext) -> Result<String> {
    let function = QueryFunction::parse(step.query_function())?;
    match function.surface() {
        Surface::Session => SessionQuery::new(ctx.driver()).query(function, step).await,
        Surface::Element => {
            let driver = ctx.driver().ok_or(Error::NoSession)?;
            let locator = Locator::from_step_fields(step.locator_type(), step.locator_spec())?;
            tracing::debug!("Locating {} '{}' for {}", locator.strategy, locator.value, function);
            let element = driver.find_element(&locator).await?;
            ElementQuery::new(Some(element.as_ref())).query(function, step).await
        }
    }
}

fn complete(step: &mut TestStep, ctx: &mut SessionContext, result: Result<String>) -> String {
    let name = step.query_function().trim().to_string();
    let value = match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Step '{}': query {} failed: {}", step.id(), name, e);
            step.add_error(e.to_string());
            return String::new();
        }
    };

    step.record_event(EventKind::Query, format!("{} = {}", name, value));
    if !step.is_failure() {
        if let Some(variable) = step.save_as().map(str::to_string) {
            step.save_property(&variable, &value);
            ctx.variables.set(variable, value.clone());
        }
    }
    value
}

#[cfg(test)]
pub(crate) mod fakes {
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    use crate::common::{Error, Result};
    use crate::driver::{Driver, Element, Locator, Rect};

    #[derive(Clone, Default)]
    pub struct FakeElement {
        pub text: String,
        pub tag: String,
        pub enabled: bool,
        pub displayed: bool,
        pub selected: bool,
        pub rect: Rect,
        pub attributes: BTreeMap<String, String>,
        pub css: BTreeMap<String, String>,
    }

    #[async_trait]
    impl Element for FakeElement {
        async fn text(&self) -> Result<String> {
            Ok(self.text.clone())
        }

        async fn is_enabled(&self) -> Result<bool> {
            Ok(self.enabled)
        }

        async fn is_displayed(&self) -> Result<bool> {
            Ok(self.displayed)
        }

        async fn is_selected(&self) -> Result<bool> {
            Ok(self.selected)
        }

        async fn rect(&self) -> Result<Rect> {
            Ok(self.rect)
        }

        async fn tag_name(&self) -> Result<String> {
            Ok(self.tag.clone())
        }

        async fn css_value(&self, property: &str) -> Result<String> {
            Ok(self.css.get(property).cloned().unwrap_or_default())
        }

        async fn attribute(&self, name: &str) -> Result<Option<String>> {
            Ok(self.attributes.get(name).cloned())
        }
    }

    /// Driver whose elements are keyed by locator value
    #[derive(Default)]
    pub struct FakeDriver {
        pub title: String,
        pub url: String,
        pub elements: BTreeMap<String, FakeElement>,
    }

    #[async_trait]
    impl Driver for FakeDriver {
        fn session_id(&self) -> &str {
            "fake-session"
        }

        async fn title(&self) -> Result<String> {
            Ok(self.title.clone())
        }

        async fn current_url(&self) -> Result<String> {
            Ok(self.url.clone())
        }

        async fn page_source(&self) -> Result<String> {
            Ok(format!("<html><title>{}</title></html>", self.title))
        }

        async fn window_handle(&self) -> Result<String> {
            Ok("window-1".to_string())
        }

        async fn find_element(&self, locator: &Locator) -> Result<Box<dyn Element>> {
            self.elements
                .get(&locator.value)
                .cloned()
                .map(|e| Box::new(e) as Box<dyn Element>)
                .ok_or_else(|| Error::ElementNotFound {
                    strategy: locator.strategy.to_string(),
                    value: locator.value.clone(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{FakeDriver, FakeElement};
    use super::*;
    use crate::common::config::StepConfig;
    use crate::source::SourceRow;

    fn step(ctx: &mut SessionContext, cells: &[&str]) -> TestStep {
        let row = SourceRow::from_cells(cells.iter().map(|c| c.to_string()).collect());
        let mut step = TestStep::from_row(&row);
        step.initialize(ctx).unwrap();
        step
    }

    fn context_with_page() -> SessionContext {
        let mut heading = FakeElement {
            text: "Welcome".to_string(),
            tag: "h1".to_string(),
            displayed: true,
            ..FakeElement::default()
        };
        heading.attributes.insert("class".to_string(), "title big".to_string());
        heading.css.insert("color".to_string(), "rgb(0, 0, 0)".to_string());

        let mut driver = FakeDriver {
            title: "Home".to_string(),
            url: "https://example.test/".to_string(),
            ..FakeDriver::default()
        };
        driver.elements.insert("h1".to_string(), heading);

        let mut ctx = SessionContext::new(StepConfig::default());
        ctx.attach_driver(Box::new(driver));
        ctx
    }

    #[test]
    fn test_parse_function_names() {
        assert_eq!(QueryFunction::parse("GetTitle").unwrap(), QueryFunction::Title);
        assert_eq!(QueryFunction::parse(" isselected ").unwrap(), QueryFunction::Selected);
        assert_eq!(QueryFunction::parse("getattribute").unwrap().surface(), Surface::Element);
        assert!(QueryFunction::CssValue.needs_parameter());
        assert!(!QueryFunction::Text.needs_parameter());
        assert!(matches!(
            QueryFunction::parse("click"),
            Err(Error::UnsupportedQuery(name)) if name == "click"
        ));
        for function in QueryFunction::ALL {
            assert_eq!(QueryFunction::parse(function.name()).unwrap(), function);
        }
    }

    #[tokio::test]
    async fn test_session_query_saves_result() {
        let mut ctx = context_with_page();
        let mut s = step(&mut ctx, &["Q1", "query", "", "", "gettitle", "", "saveas=pageTitle"]);

        assert_eq!(query(&mut s, &mut ctx).await, "Home");
        assert!(s.is_valid());
        assert_eq!(s.saved_properties().get("pageTitle").map(String::as_str), Some("Home"));
        assert_eq!(ctx.variables.get("pageTitle"), Some("Home"));
    }

    #[tokio::test]
    async fn test_element_query_through_locator() {
        let mut ctx = context_with_page();
        let mut s = step(&mut ctx, &["Q2", "query", "tagname", "h1", "gettext", "", "saveas=heading"]);
        assert_eq!(query(&mut s, &mut ctx).await, "Welcome");
        assert_eq!(ctx.variables.get("heading"), Some("Welcome"));

        let mut s = step(&mut ctx, &["Q3", "query", "tagname", "h1", "getclass"]);
        assert_eq!(query(&mut s, &mut ctx).await, "title big");

        let mut s = step(&mut ctx, &["Q4", "query", "tag", "h1", "isdisplayed"]);
        assert_eq!(query(&mut s, &mut ctx).await, "true");
    }

    #[tokio::test]
    async fn test_saved_result_feeds_later_substitution() {
        let mut ctx = context_with_page();
        let mut first = step(&mut ctx, &["Q1", "query", "", "", "gettitle", "", "saveas=t"]);
        query(&mut first, &mut ctx).await;

        let second = step(&mut ctx, &["Q2", "comment", "", "", "", "", "", "Title was ${t}"]);
        assert_eq!(second.description(), "Title was Home");
    }

    #[tokio::test]
    async fn test_attribute_without_parameter_is_a_step_error() {
        let mut ctx = context_with_page();
        let element = FakeElement::default();
        let mut s = step(&mut ctx, &["Q5", "query", "", "", "getattribute", "", "saveas=x"]);

        assert_eq!(query_element(&mut s, &mut ctx, &element).await, "");
        assert!(s.is_failure());
        assert!(s.errors_text().contains("getattribute"));
        assert!(ctx.variables.get("x").is_none());
    }

    #[tokio::test]
    async fn test_text_on_held_element() {
        let mut ctx = SessionContext::new(StepConfig::default());
        let element = FakeElement {
            text: "Signed in".to_string(),
            ..FakeElement::default()
        };
        let mut s = step(&mut ctx, &["Q6", "query", "", "", "gettext", "", "saveas=foo"]);

        assert_eq!(query_element(&mut s, &mut ctx, &element).await, "Signed in");
        assert_eq!(ctx.variables.get("foo"), Some("Signed in"));
    }

    #[tokio::test]
    async fn test_parameterized_queries() {
        let mut ctx = context_with_page();
        let mut s = step(&mut ctx, &["Q7", "query", "tagname", "h1", "getcssvalue", "", "param=color"]);
        assert_eq!(query(&mut s, &mut ctx).await, "rgb(0, 0, 0)");

        let mut s = step(&mut ctx, &["Q8", "query", "tagname", "h1", "getattribute", "", "param=href"]);
        assert_eq!(query(&mut s, &mut ctx).await, "");
        assert!(s.is_valid());
    }

    #[tokio::test]
    async fn test_failures_become_step_errors() {
        let mut ctx = SessionContext::new(StepConfig::default());
        let mut s = step(&mut ctx, &["E1", "query", "", "", "gettitle"]);
        assert_eq!(query(&mut s, &mut ctx).await, "");
        assert!(s.errors_text().contains("No automation session"));

        let mut ctx = context_with_page();
        let mut s = step(&mut ctx, &["E2", "query", "", "", "getcookie"]);
        assert_eq!(query(&mut s, &mut ctx).await, "");
        assert!(s.errors_text().contains("getcookie"));

        let mut s = step(&mut ctx, &["E3", "query", "tagname", "h2", "gettext", "", "saveas=missing"]);
        assert_eq!(query(&mut s, &mut ctx).await, "");
        assert!(s.is_failure());
        assert!(ctx.variables.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_failed_step_does_not_save() {
        let mut ctx = context_with_page();
        let mut s = step(&mut ctx, &["F1", "query", "", "", "gettitle", "", "saveas=t"]);
        s.add_error("earlier action failed");
        assert_eq!(query(&mut s, &mut ctx).await, "Home");
        assert!(s.saved_properties().is_empty());
        assert!(ctx.variables.get("t").is_none());
    }
}
