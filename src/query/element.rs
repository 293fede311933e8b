//! Element-level queries

use async_trait::async_trait;

use crate::common::{Error, Result};
use crate::driver::Element;
use crate::step::{TestStep, PARAM_KEY};

use super::{QueryFunction, QueryStrategy, Surface};

/// Answers reads against one element handle
pub struct ElementQuery<'a> {
    element: Option<&'a dyn Element>,
}

impl<'a> ElementQuery<'a> {
    pub fn new(element: Option<&'a dyn Element>) -> Self {
        Self { element }
    }
}

fn parameter(function: QueryFunction, step: &TestStep) -> Result<String> {
    step.property(PARAM_KEY)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::MissingParameter {
            function: function.name().to_string(),
            key: PARAM_KEY.to_string(),
        })
}

#[async_trait]
impl<'a> QueryStrategy for ElementQuery<'a> {
    async fn query(&self, function: QueryFunction, step: &TestStep) -> Result<String> {
        if function.surface() != Surface::Element {
            return Err(Error::UnsupportedQuery(format!(
                "{} is not an element-level query",
                function
            )));
        }
        let param = if function.needs_parameter() {
            Some(parameter(function, step)?)
        } else {
            None
        };
        let element = self
            .element
            .ok_or_else(|| Error::Driver(format!("{} needs an element handle", function)))?;

        let value = match (function, param) {
            (QueryFunction::Text, _) => element.text().await?,
            (QueryFunction::Enabled, _) => element.is_enabled().await?.to_string(),
            (QueryFunction::Displayed, _) => element.is_displayed().await?.to_string(),
            (QueryFunction::Selected, _) => element.is_selected().await?.to_string(),
            (QueryFunction::Location, _) => element.rect().await?.location(),
            (QueryFunction::Size, _) => element.rect().await?.size(),
            (QueryFunction::TagName, _) => element.tag_name().await?,
            (QueryFunction::Class, _) => element.attribute("class").await?.unwrap_or_default(),
            (QueryFunction::CssValue, Some(property)) => element.css_value(&property).await?,
            (QueryFunction::Attribute, Some(name)) => {
                element.attribute(&name).await?.unwrap_or_default()
            }
            (other, _) => return Err(Error::UnsupportedQuery(other.to_string())),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::StepConfig;
    use crate::driver::Rect;
    use crate::query::fakes::FakeElement;
    use crate::session::SessionContext;
    use crate::source::SourceRow;

    fn step_with_data(data: &str) -> TestStep {
        let cells = vec![
            "E".to_string(),
            "query".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            data.to_string(),
        ];
        let mut step = TestStep::from_row(&SourceRow::from_cells(cells));
        step.initialize(&mut SessionContext::new(StepConfig::default()))
            .unwrap();
        step
    }

    fn button() -> FakeElement {
        let mut element = FakeElement {
            text: "Save".to_string(),
            tag: "button".to_string(),
            enabled: true,
            displayed: true,
            selected: false,
            rect: Rect {
                x: 10.0,
                y: 20.4,
                width: 80.0,
                height: 24.6,
            },
            ..FakeElement::default()
        };
        element.attributes.insert("type".to_string(), "submit".to_string());
        element
    }

    #[tokio::test]
    async fn test_element_reads() {
        let element = button();
        let strategy = ElementQuery::new(Some(&element));
        let step = step_with_data("");

        let expected = [
            (QueryFunction::Text, "Save"),
            (QueryFunction::Enabled, "true"),
            (QueryFunction::Selected, "false"),
            (QueryFunction::Location, "(10, 20)"),
            (QueryFunction::Size, "(80, 25)"),
            (QueryFunction::TagName, "button"),
            (QueryFunction::Class, ""),
        ];
        for (function, value) in expected {
            assert_eq!(strategy.query(function, &step).await.unwrap(), value, "{}", function);
        }
    }

    #[tokio::test]
    async fn test_parameter_required() {
        let element = button();
        let strategy = ElementQuery::new(Some(&element));

        let err = strategy
            .query(QueryFunction::Attribute, &step_with_data("param=  "))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter { .. }));

        let value = strategy
            .query(QueryFunction::Attribute, &step_with_data("param=type"))
            .await
            .unwrap();
        assert_eq!(value, "submit");
    }

    #[tokio::test]
    async fn test_session_function_rejected() {
        let element = button();
        let err = ElementQuery::new(Some(&element))
            .query(QueryFunction::Title, &step_with_data(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedQuery(_)));
    }

    #[tokio::test]
    async fn test_no_element_handle() {
        let err = ElementQuery::new(None)
            .query(QueryFunction::Text, &step_with_data(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Driver(_)));
    }
}
