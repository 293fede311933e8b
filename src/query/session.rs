//! Session-level queries

use async_trait::async_trait;

use crate::common::{Error, Result};
use crate::driver::Driver;
use crate::step::TestStep;

use super::{QueryFunction, QueryStrategy};

/// Answers `gettitle`, `getcurrenturl`, `getpagesource` and `getwindowhandle`
pub struct SessionQuery<'a> {
    driver: Option<&'a dyn Driver>,
}

impl<'a> SessionQuery<'a> {
    pub fn new(driver: Option<&'a dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl<'a> QueryStrategy for SessionQuery<'a> {
    async fn query(&self, function: QueryFunction, _step: &TestStep) -> Result<String> {
        let driver = self.driver.ok_or(Error::NoSession)?;
        match function {
            QueryFunction::Title => driver.title().await,
            QueryFunction::CurrentUrl => driver.current_url().await,
            QueryFunction::PageSource => driver.page_source().await,
            QueryFunction::WindowHandle => driver.window_handle().await,
            other => Err(Error::UnsupportedQuery(format!(
                "{} is not a session-level query",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fakes::FakeDriver;
    use crate::source::SourceRow;

    #[tokio::test]
    async fn test_session_functions() {
        let driver = FakeDriver {
            title: "Inbox".to_string(),
            url: "https://mail.test/inbox".to_string(),
            ..FakeDriver::default()
        };
        let step = TestStep::from_row(&SourceRow::default());
        let strategy = SessionQuery::new(Some(&driver));

        assert_eq!(strategy.query(QueryFunction::Title, &step).await.unwrap(), "Inbox");
        assert_eq!(
            strategy.query(QueryFunction::CurrentUrl, &step).await.unwrap(),
            "https://mail.test/inbox"
        );
        assert_eq!(
            strategy.query(QueryFunction::WindowHandle, &step).await.unwrap(),
            "window-1"
        );
        assert!(strategy
            .query(QueryFunction::PageSource, &step)
            .await
            .unwrap()
            .contains("Inbox"));
    }

    #[tokio::test]
    async fn test_element_function_rejected() {
        let driver = FakeDriver::default();
        let step = TestStep::from_row(&SourceRow::default());
        let err = SessionQuery::new(Some(&driver))
            .query(QueryFunction::Text, &step)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedQuery(_)));
    }

    #[tokio::test]
    async fn test_no_session() {
        let step = TestStep::from_row(&SourceRow::default());
        let err = SessionQuery::new(None)
            .query(QueryFunction::Title, &step)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSession));
    }
}
