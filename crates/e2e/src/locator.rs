//! Element locators
//!
//! A locator is written as a single string in suites:
//!
//! - `sel=signin-username` matches `[data-test="signin-username"]`
//! - `like=signup` matches any `data-test` containing `signup`
//! - `css=#username-helper-text` (or a bare CSS selector) is used as-is
//!
//! A trailing `>> input` refines the match to descendants of each element.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::E2eError;

/// Attribute the application exposes for stable element addressing
pub const TEST_ATTRIBUTE: &str = "data-test";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Exact `data-test` value
    TestId(String),
    /// `data-test` value containing the given text
    TestIdLike(String),
    /// Raw CSS selector
    Css(String),
}

impl Selector {
    pub fn to_css(&self) -> String {
        match self {
            Selector::TestId(id) => format!(r#"[{}="{}"]"#, TEST_ATTRIBUTE, escape(id)),
            Selector::TestIdLike(id) => format!(r#"[{}*="{}"]"#, TEST_ATTRIBUTE, escape(id)),
            Selector::Css(css) => css.clone(),
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    pub selector: Selector,
    /// Descendant CSS selector applied inside each match
    pub within: Option<String>,
}

impl Locator {
    pub fn test_id(id: impl Into<String>) -> Self {
        Self {
            selector: Selector::TestId(id.into()),
            within: None,
        }
    }

    pub fn test_id_like(id: impl Into<String>) -> Self {
        Self {
            selector: Selector::TestIdLike(id.into()),
            within: None,
        }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Self {
            selector: Selector::Css(css.into()),
            within: None,
        }
    }

    /// Refine to descendants matching `css`
    pub fn find(mut self, css: impl Into<String>) -> Self {
        self.within = Some(css.into());
        self
    }

    /// CSS selector of the outer match
    pub fn root_css(&self) -> String {
        self.selector.to_css()
    }
}

impl FromStr for Locator {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| E2eError::InvalidLocator {
            locator: s.to_string(),
            reason: reason.to_string(),
        };

        let (head, within) = match s.split_once(">>") {
            Some((head, tail)) => {
                let tail = tail.trim();
                if tail.is_empty() {
                    return Err(invalid("empty descendant selector after '>>'"));
                }
                (head.trim(), Some(tail.to_string()))
            }
            None => (s.trim(), None),
        };

        let selector = if let Some(id) = head.strip_prefix("sel=") {
            Selector::TestId(id.to_string())
        } else if let Some(id) = head.strip_prefix("like=") {
            Selector::TestIdLike(id.to_string())
        } else if let Some(css) = head.strip_prefix("css=") {
            Selector::Css(css.to_string())
        } else {
            Selector::Css(head.to_string())
        };

        let empty = match &selector {
            Selector::TestId(v) | Selector::TestIdLike(v) | Selector::Css(v) => v.trim().is_empty(),
        };
        if empty {
            return Err(invalid("empty selector"));
        }

        Ok(Locator { selector, within })
    }
}

impl TryFrom<String> for Locator {
    type Error = E2eError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            Selector::TestId(id) => write!(f, "sel={}", id)?,
            Selector::TestIdLike(id) => write!(f, "like={}", id)?,
            Selector::Css(css) => write!(f, "{}", css)?,
        }
        if let Some(within) = &self.within {
            write!(f, " >> {}", within)?;
        }
        Ok(())
    }
}
