//! Element locators

use serde::{Deserialize, Serialize};
use std::fmt;

/// How to find one or more elements on a page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// `id` attribute
    Id(String),
    /// A single class name
    ClassName(String),
    /// CSS selector
    Css(String),
    /// XPath expression
    #[serde(rename = "xpath")]
    XPath(String),
    /// Exact link text
    LinkText(String),
    /// `name` attribute
    Name(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn class(name: impl Into<String>) -> Self {
        Locator::ClassName(name.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn link_text(text: impl Into<String>) -> Self {
        Locator::LinkText(text.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Locator::Name(name.into())
    }

    /// The raw selector value without its strategy
    pub fn value(&self) -> &str {
        match self {
            Locator::Id(v)
            | Locator::ClassName(v)
            | Locator::Css(v)
            | Locator::XPath(v)
            | Locator::LinkText(v)
            | Locator::Name(v) => v,
        }
    }

    fn strategy(&self) -> &'static str {
        match self {
            Locator::Id(_) => "id",
            Locator::ClassName(_) => "class",
            Locator::Css(_) => "css",
            Locator::XPath(_) => "xpath",
            Locator::LinkText(_) => "link",
            Locator::Name(_) => "name",
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Locator::id("user-name").to_string(), "id=user-name");
        assert_eq!(Locator::class("btn_inventory").to_string(), "class=btn_inventory");
        assert_eq!(Locator::css(".a > b").to_string(), "css=.a > b");
    }

    #[derive(Deserialize)]
    struct Target {
        locator: Locator,
    }

    #[test]
    fn test_yaml_shape() {
        // as written inside a flow step
        let target: Target = serde_yaml::from_str("locator: { class_name: complete-header }").unwrap();
        assert_eq!(target.locator, Locator::class("complete-header"));

        let target: Target = serde_yaml::from_str("locator:\n  xpath: //div\n").unwrap();
        assert_eq!(target.locator, Locator::xpath("//div"));

        // a bare locator document uses the tagged form
        let loc: Locator = serde_yaml::from_str("!link_text About").unwrap();
        assert_eq!(loc, Locator::LinkText("About".to_string()));
    }
}
