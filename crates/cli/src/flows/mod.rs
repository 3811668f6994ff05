//! Built-in flows and flow selection

pub mod saucedemo;

use flowcheck_core::{Flow, FlowError, FlowResult, FlowSpec};

use crate::config::HarnessConfig;
use saucedemo::{ItemPick, SauceDemoParams};

/// Name and one-line description of each built-in flow
pub const BUILTIN_FLOWS: &[(&str, &str)] = &[(
    saucedemo::FLOW_NAME,
    "Log in, buy one item, visit About, reset the app and log out",
)];

/// A flow ready to run, plus the page session setup should open
pub struct PlannedFlow {
    pub flow: Flow,
    pub start_url: Option<String>,
}

impl PlannedFlow {
    /// Built-in flow by name
    pub fn builtin(name: &str, config: &HarnessConfig) -> FlowResult<Self> {
        let flow = match name {
            saucedemo::FLOW_NAME => saucedemo::flow(&saucedemo_params(config))?,
            other => {
                return Err(FlowError::Configuration(format!(
                    "unknown flow '{}' (built-in: {})",
                    other,
                    builtin_names().join(", ")
                )))
            }
        };
        Ok(Self {
            flow,
            start_url: Some(config.target.base_url.clone()),
        })
    }

    /// Flow described by a YAML spec, with `${var}` resolved from config
    pub fn from_spec(spec: &FlowSpec, config: &HarnessConfig) -> FlowResult<Self> {
        let vars = config.flow_vars();
        let start_url = spec
            .resolved_start_url(&vars)?
            .or_else(|| Some(config.target.base_url.clone()));
        Ok(Self {
            flow: spec.to_flow(&vars)?,
            start_url,
        })
    }
}

pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN_FLOWS.iter().map(|(name, _)| *name).collect()
}

pub fn saucedemo_params(config: &HarnessConfig) -> SauceDemoParams {
    SauceDemoParams {
        base_url: config.target.base_url.clone(),
        username: config.target.username.clone(),
        password: config.target.password.clone(),
        first_name: config.checkout.first_name.clone(),
        last_name: config.checkout.last_name.clone(),
        postal_code: config.checkout.postal_code.clone(),
        item: config
            .checkout
            .item_index
            .map_or(ItemPick::Random, ItemPick::Index),
        new_tab_modifier: config.browser.new_tab_modifier.key(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_saucedemo() {
        let planned = PlannedFlow::builtin("saucedemo", &HarnessConfig::default()).unwrap();
        let names: Vec<&str> = planned.flow.steps().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "login",
                "add_item_to_cart",
                "open_cart",
                "checkout",
                "checkout_without_items",
                "open_menu",
                "open_about_link",
                "reset_app",
                "logout",
            ]
        );
        assert_eq!(planned.start_url.as_deref(), Some("https://www.saucedemo.com/"));

        let flow = &planned.flow;
        assert!(flow.step("login").unwrap().is_fatal());
        assert!(!flow.step("checkout_without_items").unwrap().is_enabled());
        assert_eq!(flow.step("reset_app").unwrap().requirements(), ["add_item_to_cart".to_string()]);
    }

    #[test]
    fn test_unknown_builtin() {
        let err = PlannedFlow::builtin("nope", &HarnessConfig::default()).err().unwrap();
        assert!(matches!(err, FlowError::Configuration(_)));
        assert!(err.to_string().contains("saucedemo"));
    }

    #[test]
    fn test_spec_start_url() {
        let spec = FlowSpec::from_yaml(
            r#"
name: smoke
start_url: "${base_url}inventory.html"
steps:
  - name: look
    priority: 1
    actions:
      - action: log
        message: hi
"#,
        )
        .unwrap();

        let planned = PlannedFlow::from_spec(&spec, &HarnessConfig::default()).unwrap();
        assert_eq!(
            planned.start_url.as_deref(),
            Some("https://www.saucedemo.com/inventory.html")
        );
        assert_eq!(planned.flow.len(), 1);
    }

    #[test]
    fn test_item_index_from_config() {
        let mut config = HarnessConfig::default();
        assert_eq!(saucedemo_params(&config).item, ItemPick::Random);
        config.checkout.item_index = Some(1);
        assert_eq!(saucedemo_params(&config).item, ItemPick::Index(1));
    }
}
