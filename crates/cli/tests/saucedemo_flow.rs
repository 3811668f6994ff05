//! Built-in saucedemo flow against a scripted driver

use flowcheck_cli::config::HarnessConfig;
use flowcheck_cli::flows::PlannedFlow;
use flowcheck_cli::run;
use flowcheck_core::mock::{MockDriver, MockElement};
use flowcheck_core::{Locator, RunOutcome, SkipReason, StepStatus};
use tempfile::TempDir;

const CONFIRMATION: &str = "Thank you for your order!";

fn config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.waits.timeout_ms = 200;
    config.waits.poll_interval_ms = 10;
    config.checkout.item_index = Some(0);
    config
}

/// A store page where every locator the flow touches resolves, minus `missing`
fn store(confirmation: &str, missing: &[Locator]) -> MockDriver {
    let elements = vec![
        (Locator::id("user-name"), MockElement::new("")),
        (Locator::id("password"), MockElement::new("")),
        (Locator::id("login-button"), MockElement::new("Login")),
        (Locator::class("inventory_list"), MockElement::new("")),
        (Locator::class("shopping_cart_link"), MockElement::new("")),
        (Locator::id("checkout"), MockElement::new("Checkout")),
        (Locator::id("first-name"), MockElement::new("")),
        (Locator::id("last-name"), MockElement::new("")),
        (Locator::id("postal-code"), MockElement::new("")),
        (Locator::id("continue"), MockElement::new("Continue")),
        (Locator::id("finish"), MockElement::new("Finish")),
        (Locator::class("complete-header"), MockElement::new(confirmation)),
        (Locator::id("back-to-products"), MockElement::new("Back Home")),
        (Locator::id("react-burger-menu-btn"), MockElement::new("")),
        (Locator::id("about_sidebar_link"), MockElement::new("About")),
        (Locator::id("reset_sidebar_link"), MockElement::new("Reset App State")),
        (Locator::id("logout_sidebar_link"), MockElement::new("Logout")),
    ];

    let mut driver = MockDriver::new().with_window("https://saucelabs.com/");
    for (locator, element) in elements {
        if !missing.contains(&locator) {
            driver = driver.with_element(locator, element);
        }
    }
    let buttons = Locator::css(".btn_inventory");
    if !missing.contains(&buttons) {
        driver = driver.with_elements(buttons, 6);
    }
    driver
}

async fn run_store(driver: MockDriver, config: &HarnessConfig) -> flowcheck_core::RunReport {
    let planned = PlannedFlow::builtin("saucedemo", config).unwrap();
    let runner = run::runner_for(&planned, config);
    run::run_one(&runner, &planned, driver, &config.output.dir)
        .await
        .unwrap()
}

fn config_in(dir: &TempDir) -> HarnessConfig {
    let mut config = config();
    config.output.dir = dir.path().to_path_buf();
    config
}

#[tokio::test]
async fn full_flow_passes() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let driver = store(CONFIRMATION, &[]);

    let report = run_store(driver.clone(), &config).await;

    use StepStatus::*;
    assert_eq!(
        report.statuses(),
        vec![Passed, Passed, Passed, Passed, Skipped, Passed, Passed, Passed, Passed]
    );
    assert_eq!(
        report.step("checkout_without_items").unwrap().skip_reason,
        Some(SkipReason::Disabled)
    );
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.exit_code(), 0);
    assert!(dir.path().join("saucedemo-report.json").exists());

    let journal = driver.journal();
    assert_eq!(journal[0], "navigate https://www.saucedemo.com/");
    assert!(journal.contains(&"maximize".to_string()));
    assert!(journal.contains(&"send_keys id=user-name standard_user".to_string()));
    assert!(journal.contains(&"send_keys id=postal-code 12345".to_string()));
    // about tab opened and left again
    assert!(journal.contains(&"switch_to_window window-1".to_string()));
    // once in add_item_to_cart, once re-run by reset_app
    assert_eq!(driver.count_calls("click css=.btn_inventory"), 2);
    assert!(journal.contains(&"click id=logout_sidebar_link".to_string()));
    assert!(driver.is_closed());
}

#[tokio::test]
async fn wrong_confirmation_fails_checkout_only() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let report = run_store(store("Thank you!", &[]), &config).await;

    let checkout = report.step("checkout").unwrap();
    assert_eq!(checkout.status, StepStatus::Failed);
    let message = checkout.message.as_deref().unwrap();
    assert!(message.contains(CONFIRMATION));
    assert!(message.contains("Thank you!"));

    // non-fatal: the rest of the flow still runs
    assert_eq!(report.step("logout").unwrap().status, StepStatus::Passed);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn missing_login_form_aborts_run() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let driver = store(CONFIRMATION, &[Locator::id("user-name")]);

    let report = run_store(driver.clone(), &config).await;

    assert_eq!(report.step("login").unwrap().status, StepStatus::Failed);
    assert!(matches!(report.outcome, RunOutcome::Aborted { .. }));
    for result in &report.steps[1..] {
        assert_eq!(result.skip_reason, Some(SkipReason::Aborted), "{}", result.step_name);
    }
    assert_eq!(driver.count_calls("click"), 0);
    assert!(driver.is_closed());
}

#[tokio::test]
async fn reset_skipped_when_item_not_added() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let driver = store(CONFIRMATION, &[Locator::css(".btn_inventory")]);

    let report = run_store(driver, &config).await;

    assert_eq!(report.step("add_item_to_cart").unwrap().status, StepStatus::Failed);
    assert_eq!(
        report.step("reset_app").unwrap().skip_reason,
        Some(SkipReason::DependencyNotPassed("add_item_to_cart".to_string()))
    );
    assert_eq!(report.step("logout").unwrap().status, StepStatus::Passed);
    assert_eq!(report.summary().failed, 1);
}

#[tokio::test]
async fn cart_badge_must_be_cleared_by_reset() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let driver = store(CONFIRMATION, &[])
        .with_element(Locator::class("shopping_cart_badge"), MockElement::new("1"));

    let report = run_store(driver, &config).await;

    let reset = report.step("reset_app").unwrap();
    assert_eq!(reset.status, StepStatus::Failed);
    assert!(reset.message.as_deref().unwrap().contains("cart badge after reset"));
}

#[tokio::test]
async fn about_tab_must_be_saucelabs() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let mut driver = MockDriver::new().with_window("https://example.com/");
    // same page as `store`, but the new tab lands elsewhere
    for (locator, element) in [
        (Locator::id("user-name"), MockElement::new("")),
        (Locator::id("password"), MockElement::new("")),
        (Locator::id("login-button"), MockElement::new("Login")),
        (Locator::class("inventory_list"), MockElement::new("")),
        (Locator::id("react-burger-menu-btn"), MockElement::new("")),
        (Locator::id("about_sidebar_link"), MockElement::new("About")),
    ] {
        driver = driver.with_element(locator, element);
    }

    let report = run_store(driver.clone(), &config).await;

    let about = report.step("open_about_link").unwrap();
    assert_eq!(about.status, StepStatus::Failed);
    assert!(about.message.as_deref().unwrap().contains("example.com"));
    // switched back to the main window before failing
    assert_eq!(driver.journal().last().map(String::as_str), Some("close"));
    assert!(driver
        .journal()
        .contains(&"switch_to_window window-0".to_string()));
}
