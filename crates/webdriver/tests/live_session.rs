//! Live browser checks
//!
//! Needs a running WebDriver endpoint. Run with:
//! `FLOWCHECK_WEBDRIVER_URL=http://127.0.0.1:4444 cargo test -p flowcheck-webdriver -- --ignored`

use std::time::Duration;

use flowcheck_core::{Condition, Driver, ElementWaiter, Locator};
use flowcheck_webdriver::{Browser, SessionConfig, WebDriverSession};

fn config() -> Option<SessionConfig> {
    let server_url = std::env::var("FLOWCHECK_WEBDRIVER_URL").ok()?;
    let browser = std::env::var("FLOWCHECK_BROWSER")
        .ok()
        .and_then(|b| b.parse::<Browser>().ok())
        .unwrap_or_default();
    Some(SessionConfig {
        server_url,
        browser,
        headless: true,
    })
}

#[tokio::test]
#[ignore]
async fn login_page_has_credentials_form() {
    let Some(config) = config() else {
        eprintln!("FLOWCHECK_WEBDRIVER_URL not set; skipping");
        return;
    };

    let session = WebDriverSession::connect(&config).await.unwrap();
    session.navigate("https://www.saucedemo.com/").await.unwrap();

    let waiter = ElementWaiter::new(Duration::from_secs(10), Duration::from_millis(250));
    let button = waiter
        .wait_for_element(&session, &Locator::id("login-button"), Condition::Visible)
        .await
        .unwrap();

    assert!(session.is_displayed(&button).await.unwrap());
    assert!(session.current_url().await.unwrap().contains("saucedemo"));
    assert_eq!(session.window_handles().await.unwrap().len(), 1);

    // polling the same element does not grow the handle registry
    for _ in 0..20 {
        let again = session.find_element(&Locator::id("login-button")).await.unwrap();
        assert_eq!(again, button);
    }
    assert_eq!(session.registered_elements(), 1);

    session.close().await.unwrap();
    // second close is a no-op
    session.close().await.unwrap();
}
