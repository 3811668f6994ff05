//! Purchase-and-navigation flow against the Sauce Labs demo store
//!
//! Nine steps in priority order: log in, add an item, open the cart, check
//! out, (disabled) check out with an empty cart, open the side menu, open
//! the About page in a new tab, reset the app state, log out.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

use flowcheck_core::{
    keys, Condition, Driver, Flow, FlowError, FlowResult, Step, StepAction, StepContext,
};

/// Text of `.complete-header` after a successful order
pub const ORDER_CONFIRMATION: &str = "Thank you for your order!";

pub const FLOW_NAME: &str = "saucedemo";

/// Everything the flow types or navigates to
#[derive(Debug, Clone)]
pub struct SauceDemoParams {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub postal_code: String,
    pub item: ItemPick,
    /// Held with RETURN to open a link in a new tab
    pub new_tab_modifier: char,
}

/// Which inventory button `add_item_to_cart` clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPick {
    Random,
    Index(usize),
}

impl ItemPick {
    fn choose(&self, available: usize) -> FlowResult<usize> {
        match *self {
            ItemPick::Random => Ok(rand::thread_rng().gen_range(0..available)),
            ItemPick::Index(i) if i < available => Ok(i),
            ItemPick::Index(i) => Err(FlowError::Configuration(format!(
                "item index {} out of range, page has {} item(s)",
                i, available
            ))),
        }
    }
}

mod ids {
    use flowcheck_core::Locator;

    pub fn username() -> Locator {
        Locator::id("user-name")
    }
    pub fn password() -> Locator {
        Locator::id("password")
    }
    pub fn login_button() -> Locator {
        Locator::id("login-button")
    }
    pub fn inventory_list() -> Locator {
        Locator::class("inventory_list")
    }
    pub fn inventory_buttons() -> Locator {
        Locator::css(".btn_inventory")
    }
    pub fn cart_link() -> Locator {
        Locator::class("shopping_cart_link")
    }
    pub fn cart_badge() -> Locator {
        Locator::class("shopping_cart_badge")
    }
    pub fn checkout() -> Locator {
        Locator::id("checkout")
    }
    pub fn first_name() -> Locator {
        Locator::id("first-name")
    }
    pub fn last_name() -> Locator {
        Locator::id("last-name")
    }
    pub fn postal_code() -> Locator {
        Locator::id("postal-code")
    }
    pub fn continue_button() -> Locator {
        Locator::id("continue")
    }
    pub fn finish() -> Locator {
        Locator::id("finish")
    }
    pub fn complete_header() -> Locator {
        Locator::class("complete-header")
    }
    pub fn error_message() -> Locator {
        Locator::id("error-message-container")
    }
    pub fn back_to_products() -> Locator {
        Locator::id("back-to-products")
    }
    pub fn menu_button() -> Locator {
        Locator::id("react-burger-menu-btn")
    }
    pub fn about_link() -> Locator {
        Locator::id("about_sidebar_link")
    }
    pub fn reset_link() -> Locator {
        Locator::id("reset_sidebar_link")
    }
    pub fn logout_link() -> Locator {
        Locator::id("logout_sidebar_link")
    }
}

/// `base` joined with a page path
fn page(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

struct Login {
    username: String,
    password: String,
}

#[async_trait]
impl StepAction for Login {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        ctx.type_text(driver, &ids::username(), &self.username).await?;
        ctx.type_text(driver, &ids::password(), &self.password).await?;
        ctx.click(driver, &ids::login_button()).await?;
        ctx.waiter()
            .wait_for(driver, &ids::inventory_list(), Condition::Present)
            .await?;
        Ok(())
    }
}

struct AddItemToCart {
    pick: ItemPick,
}

#[async_trait]
impl StepAction for AddItemToCart {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        let buttons = ctx
            .waiter()
            .wait_for(driver, &ids::inventory_buttons(), Condition::CountAtLeast(1))
            .await?;
        let index = self.pick.choose(buttons.len())?;
        debug!("Adding item {} of {}", index, buttons.len());
        driver.click(&buttons[index]).await
    }
}

struct OpenCart;

#[async_trait]
impl StepAction for OpenCart {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        ctx.click(driver, &ids::cart_link()).await
    }
}

struct Checkout {
    first_name: String,
    last_name: String,
    postal_code: String,
}

#[async_trait]
impl StepAction for Checkout {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        ctx.click(driver, &ids::checkout()).await?;
        ctx.type_text(driver, &ids::first_name(), &self.first_name).await?;
        ctx.type_text(driver, &ids::last_name(), &self.last_name).await?;
        ctx.type_text(driver, &ids::postal_code(), &self.postal_code).await?;
        ctx.click(driver, &ids::continue_button()).await?;
        ctx.click(driver, &ids::finish()).await?;

        let header = ctx.text_of(driver, &ids::complete_header()).await?;
        ctx.assertions()
            .expect_equal(header.as_str(), ORDER_CONFIRMATION, "order confirmation")
    }
}

struct CheckoutWithoutItems {
    base_url: String,
}

#[async_trait]
impl StepAction for CheckoutWithoutItems {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        ctx.click(driver, &ids::cart_link()).await?;

        let errors = ctx
            .waiter()
            .wait_for(driver, &ids::error_message(), Condition::Present)
            .await
            .unwrap_or_default();
        ctx.assertions()
            .expect_true(!errors.is_empty(), "empty cart shows an error message")?;
        info!("Error message displayed: {}", driver.text(&errors[0]).await?);

        driver.navigate(&page(&self.base_url, "inventory.html")).await
    }
}

struct OpenMenu;

#[async_trait]
impl StepAction for OpenMenu {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        ctx.click(driver, &ids::menu_button()).await
    }
}

struct OpenAboutLink {
    modifier: char,
}

#[async_trait]
impl StepAction for OpenAboutLink {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        let main = driver.current_window().await?;

        let link = ctx.element(driver, &ids::about_link()).await?;
        driver
            .send_keys(&link, &keys::chord(&[self.modifier, keys::RETURN]))
            .await?;

        let handles = ctx
            .waiter()
            .until("a second window", move || async move {
                let handles = driver.window_handles().await?;
                Ok((handles.len() >= 2).then_some(handles))
            })
            .await?;
        let tab = handles
            .into_iter()
            .find(|h| *h != main)
            .ok_or_else(|| FlowError::Driver("new tab not found".to_string()))?;

        driver.switch_to_window(&tab).await?;
        let url = driver.current_url().await;
        driver.switch_to_window(&main).await?;
        info!("Back to main page");

        let url = url?;
        ctx.assertions().expect_true(
            url.contains("saucelabs"),
            &format!("about page is on saucelabs (got {})", url),
        )
    }
}

/// Returns to the first window, re-adds an item, then resets the app
struct ResetApp {
    add_item: Arc<dyn StepAction>,
}

#[async_trait]
impl StepAction for ResetApp {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        let handles = driver.window_handles().await?;
        if let Some(first) = handles.first() {
            driver.switch_to_window(first).await?;
        }
        driver.refresh().await?;

        ctx.click(driver, &ids::back_to_products()).await?;
        self.add_item.run(driver, ctx).await?;

        let menu = driver.find_elements(&ids::menu_button()).await?;
        if let Some(button) = menu.first() {
            driver.click(button).await?;
            if !driver.find_elements(&ids::reset_link()).await?.is_empty() {
                ctx.click(driver, &ids::reset_link()).await?;
            }
        }

        let badge = driver.find_elements(&ids::cart_badge()).await?;
        if let Some(badge) = badge.first() {
            let count = driver.text(badge).await?;
            ctx.assertions().expect_equal(count.as_str(), "0", "cart badge after reset")?;
        }
        Ok(())
    }
}

struct Logout;

#[async_trait]
impl StepAction for Logout {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        let links = driver.find_elements(&ids::logout_link()).await?;
        let menu_open = match links.first() {
            Some(link) => driver.is_displayed(link).await?,
            None => false,
        };
        if !menu_open {
            ctx.click(driver, &ids::menu_button()).await?;
        }

        ctx.click(driver, &ids::logout_link()).await?;
        ctx.waiter()
            .wait_for(driver, &ids::login_button(), Condition::Present)
            .await?;
        Ok(())
    }
}

/// Build the flow
pub fn flow(params: &SauceDemoParams) -> FlowResult<Flow> {
    let add_item: Arc<dyn StepAction> = Arc::new(AddItemToCart { pick: params.item });

    let steps = vec![
        Step::new(
            "login",
            1,
            Login {
                username: params.username.clone(),
                password: params.password.clone(),
            },
        )
        .fatal(),
        Step::from_arc("add_item_to_cart", 2, add_item.clone()),
        Step::new("open_cart", 3, OpenCart),
        Step::new(
            "checkout",
            4,
            Checkout {
                first_name: params.first_name.clone(),
                last_name: params.last_name.clone(),
                postal_code: params.postal_code.clone(),
            },
        ),
        Step::new(
            "checkout_without_items",
            5,
            CheckoutWithoutItems {
                base_url: params.base_url.clone(),
            },
        )
        .disabled(),
        Step::new("open_menu", 6, OpenMenu),
        Step::new(
            "open_about_link",
            7,
            OpenAboutLink {
                modifier: params.new_tab_modifier,
            },
        ),
        Step::new("reset_app", 8, ResetApp { add_item }).requires("add_item_to_cart"),
        Step::new("logout", 9, Logout),
    ];

    Flow::new(FLOW_NAME, steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_join() {
        assert_eq!(
            page("https://www.saucedemo.com/", "inventory.html"),
            "https://www.saucedemo.com/inventory.html"
        );
        assert_eq!(page("http://localhost:3000", "inventory.html"), "http://localhost:3000/inventory.html");
    }

    #[test]
    fn test_item_pick() {
        assert_eq!(ItemPick::Index(2).choose(6).unwrap(), 2);
        assert!(matches!(ItemPick::Index(6).choose(6), Err(FlowError::Configuration(_))));
        for _ in 0..50 {
            assert!(ItemPick::Random.choose(6).unwrap() < 6);
        }
    }
}
