//! WebDriver backend for flowcheck
//!
//! - `WebDriverSession` implements `flowcheck_core::Driver` on top of a W3C
//!   WebDriver session (chromedriver, msedgedriver, geckodriver, Selenium Grid)
//! - `DriverProcess` optionally spawns the driver binary and waits until it
//!   reports ready

pub mod error;
pub mod process;
pub mod session;

pub use error::{SessionError, SessionResult};
pub use process::{DriverProcess, DriverProcessConfig};
pub use session::{Browser, SessionConfig, WebDriverSession};
