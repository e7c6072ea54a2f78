//! RWA E2E scenario runner
//!
//! Drives a real browser through declarative YAML scenarios against the
//! Real World App:
//! - Seeds application data before every scenario
//! - Observes browser traffic through an intercept proxy and aliases requests
//! - Talks to chromedriver/geckodriver over the W3C WebDriver protocol
//! - Captures visual snapshots and compares them against baselines out-of-band
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ScenarioRunner (Rust)                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  per scenario:                                               │
//! │    ├── ledger.reset()                                        │
//! │    ├── Seeder::seed()            HTTP | command | none       │
//! │    ├── ledger.register(rules)    first match wins            │
//! │    ├── BrowserLauncher::launch(viewport) -> Box<dyn Browser> │
//! │    └── steps, fail-fast, implicit waits every 50 ms          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  browser ──▶ InterceptProxy ──▶ app                          │
//! │                   │                                          │
//! │                   └── observe/complete ──▶ InterceptLedger   │
//! │                                              ▲               │
//! │  wait { alias } ─────────────────────────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod harness;
pub mod intercept;
pub mod locator;
pub mod proxy;
pub mod runner;
pub mod seed;
pub mod spec;
pub mod suites;
pub mod vars;
pub mod visual;
pub mod webdriver;

pub use browser::{Browser, BrowserLauncher, Cookie, ElementHandle, ElementState};
pub use config::E2eConfig;
pub use device::{NavigationLayout, Viewport};
pub use error::{E2eError, E2eResult, FailureKind};
pub use harness::Harness;
pub use intercept::{InterceptLedger, InterceptRule, InterceptedRequest};
pub use locator::Locator;
pub use runner::{RunSettings, ScenarioResult, ScenarioRunner, SuiteResult};
pub use seed::{FixtureUser, Seeder};
pub use spec::{ScenarioSpec, SuiteSpec, TestStep};
