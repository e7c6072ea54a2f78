//! Scenario runner: seeds, registers intercepts, drives one browser session
//! per scenario and records the verdict

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::browser::{Browser, BrowserLauncher, ElementHandle, ElementState};
use crate::config::E2eConfig;
use crate::device::{NavigationLayout, Viewport};
use crate::error::{E2eError, E2eResult, FailureKind};
use crate::intercept::{InterceptLedger, InterceptRule, InterceptedRequest};
use crate::locator::Locator;
use crate::seed::Seeder;
use crate::spec::{ScenarioSpec, SetupSpec, SuiteSpec, TestStep};
use crate::vars::Variables;
use crate::visual::SnapshotStore;

/// Polling period for implicit waits and retried assertions
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const RESULTS_FILE: &str = "test-results.json";

/// Alias the `login` step waits on
pub const LOGIN_ALIAS: &str = "loginUser";

/// Result of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Why a scenario failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// Failing step label; `None` when setup failed or the budget ran out
    pub step: Option<String>,
    pub message: String,
}

impl Failure {
    fn setup(err: E2eError) -> Self {
        Self {
            kind: FailureKind::Infrastructure,
            step: None,
            message: err.to_string(),
        }
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub viewport: Viewport,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub failure: Option<Failure>,
    /// Snapshot keys captured, for the out-of-band visual pass
    pub snapshots: Vec<String>,
    /// Network traffic the ledger saw
    pub requests: Vec<InterceptedRequest>,
}

/// Result of running a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub run_id: Uuid,
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn merge(runs: Vec<SuiteResult>) -> Option<SuiteResult> {
        let mut runs = runs.into_iter();
        let mut merged = runs.next()?;
        for run in runs {
            merged.suite = format!("{}, {}", merged.suite, run.suite);
            merged.total += run.total;
            merged.passed += run.passed;
            merged.failed += run.failed;
            merged.duration_ms += run.duration_ms;
            merged.results.extend(run.results);
        }
        Some(merged)
    }
}

/// Values the runner needs from [`E2eConfig`]
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub base_url: Url,
    pub api_url: String,
    pub viewport: Viewport,
    pub mobile_breakpoint: u32,
    pub nav_toggle: String,
    pub command_timeout: Duration,
    pub request_timeout: Duration,
    pub scenario_timeout: Duration,
    pub snapshot_dir: PathBuf,
}

impl RunSettings {
    pub fn from_config(config: &E2eConfig) -> E2eResult<Self> {
        Ok(Self {
            base_url: Url::parse(&config.app.base_url)?,
            api_url: config.app.api_url.trim_end_matches('/').to_string(),
            viewport: config.browser.viewport,
            mobile_breakpoint: config.browser.mobile_breakpoint,
            nav_toggle: config.browser.nav_toggle.clone(),
            command_timeout: config.timeouts.command(),
            request_timeout: config.timeouts.request(),
            scenario_timeout: config.timeouts.scenario(),
            snapshot_dir: config.visual.snapshot_dir.clone(),
        })
    }
}

/// Runs suites scenario by scenario
pub struct ScenarioRunner {
    launcher: Arc<dyn BrowserLauncher>,
    seeder: Arc<dyn Seeder>,
    ledger: Arc<InterceptLedger>,
    snapshots: SnapshotStore,
    settings: RunSettings,
    viewport_override: Option<Viewport>,
}

impl ScenarioRunner {
    pub fn new(
        settings: RunSettings,
        launcher: Arc<dyn BrowserLauncher>,
        seeder: Arc<dyn Seeder>,
        ledger: Arc<InterceptLedger>,
    ) -> Self {
        Self {
            launcher,
            seeder,
            ledger,
            snapshots: SnapshotStore::new(settings.snapshot_dir.clone()),
            settings,
            viewport_override: None,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Force every scenario onto one viewport, ignoring per-scenario ones
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport_override = Some(viewport);
        self
    }

    /// Run every scenario of a suite; failures never stop later scenarios
    pub async fn run_suite(&self, suite: &SuiteSpec) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(suite.scenarios.len());
        let mut passed = 0;
        let mut failed = 0;

        info!("Running suite '{}': {} scenario(s)", suite.name, suite.scenarios.len());

        for scenario in &suite.scenarios {
            let result = self.run_scenario(&suite.setup, scenario).await;
            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                let message = result
                    .failure
                    .as_ref()
                    .map(|f| f.message.as_str())
                    .unwrap_or("unknown error");
                error!("✗ {} - {}", result.name, message);
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Suite '{}': {} passed, {} failed ({} ms)",
            suite.name, passed, failed, duration_ms
        );

        SuiteResult {
            run_id: Uuid::new_v4(),
            suite: suite.name.clone(),
            started_at,
            total: suite.scenarios.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Run a single scenario under the suite's setup
    pub async fn run_scenario(&self, setup: &SetupSpec, scenario: &ScenarioSpec) -> ScenarioResult {
        let start = Instant::now();
        let viewport = self
            .viewport_override
            .or(scenario.viewport)
            .unwrap_or(self.settings.viewport);
        debug!("Running scenario '{}' at {}", scenario.name, viewport);

        let mut browser: Option<Box<dyn Browser>> = None;
        let mut record = Record::default();

        let outcome = tokio::time::timeout(
            self.settings.scenario_timeout,
            self.execute(setup, scenario, viewport, &mut browser, &mut record),
        )
        .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(failure)) => Some(failure),
            Err(_) => Some(Failure {
                kind: FailureKind::Timeout,
                step: None,
                message: format!(
                    "scenario exceeded {} ms",
                    self.settings.scenario_timeout.as_millis()
                ),
            }),
        };

        if let Some(mut session) = browser.take() {
            if let Err(e) = session.close().await {
                warn!("Failed to close browser session: {}", e);
            }
        }

        ScenarioResult {
            name: scenario.name.clone(),
            success: failure.is_none(),
            viewport,
            duration_ms: start.elapsed().as_millis() as u64,
            steps: record.steps,
            failure,
            snapshots: record.snapshots,
            requests: self.ledger.requests(),
        }
    }

    async fn execute(
        &self,
        setup: &SetupSpec,
        scenario: &ScenarioSpec,
        viewport: Viewport,
        browser: &mut Option<Box<dyn Browser>>,
        record: &mut Record,
    ) -> Result<(), Failure> {
        let mut vars = Variables::new();
        vars.set("apiUrl", self.settings.api_url.clone());

        self.prepare(setup, &vars).await.map_err(Failure::setup)?;

        let session = self.launcher.launch(viewport).await.map_err(Failure::setup)?;
        let browser = browser.insert(session);

        let mut ctx = StepContext {
            runner: self,
            browser: browser.as_mut(),
            vars,
            layout: NavigationLayout::for_viewport(viewport, self.settings.mobile_breakpoint),
            scenario: &scenario.name,
        };

        for step in &scenario.steps {
            let label = step.label();
            let started = Instant::now();
            debug!("Step: {}", label);

            let result = ctx.perform(step, record).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(()) => record.steps.push(StepResult {
                    step: label,
                    success: true,
                    duration_ms,
                    error: None,
                }),
                Err(e) => {
                    let message = e.to_string();
                    record.steps.push(StepResult {
                        step: label.clone(),
                        success: false,
                        duration_ms,
                        error: Some(message.clone()),
                    });
                    return Err(Failure {
                        kind: e.kind(),
                        step: Some(label),
                        message,
                    });
                }
            }
        }

        Ok(())
    }

    /// Ledger reset, seeding and intercept registration
    async fn prepare(&self, setup: &SetupSpec, vars: &Variables) -> E2eResult<()> {
        self.ledger.reset();

        if setup.seed {
            self.seeder.seed().await?;
        }

        for rule in &setup.intercepts {
            let mut rule = rule.clone();
            rule.url = vars.interpolate(&rule.url)?;
            self.ledger.register(rule);
        }
        Ok(())
    }
}

#[derive(Default)]
struct Record {
    steps: Vec<StepResult>,
    snapshots: Vec<String>,
}

/// What a retried check inspects on each attempt
enum Probe<'a> {
    Elements(&'a Locator),
    Pathname,
    Cookie(&'a str),
}

enum Observation {
    Elements(Vec<ElementState>),
    Pathname(String),
    Cookie(Option<crate::browser::Cookie>),
}

/// A check that did not hold: (description, expected, actual)
type Mismatch = (String, String, String);

/// Requirements an element must meet before it is acted on
#[derive(Clone, Copy)]
struct Actionable {
    visible: bool,
    enabled: bool,
}

impl Actionable {
    const INTERACT: Self = Self {
        visible: true,
        enabled: true,
    };
    /// Checkbox inputs are often visually hidden behind a styled box
    const TOGGLE: Self = Self {
        visible: false,
        enabled: true,
    };
    const FOCUS: Self = Self {
        visible: true,
        enabled: false,
    };
}

struct StepContext<'a> {
    runner: &'a ScenarioRunner,
    browser: &'a mut dyn Browser,
    vars: Variables,
    layout: NavigationLayout,
    scenario: &'a str,
}

impl<'a> StepContext<'a> {
    fn settings(&self) -> &RunSettings {
        &self.runner.settings
    }

    async fn perform(&mut self, step: &TestStep, record: &mut Record) -> E2eResult<()> {
        match step {
            TestStep::Visit { path } => {
                let path = self.vars.interpolate(path)?;
                self.visit(&path).await
            }
            TestStep::Type { target, text } => {
                let text = self.vars.interpolate(text)?;
                let element = self.actionable(target, Actionable::INTERACT).await?;
                self.browser.type_text(&element, &text).await
            }
            TestStep::Clear { target } => {
                let element = self.actionable(target, Actionable::INTERACT).await?;
                self.browser.clear(&element).await
            }
            TestStep::Blur { target } => {
                let element = self.actionable(target, Actionable::FOCUS).await?;
                self.browser.blur(&element).await
            }
            TestStep::Click { target } => self.click(target).await,
            TestStep::Check { target } => {
                let element = self.actionable(target, Actionable::TOGGLE).await?;
                self.browser.check(&element).await
            }
            TestStep::NavClick { target } => {
                if self.layout.requires_toggle() {
                    let toggle = Locator::test_id(self.settings().nav_toggle.clone());
                    self.click(&toggle).await?;
                }
                self.click(target).await
            }
            TestStep::Login {
                username,
                password,
                remember,
            } => {
                let username = self.vars.interpolate(username)?;
                let password = self.vars.interpolate(password)?;
                self.login(&username, &password, *remember).await
            }
            TestStep::FindUser { bind } => {
                let user = self.runner.seeder.find_user().await?;
                debug!("Bound fixture user '{}' as '{}'", user.username, bind);
                self.vars.bind_user(bind, &user);
                Ok(())
            }
            TestStep::Intercept {
                method,
                url,
                body,
                alias,
            } => {
                let rule = InterceptRule {
                    method: method.clone(),
                    url: self.vars.interpolate(url)?,
                    body: body.clone(),
                    alias: alias.clone(),
                };
                self.runner.ledger.register(rule);
                Ok(())
            }
            TestStep::Wait { alias, timeout_ms } => {
                let timeout = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.settings().request_timeout);
                let request = self.runner.ledger.wait(alias, timeout).await?;
                debug!(
                    "@{} completed: {} {} -> {:?}",
                    alias, request.method, request.url, request.status
                );
                Ok(())
            }
            TestStep::Snapshot { name } => {
                let png = self.browser.screenshot().await?;
                let key = SnapshotStore::key(self.scenario, name);
                self.runner.snapshots.save(&key, &png)?;
                record.snapshots.push(key);
                Ok(())
            }
            TestStep::Assert {
                target,
                visible,
                exist,
                disabled,
                text,
                contain,
            } => {
                let text = text.as_deref().map(|t| self.vars.interpolate(t)).transpose()?;
                let contain = contain.as_deref().map(|t| self.vars.interpolate(t)).transpose()?;
                let expectation = ElementExpectation {
                    target,
                    visible: *visible,
                    exist: *exist,
                    disabled: *disabled,
                    text,
                    contain,
                };
                self.eventually(Probe::Elements(target), |obs| match obs {
                    Observation::Elements(found) => expectation.check(found),
                    _ => Ok(()),
                })
                .await
            }
            TestStep::Location { equals } => {
                let expected = self.vars.interpolate(equals)?;
                self.expect_pathname(&expected).await
            }
            TestStep::Cookie { name, has_expiry } => {
                let name = name.as_str();
                let has_expiry = *has_expiry;
                self.eventually(Probe::Cookie(name), |obs| match obs {
                    Observation::Cookie(cookie) => check_cookie(name, cookie.as_ref(), has_expiry),
                    _ => Ok(()),
                })
                .await
            }
            TestStep::Log { message } => {
                info!("[{}] {}", self.scenario, self.vars.interpolate(message)?);
                Ok(())
            }
        }
    }

    async fn visit(&mut self, path: &str) -> E2eResult<()> {
        let url = self.settings().base_url.join(path)?;
        self.browser.visit(&url).await
    }

    async fn click(&mut self, target: &Locator) -> E2eResult<()> {
        let element = self.actionable(target, Actionable::INTERACT).await?;
        self.browser.click(&element).await
    }

    /// Sign in through the form and wait for the backend to answer
    async fn login(&mut self, username: &str, password: &str, remember: bool) -> E2eResult<()> {
        self.runner
            .ledger
            .register(InterceptRule::new("POST", "/login").alias(LOGIN_ALIAS));

        let current = self.browser.current_url().await?;
        if current.path() != "/signin" {
            self.visit("/signin").await?;
        }

        let username_field = self
            .actionable(&Locator::test_id("signin-username"), Actionable::INTERACT)
            .await?;
        self.browser.type_text(&username_field, username).await?;

        let password_field = self
            .actionable(&Locator::test_id("signin-password"), Actionable::INTERACT)
            .await?;
        self.browser.type_text(&password_field, password).await?;

        if remember {
            let checkbox = Locator::test_id("signin-remember-me").find("input");
            let element = self.actionable(&checkbox, Actionable::TOGGLE).await?;
            self.browser.check(&element).await?;
        }

        self.click(&Locator::test_id("signin-submit")).await?;
        self.runner
            .ledger
            .wait(LOGIN_ALIAS, self.settings().request_timeout)
            .await?;
        Ok(())
    }

    async fn expect_pathname(&mut self, expected: &str) -> E2eResult<()> {
        self.eventually(Probe::Pathname, |obs| match obs {
            Observation::Pathname(actual) if actual != expected => Err((
                "pathname".to_string(),
                expected.to_string(),
                actual.clone(),
            )),
            _ => Ok(()),
        })
        .await
    }

    /// Poll until exactly one element matches and meets `need`
    async fn actionable(&mut self, target: &Locator, need: Actionable) -> E2eResult<ElementHandle> {
        let deadline = Instant::now() + self.settings().command_timeout;
        loop {
            let found = self.browser.query(target).await?;
            let reason = match found.as_slice() {
                [] => "no element matched".to_string(),
                [one] if need.visible && !one.visible => "element is not visible".to_string(),
                [one] if need.enabled && !one.enabled => "element is disabled".to_string(),
                [one] => return Ok(one.handle.clone()),
                many => format!("matched {} elements", many.len()),
            };

            if Instant::now() >= deadline {
                return Err(E2eError::NotActionable {
                    locator: target.to_string(),
                    reason,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Retry `check` against fresh observations until it holds or time runs out
    async fn eventually<F>(&mut self, probe: Probe<'_>, check: F) -> E2eResult<()>
    where
        F: Fn(&Observation) -> Result<(), Mismatch>,
    {
        let deadline = Instant::now() + self.settings().command_timeout;
        loop {
            let observation = self.observe(&probe).await?;
            match check(&observation) {
                Ok(()) => return Ok(()),
                Err((description, expected, actual)) => {
                    if Instant::now() >= deadline {
                        return Err(E2eError::assertion(description, expected, actual));
                    }
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn observe(&mut self, probe: &Probe<'_>) -> E2eResult<Observation> {
        Ok(match probe {
            Probe::Elements(locator) => Observation::Elements(self.browser.query(locator).await?),
            Probe::Pathname => Observation::Pathname(self.browser.current_url().await?.path().to_string()),
            Probe::Cookie(name) => Observation::Cookie(self.browser.cookie(name).await?),
        })
    }
}

/// Every given expectation on an element must hold
struct ElementExpectation<'a> {
    target: &'a Locator,
    visible: Option<bool>,
    exist: Option<bool>,
    disabled: Option<bool>,
    text: Option<String>,
    contain: Option<String>,
}

impl ElementExpectation<'_> {
    fn check(&self, found: &[ElementState]) -> Result<(), Mismatch> {
        let describe = |what: &str| format!("{} {}", self.target, what);
        let count = |n: usize| format!("{} element(s)", n);

        match self.exist {
            Some(true) if found.is_empty() => {
                return Err((describe("exists"), "at least one element".into(), count(0)))
            }
            Some(false) if !found.is_empty() => {
                return Err((describe("does not exist"), count(0), count(found.len())))
            }
            _ => {}
        }

        if let Some(visible) = self.visible {
            let all_visible = !found.is_empty() && found.iter().all(|e| e.visible);
            let none_visible = found.iter().all(|e| !e.visible);
            if visible && !all_visible {
                let actual = if found.is_empty() {
                    "no element".to_string()
                } else {
                    "hidden".to_string()
                };
                return Err((describe("is visible"), "visible".into(), actual));
            }
            if !visible && !none_visible {
                return Err((describe("is not visible"), "hidden".into(), "visible".into()));
            }
        }

        if let Some(disabled) = self.disabled {
            if found.is_empty() {
                let what = if disabled { "is disabled" } else { "is enabled" };
                return Err((describe(what), "an element".into(), "no element".into()));
            }
            if found.iter().any(|e| e.enabled == disabled) {
                let (what, expected, actual) = if disabled {
                    ("is disabled", "disabled", "enabled")
                } else {
                    ("is enabled", "enabled", "disabled")
                };
                return Err((describe(what), expected.into(), actual.into()));
            }
        }

        if let Some(expected) = &self.text {
            let actual = joined_text(found);
            if found.is_empty() || actual != expected.trim() {
                return Err((describe("has text"), quote(expected), quote(&actual)));
            }
        }

        if let Some(expected) = &self.contain {
            if !found.iter().any(|e| e.text.contains(expected.as_str())) {
                return Err((describe("contains"), quote(expected), quote(&joined_text(found))));
            }
        }

        Ok(())
    }
}

fn joined_text(found: &[ElementState]) -> String {
    found
        .iter()
        .map(|e| e.text.trim())
        .collect::<Vec<_>>()
        .join("")
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text)
}

fn check_cookie(
    name: &str,
    cookie: Option<&crate::browser::Cookie>,
    has_expiry: Option<bool>,
) -> Result<(), Mismatch> {
    let Some(cookie) = cookie else {
        return Err((format!("cookie {}", name), "present".into(), "absent".into()));
    };
    let expiry = cookie.expiry.filter(|e| *e > 0);
    match (has_expiry, expiry) {
        (Some(true), None) => Err((
            format!("cookie {} expiry", name),
            "an expiry".into(),
            "session cookie".into(),
        )),
        (Some(false), Some(at)) => Err((
            format!("cookie {} expiry", name),
            "no expiry".into(),
            format!("expires at {}", at),
        )),
        _ => Ok(()),
    }
}

/// Write suite results to `<dir>/test-results.json`
pub fn write_results(results: &SuiteResult, dir: &Path) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(RESULTS_FILE);
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// Read a results file written by [`write_results`]
pub fn read_results(dir: &Path) -> E2eResult<SuiteResult> {
    let content = std::fs::read_to_string(dir.join(RESULTS_FILE))?;
    Ok(serde_json::from_str(&content)?)
}
