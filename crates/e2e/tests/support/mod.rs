//! Scripted Real World App used to run suites without a browser
//!
//! Models the sign-in, sign-up and home pages closely enough for the auth
//! suite: form validation on blur, the session cookie, the onboarding dialog
//! and the collapsible side navigation. Network calls are reported to the
//! shared [`InterceptLedger`] the way the proxy would.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use url::Url;

use rwa_e2e::browser::{Browser, BrowserLauncher, Cookie, ElementHandle, ElementState};
use rwa_e2e::device::{NavigationLayout, Viewport, DEFAULT_MOBILE_BREAKPOINT};
use rwa_e2e::error::{E2eError, E2eResult};
use rwa_e2e::intercept::InterceptLedger;
use rwa_e2e::locator::{Locator, Selector};
use rwa_e2e::runner::{RunSettings, ScenarioRunner};
use rwa_e2e::seed::{FixtureUser, Seeder};

pub const BASE_URL: &str = "http://localhost:3000";
pub const API_URL: &str = "http://localhost:3001";
pub const SEEDED_USER: &str = "Katharina_Bernier";
pub const SEEDED_PASSWORD: &str = "s3cret";

/// Defects the app can be told to exhibit
#[derive(Debug, Clone, Copy, Default)]
pub struct Bugs {
    /// Unknown usernames get a message that reveals which field was wrong
    pub leak_unknown_user: bool,
    /// The session cookie never carries an expiry
    pub ignore_remember_me: bool,
    /// The create-bank-account mutation never answers
    pub drop_bank_account_response: bool,
}

#[derive(Debug, Clone)]
struct Account {
    username: String,
    password: String,
    has_bank_account: bool,
}

struct Backend {
    accounts: Vec<Account>,
    bugs: Bugs,
    seed_fails: bool,
    seeds: usize,
}

/// Server side of the app, shared by every browser session
#[derive(Clone)]
pub struct FakeApp {
    backend: Arc<Mutex<Backend>>,
    ledger: Arc<InterceptLedger>,
    open_sessions: Arc<AtomicUsize>,
    launched: Arc<AtomicUsize>,
}

impl FakeApp {
    pub fn new(ledger: Arc<InterceptLedger>) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Backend {
                accounts: Vec::new(),
                bugs: Bugs::default(),
                seed_fails: false,
                seeds: 0,
            })),
            ledger,
            open_sessions: Arc::new(AtomicUsize::new(0)),
            launched: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_bugs(self, bugs: Bugs) -> Self {
        self.backend.lock().bugs = bugs;
        self
    }

    pub fn failing_seed(self) -> Self {
        self.backend.lock().seed_fails = true;
        self
    }

    pub fn seeds(&self) -> usize {
        self.backend.lock().seeds
    }

    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn has_account(&self, username: &str) -> bool {
        self.backend.lock().accounts.iter().any(|a| a.username == username)
    }

    /// Send a request through the ledger and answer it
    fn request(&self, method: &str, url: &str, body: Value, respond: bool, status: u16) {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(_) => return,
        };
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        let ticket = self.ledger.observe(method, &url, &bytes);
        if respond {
            self.ledger.complete(ticket, status);
        }
    }

    fn api(path: &str) -> String {
        format!("{}{}", API_URL, path)
    }
}

#[async_trait]
impl Seeder for FakeApp {
    async fn seed(&self) -> E2eResult<()> {
        let mut backend = self.backend.lock();
        if backend.seed_fails {
            return Err(E2eError::Seed("POST http://localhost:3001/testData/seed returned 500".into()));
        }
        backend.seeds += 1;
        backend.accounts = vec![Account {
            username: SEEDED_USER.to_string(),
            password: SEEDED_PASSWORD.to_string(),
            has_bank_account: true,
        }];
        Ok(())
    }

    async fn find_user(&self) -> E2eResult<FixtureUser> {
        let backend = self.backend.lock();
        let account = backend
            .accounts
            .first()
            .ok_or_else(|| E2eError::Seed("no users in seeded data".into()))?;
        Ok(FixtureUser {
            id: Some("t45AiwidW".to_string()),
            username: account.username.clone(),
            password: SEEDED_PASSWORD.to_string(),
            first_name: Some("Edgar".to_string()),
            last_name: Some("Johns".to_string()),
        })
    }
}

#[async_trait]
impl BrowserLauncher for FakeApp {
    async fn launch(&self, viewport: Viewport) -> E2eResult<Box<dyn Browser>> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBrowser {
            app: self.clone(),
            viewport,
            page: Page::Blank,
            session: None,
            closed: false,
        }))
    }
}

#[derive(Debug, Clone, Default)]
struct Field {
    value: String,
    touched: bool,
}

#[derive(Debug, Clone, Default)]
struct SignInForm {
    username: Field,
    password: Field,
    remember: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct SignUpForm {
    first_name: Field,
    last_name: Field,
    username: Field,
    password: Field,
    confirm: Field,
}

#[derive(Debug, Clone, Default)]
struct BankForm {
    bank_name: Field,
    routing: Field,
    account: Field,
}

#[derive(Debug, Clone)]
enum Onboarding {
    Welcome,
    CreateBankAccount(BankForm),
    Finished,
}

#[derive(Debug, Clone)]
enum Page {
    Blank,
    SignIn(SignInForm),
    SignUp(SignUpForm),
    Home {
        nav_open: bool,
        onboarding: Option<Onboarding>,
    },
}

#[derive(Debug, Clone)]
struct Session {
    username: String,
    expiry: Option<u64>,
}

/// One element of the rendered page
#[derive(Debug, Clone)]
struct Node {
    handle: &'static str,
    test: Option<&'static str>,
    id: Option<&'static str>,
    tag: &'static str,
    parent: Option<&'static str>,
    visible: bool,
    enabled: bool,
    text: String,
}

impl Node {
    fn new(handle: &'static str, tag: &'static str) -> Self {
        Self {
            handle,
            test: Some(handle),
            id: None,
            tag,
            parent: None,
            visible: true,
            enabled: true,
            text: String::new(),
        }
    }

    fn input_of(parent: &'static str, handle: &'static str) -> Self {
        Self {
            test: None,
            parent: Some(parent),
            ..Self::new(handle, "input")
        }
    }

    fn helper(id: &'static str, text: &str) -> Self {
        Self {
            test: None,
            id: Some(id),
            text: text.to_string(),
            ..Self::new(id, "p")
        }
    }

    fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

fn signin_errors(form: &SignInForm) -> (Option<&'static str>, Option<&'static str>) {
    let username = form
        .username
        .value
        .is_empty()
        .then_some("Username is required");
    let password = if form.password.value.is_empty() {
        Some("Enter your password")
    } else if form.password.value.len() < 4 {
        Some("Password must contain at least 4 characters")
    } else {
        None
    };
    (username, password)
}

fn signup_errors(form: &SignUpForm) -> [Option<&'static str>; 5] {
    let password = if form.password.value.is_empty() {
        Some("Enter your password")
    } else if form.password.value.len() < 4 {
        Some("Password must contain at least 4 characters")
    } else {
        None
    };
    let confirm = if form.confirm.value.is_empty() {
        Some("Confirm your password")
    } else if form.confirm.value != form.password.value {
        Some("Password does not match")
    } else {
        None
    };
    [
        form.first_name.value.is_empty().then_some("First Name is required"),
        form.last_name.value.is_empty().then_some("Last Name is required"),
        form.username.value.is_empty().then_some("Username is required"),
        password,
        confirm,
    ]
}

fn text_field(nodes: &mut Vec<Node>, wrapper: &'static str, input: &'static str, field: &Field) {
    nodes.push(Node::new(wrapper, "div"));
    nodes.push(Node::input_of(wrapper, input).text(&field.value));
}

fn helper_text(nodes: &mut Vec<Node>, id: &'static str, field: &Field, error: Option<&str>) {
    if let (true, Some(message)) = (field.touched, error) {
        nodes.push(Node::helper(id, message));
    }
}

pub struct FakeBrowser {
    app: FakeApp,
    viewport: Viewport,
    page: Page,
    session: Option<Session>,
    closed: bool,
}

impl FakeBrowser {
    fn layout(&self) -> NavigationLayout {
        NavigationLayout::for_viewport(self.viewport, DEFAULT_MOBILE_BREAKPOINT)
    }

    fn path(&self) -> &'static str {
        match self.page {
            Page::Blank => "/",
            Page::SignIn(_) => "/signin",
            Page::SignUp(_) => "/signup",
            Page::Home { .. } => "/",
        }
    }

    fn route(&mut self, path: &str) {
        self.page = match (path, &self.session) {
            ("/signup", _) => Page::SignUp(SignUpForm::default()),
            ("/signin", _) | (_, None) => Page::SignIn(SignInForm::default()),
            (_, Some(session)) => self.home_for(&session.username.clone()),
        };
    }

    fn home_for(&self, username: &str) -> Page {
        let onboarded = self
            .app
            .backend
            .lock()
            .accounts
            .iter()
            .any(|a| a.username == username && a.has_bank_account);
        // The list query the home page fires on load; never aliased
        self.app.request(
            "POST",
            &FakeApp::api("/graphql"),
            json!({ "operationName": "ListBankAccount", "variables": {} }),
            true,
            200,
        );
        Page::Home {
            nav_open: !self.layout().requires_toggle(),
            onboarding: (!onboarded).then_some(Onboarding::Welcome),
        }
    }

    fn render(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        match &self.page {
            Page::Blank => {}
            Page::SignIn(form) => {
                let (username_error, password_error) = signin_errors(form);
                nodes.push(Node::new("signin-title", "h1").text("Sign in"));
                text_field(&mut nodes, "signin-username", "signin-username>input", &form.username);
                helper_text(&mut nodes, "username-helper-text", &form.username, username_error);
                text_field(&mut nodes, "signin-password", "signin-password>input", &form.password);
                helper_text(&mut nodes, "password-helper-text", &form.password, password_error);
                nodes.push(Node::new("signin-remember-me", "label").text("Remember me"));
                // MUI hides the native checkbox behind a styled box
                nodes.push(Node::input_of("signin-remember-me", "signin-remember-me>input").visible(false));
                nodes.push(
                    Node::new("signin-submit", "button")
                        .text("Sign In")
                        .enabled(username_error.is_none() && password_error.is_none()),
                );
                if let Some(error) = &form.error {
                    nodes.push(Node::new("signin-error", "div").text(error));
                }
                nodes.push(Node::new("signup", "a").text("Don't have an account? Sign Up"));
            }
            Page::SignUp(form) => {
                let errors = signup_errors(form);
                nodes.push(Node::new("signup-title", "h1").text("Sign Up"));
                let fields: [(&'static str, &'static str, &'static str, &Field); 5] = [
                    ("signup-first-name", "signup-first-name>input", "firstName-helper-text", &form.first_name),
                    ("signup-last-name", "signup-last-name>input", "lastName-helper-text", &form.last_name),
                    ("signup-username", "signup-username>input", "username-helper-text", &form.username),
                    ("signup-password", "signup-password>input", "password-helper-text", &form.password),
                    (
                        "signup-confirmPassword",
                        "signup-confirmPassword>input",
                        "confirmPassword-helper-text",
                        &form.confirm,
                    ),
                ];
                for ((wrapper, input, helper, field), error) in fields.into_iter().zip(errors) {
                    text_field(&mut nodes, wrapper, input, field);
                    helper_text(&mut nodes, helper, field, error);
                }
                nodes.push(
                    Node::new("signup-submit", "button")
                        .text("Sign Up")
                        .enabled(errors.iter().all(Option::is_none)),
                );
            }
            Page::Home { nav_open, onboarding } => {
                nodes.push(Node::new("sidenav-toggle", "button"));
                nodes.push(Node::new("nav-top-notifications-count", "span").text("3"));
                nodes.push(Node::new("sidenav-signout", "div").text("Logout").visible(*nav_open));
                if let Some(step) = onboarding {
                    nodes.push(Node::new("user-onboarding-dialog", "div"));
                    match step {
                        Onboarding::Welcome => {
                            nodes.push(
                                Node::new("user-onboarding-dialog-title", "h2")
                                    .text("Get Started with Real World App"),
                            );
                            nodes.push(
                                Node::new("user-onboarding-dialog-content", "div")
                                    .text("Real World App requires a Bank Account to perform transactions."),
                            );
                            nodes.push(Node::new("user-onboarding-next", "button").text("Next"));
                        }
                        Onboarding::CreateBankAccount(form) => {
                            nodes.push(Node::new("user-onboarding-dialog-title", "h2").text("Create Bank Account"));
                            nodes.push(Node::new("user-onboarding-dialog-content", "div"));
                            text_field(&mut nodes, "bankaccount-bankName-input", "bankName>input", &form.bank_name);
                            text_field(
                                &mut nodes,
                                "bankaccount-routingNumber-input",
                                "routingNumber>input",
                                &form.routing,
                            );
                            text_field(
                                &mut nodes,
                                "bankaccount-accountNumber-input",
                                "accountNumber>input",
                                &form.account,
                            );
                            nodes.push(Node::new("bankaccount-submit", "button").text("Save"));
                        }
                        Onboarding::Finished => {
                            nodes.push(Node::new("user-onboarding-dialog-title", "h2").text("Finished"));
                            nodes.push(
                                Node::new("user-onboarding-dialog-content", "div")
                                    .text("You're all set! We're excited to have you aboard the Real World App!"),
                            );
                            nodes.push(Node::new("user-onboarding-next", "button").text("Done"));
                        }
                    }
                }
            }
        }
        nodes
    }

    fn matches(node: &Node, selector: &Selector) -> bool {
        match selector {
            Selector::TestId(id) => node.test == Some(id.as_str()),
            Selector::TestIdLike(id) => node.test.map(|t| t.contains(id.as_str())).unwrap_or(false),
            Selector::Css(css) => match css.strip_prefix('#') {
                Some(id) => node.id == Some(id),
                None => node.tag == css.as_str(),
            },
        }
    }

    fn node(&self, handle: &ElementHandle) -> E2eResult<Node> {
        self.render()
            .into_iter()
            .find(|n| n.handle == handle.0)
            .ok_or_else(|| E2eError::WebDriver {
                error: "stale element reference".into(),
                message: handle.0.clone(),
            })
    }

    /// The input behind a wrapper, or the element itself
    fn editable(&self, handle: &ElementHandle) -> E2eResult<&'static str> {
        let node = self.node(handle)?;
        if node.tag == "input" {
            return Ok(node.handle);
        }
        self.render()
            .into_iter()
            .find(|n| n.parent == Some(node.handle) && n.tag == "input")
            .map(|n| n.handle)
            .ok_or_else(|| E2eError::WebDriver {
                error: "invalid element state".into(),
                message: format!("{} is not editable", handle.0),
            })
    }

    fn field_mut(&mut self, input: &str) -> Option<&mut Field> {
        match &mut self.page {
            Page::SignIn(form) => match input {
                "signin-username>input" => Some(&mut form.username),
                "signin-password>input" => Some(&mut form.password),
                _ => None,
            },
            Page::SignUp(form) => match input {
                "signup-first-name>input" => Some(&mut form.first_name),
                "signup-last-name>input" => Some(&mut form.last_name),
                "signup-username>input" => Some(&mut form.username),
                "signup-password>input" => Some(&mut form.password),
                "signup-confirmPassword>input" => Some(&mut form.confirm),
                _ => None,
            },
            Page::Home {
                onboarding: Some(Onboarding::CreateBankAccount(form)),
                ..
            } => match input {
                "bankName>input" => Some(&mut form.bank_name),
                "routingNumber>input" => Some(&mut form.routing),
                "accountNumber>input" => Some(&mut form.account),
                _ => None,
            },
            _ => None,
        }
    }

    fn ensure_open(&self) -> E2eResult<()> {
        if self.closed {
            return Err(E2eError::WebDriver {
                error: "invalid session id".into(),
                message: "session closed".into(),
            });
        }
        Ok(())
    }

    fn sign_in(&mut self) {
        let Page::SignIn(form) = &self.page else {
            return;
        };
        let username = form.username.value.clone();
        let password = form.password.value.clone();
        let remember = form.remember;

        let (known, valid) = {
            let backend = self.app.backend.lock();
            let account = backend.accounts.iter().find(|a| a.username == username);
            (account.is_some(), account.map(|a| a.password == password).unwrap_or(false))
        };
        let bugs = self.app.backend.lock().bugs;

        let status = if valid { 200 } else { 401 };
        self.app.request(
            "POST",
            &FakeApp::api("/login"),
            json!({ "type": "LOGIN", "username": username, "password": password, "remember": remember }),
            true,
            status,
        );

        if valid {
            let expiry = (remember && !bugs.ignore_remember_me).then_some(4_102_444_800);
            self.session = Some(Session {
                username: username.clone(),
                expiry,
            });
            self.page = self.home_for(&username);
        } else if let Page::SignIn(form) = &mut self.page {
            let message = if !known && bugs.leak_unknown_user {
                "User not found"
            } else {
                "Username or password is invalid"
            };
            form.error = Some(message.to_string());
        }
    }

    fn sign_up(&mut self) {
        let Page::SignUp(form) = &self.page else {
            return;
        };
        let username = form.username.value.clone();
        let password = form.password.value.clone();
        self.app.request(
            "POST",
            &FakeApp::api("/users"),
            json!({
                "firstName": form.first_name.value,
                "lastName": form.last_name.value,
                "username": username,
                "password": password,
                "confirmPassword": form.confirm.value,
            }),
            true,
            201,
        );
        self.app.backend.lock().accounts.push(Account {
            username,
            password,
            has_bank_account: false,
        });
        self.page = Page::SignIn(SignInForm::default());
    }

    fn create_bank_account(&mut self) {
        let Page::Home {
            onboarding: Some(Onboarding::CreateBankAccount(form)),
            ..
        } = &self.page
        else {
            return;
        };
        let respond = !self.app.backend.lock().bugs.drop_bank_account_response;
        self.app.request(
            "POST",
            &FakeApp::api("/graphql"),
            json!({
                "operationName": "CreateBankAccount",
                "variables": {
                    "bankName": form.bank_name.value,
                    "routingNumber": form.routing.value,
                    "accountNumber": form.account.value,
                },
            }),
            respond,
            200,
        );
        if let (Some(session), true) = (&self.session, respond) {
            let username = session.username.clone();
            if let Some(account) = self
                .app
                .backend
                .lock()
                .accounts
                .iter_mut()
                .find(|a| a.username == username)
            {
                account.has_bank_account = true;
            }
        }
        if let Page::Home { onboarding, .. } = &mut self.page {
            *onboarding = Some(Onboarding::Finished);
        }
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn visit(&mut self, url: &Url) -> E2eResult<()> {
        self.ensure_open()?;
        self.route(url.path());
        Ok(())
    }

    async fn current_url(&mut self) -> E2eResult<Url> {
        self.ensure_open()?;
        Ok(Url::parse(BASE_URL)?.join(self.path())?)
    }

    async fn query(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>> {
        self.ensure_open()?;
        let nodes = self.render();
        let roots: Vec<&Node> = nodes.iter().filter(|n| Self::matches(n, &locator.selector)).collect();
        let found: Vec<&Node> = match &locator.within {
            None => roots,
            Some(css) => {
                let inner = Selector::Css(css.clone());
                roots
                    .iter()
                    .flat_map(|root| {
                        nodes
                            .iter()
                            .filter(|n| n.parent == Some(root.handle) && Self::matches(n, &inner))
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }
        };
        Ok(found
            .into_iter()
            .map(|n| ElementState {
                handle: ElementHandle(n.handle.to_string()),
                visible: n.visible,
                enabled: n.enabled,
                text: n.text.clone(),
            })
            .collect())
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> E2eResult<()> {
        self.ensure_open()?;
        let input = self.editable(element)?;
        if let Some(field) = self.field_mut(input) {
            field.value.push_str(text);
        }
        Ok(())
    }

    async fn clear(&mut self, element: &ElementHandle) -> E2eResult<()> {
        self.ensure_open()?;
        let input = self.editable(element)?;
        if let Some(field) = self.field_mut(input) {
            field.value.clear();
        }
        Ok(())
    }

    async fn blur(&mut self, element: &ElementHandle) -> E2eResult<()> {
        self.ensure_open()?;
        let input = self.editable(element)?;
        if let Some(field) = self.field_mut(input) {
            field.touched = true;
        }
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> E2eResult<()> {
        self.ensure_open()?;
        let node = self.node(element)?;
        match node.handle {
            "signin-submit" => self.sign_in(),
            "signup-submit" => self.sign_up(),
            "signup" => self.route("/signup"),
            "sidenav-toggle" => {
                if let Page::Home { nav_open, .. } = &mut self.page {
                    *nav_open = !*nav_open;
                }
            }
            "sidenav-signout" => {
                self.app.request("POST", &FakeApp::api("/logout"), json!({}), true, 302);
                self.session = None;
                self.route("/signin");
            }
            "user-onboarding-next" => {
                if let Page::Home { onboarding, .. } = &mut self.page {
                    *onboarding = match onboarding.take() {
                        Some(Onboarding::Welcome) => Some(Onboarding::CreateBankAccount(BankForm::default())),
                        Some(Onboarding::Finished) | None => None,
                        other => other,
                    };
                }
            }
            "bankaccount-submit" => self.create_bank_account(),
            _ => {}
        }
        Ok(())
    }

    async fn check(&mut self, element: &ElementHandle) -> E2eResult<()> {
        self.ensure_open()?;
        let node = self.node(element)?;
        if let (Page::SignIn(form), "signin-remember-me>input") = (&mut self.page, node.handle) {
            form.remember = true;
        }
        Ok(())
    }

    async fn cookie(&mut self, name: &str) -> E2eResult<Option<Cookie>> {
        self.ensure_open()?;
        if name != "connect.sid" {
            return Ok(None);
        }
        Ok(self.session.as_ref().map(|s| Cookie {
            name: name.to_string(),
            value: format!("s%3A{}", s.username),
            expiry: s.expiry,
        }))
    }

    async fn screenshot(&mut self) -> E2eResult<Vec<u8>> {
        self.ensure_open()?;
        Ok(format!("{:?}", self.render()).into_bytes())
    }

    async fn close(&mut self) -> E2eResult<()> {
        if !self.closed {
            self.closed = true;
            self.app.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Settings with short waits so failing scenarios finish quickly
pub fn settings(snapshot_dir: &Path) -> RunSettings {
    RunSettings {
        base_url: Url::parse(BASE_URL).unwrap(),
        api_url: API_URL.to_string(),
        viewport: Viewport::DESKTOP,
        mobile_breakpoint: DEFAULT_MOBILE_BREAKPOINT,
        nav_toggle: "sidenav-toggle".to_string(),
        command_timeout: Duration::from_millis(300),
        request_timeout: Duration::from_millis(300),
        scenario_timeout: Duration::from_secs(20),
        snapshot_dir: snapshot_dir.to_path_buf(),
    }
}

/// A runner wired to a fresh app
pub fn runner(snapshot_dir: &Path, configure: impl FnOnce(FakeApp) -> FakeApp) -> (ScenarioRunner, FakeApp) {
    init_tracing();
    let ledger = Arc::new(InterceptLedger::new());
    let app = configure(FakeApp::new(ledger.clone()));
    let runner = ScenarioRunner::new(
        settings(snapshot_dir),
        Arc::new(app.clone()),
        Arc::new(app.clone()),
        ledger,
    );
    (runner, app)
}

/// Route runner logs to the test output; repeated calls are ignored
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
