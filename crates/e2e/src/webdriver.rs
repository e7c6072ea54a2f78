//! W3C WebDriver client
//!
//! Speaks the JSON wire format over HTTP to chromedriver, geckodriver or a
//! remote grid. Only the commands the runner needs are implemented.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::browser::{Browser, BrowserLauncher, Cookie, ElementHandle, ElementState};
use crate::device::Viewport;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// Key identifying element references in WebDriver payloads
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const BACKSPACE: char = '\u{E003}';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Firefox => "firefox",
        }
    }

    /// Driver binary conventionally serving this browser
    pub fn driver_binary(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chromedriver",
            BrowserKind::Firefox => "geckodriver",
        }
    }
}

/// Options applied to every new session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub browser: BrowserKind,
    pub headless: bool,
    /// Route browser traffic through the intercept proxy
    pub proxy: Option<SocketAddr>,
    pub page_load_timeout: Duration,
}

impl SessionOptions {
    pub fn capabilities(&self, viewport: Viewport) -> Value {
        let mut always = json!({
            "browserName": self.browser.as_str(),
            "acceptInsecureCerts": true,
            "timeouts": { "pageLoad": self.page_load_timeout.as_millis() as u64 },
        });

        match self.browser {
            BrowserKind::Chrome => {
                let mut args = vec![
                    format!("--window-size={},{}", viewport.width, viewport.height),
                    "--disable-gpu".to_string(),
                    "--no-first-run".to_string(),
                ];
                if self.headless {
                    args.push("--headless=new".to_string());
                }
                if let Some(proxy) = self.proxy {
                    args.push(format!("--proxy-server=http://{}", proxy));
                    // Chrome bypasses proxies for loopback hosts unless told otherwise
                    args.push("--proxy-bypass-list=<-loopback>".to_string());
                }
                always["goog:chromeOptions"] = json!({ "args": args });
            }
            BrowserKind::Firefox => {
                let mut args = vec![
                    format!("--width={}", viewport.width),
                    format!("--height={}", viewport.height),
                ];
                if self.headless {
                    args.push("-headless".to_string());
                }
                always["moz:firefoxOptions"] = json!({
                    "args": args,
                    "prefs": { "network.proxy.allow_hijacking_localhost": true },
                });
                if let Some(proxy) = self.proxy {
                    always["proxy"] = json!({
                        "proxyType": "manual",
                        "httpProxy": proxy.to_string(),
                    });
                }
            }
        }

        json!({ "capabilities": { "alwaysMatch": always } })
    }
}

/// Connection to a WebDriver server
#[derive(Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
    base: Url,
}

impl WebDriverClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> E2eResult<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let url = self.base.join(path)?;
        let mut request = self.http.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(&body);
        } else if method == Method::POST {
            request = request.json(&json!({}));
        }

        let resp = request.send().await?;
        let ok = resp.status().is_success();
        let payload: Value = resp.json().await?;
        unwrap_response(ok, payload)
    }

    /// Whether the server reports it can create sessions
    pub async fn ready(&self) -> E2eResult<bool> {
        let value = self.command(Method::GET, "status", None).await?;
        Ok(value.get("ready").and_then(Value::as_bool).unwrap_or(false))
    }

    pub async fn new_session(&self, options: &SessionOptions, viewport: Viewport) -> E2eResult<WebDriverSession> {
        let value = self
            .command(Method::POST, "session", Some(options.capabilities(viewport)))
            .await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| E2eError::WebDriver {
                error: "session not created".to_string(),
                message: format!("no sessionId in response: {}", value),
            })?
            .to_string();

        debug!("Created WebDriver session {} ({})", id, viewport);

        let session = WebDriverSession {
            client: self.clone(),
            id,
            closed: false,
        };
        session.set_window_size(viewport).await?;
        Ok(session)
    }
}

/// Split a W3C response envelope into a value or an error
fn unwrap_response(ok: bool, payload: Value) -> E2eResult<Value> {
    let value = payload.get("value").cloned().unwrap_or(Value::Null);
    let error = value.get("error").and_then(Value::as_str).map(String::from);

    match (ok, error) {
        (true, None) => Ok(value),
        (_, Some(error)) => Err(E2eError::WebDriver {
            error,
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        (false, None) => Err(E2eError::WebDriver {
            error: "unknown error".to_string(),
            message: payload.to_string(),
        }),
    }
}

fn element_ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn is_gone(err: &E2eError) -> bool {
    matches!(err, E2eError::WebDriver { error, .. }
        if error == "stale element reference" || error == "no such element")
}

/// One browser session
pub struct WebDriverSession {
    client: WebDriverClient,
    id: String,
    closed: bool,
}

impl WebDriverSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn session_cmd(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let full = if path.is_empty() {
            format!("session/{}", self.id)
        } else {
            format!("session/{}/{}", self.id, path)
        };
        self.client.command(method, &full, body).await
    }

    async fn set_window_size(&self, viewport: Viewport) -> E2eResult<()> {
        self.session_cmd(
            Method::POST,
            "window/rect",
            Some(json!({ "width": viewport.width, "height": viewport.height })),
        )
        .await?;
        Ok(())
    }

    async fn find_all(&self, css: &str) -> E2eResult<Vec<String>> {
        let value = self
            .session_cmd(
                Method::POST,
                "elements",
                Some(json!({ "using": "css selector", "value": css })),
            )
            .await?;
        Ok(element_ids(&value))
    }

    async fn find_within(&self, element: &str, css: &str) -> E2eResult<Vec<String>> {
        let value = self
            .session_cmd(
                Method::POST,
                &format!("element/{}/elements", element),
                Some(json!({ "using": "css selector", "value": css })),
            )
            .await?;
        Ok(element_ids(&value))
    }

    async fn element_get(&self, element: &str, what: &str) -> E2eResult<Value> {
        self.session_cmd(Method::GET, &format!("element/{}/{}", element, what), None)
            .await
    }

    async fn state(&self, element: &str) -> E2eResult<ElementState> {
        let visible = self.element_get(element, "displayed").await?.as_bool().unwrap_or(false);
        let enabled = self.element_get(element, "enabled").await?.as_bool().unwrap_or(false);
        let text = self
            .element_get(element, "text")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(ElementState {
            handle: ElementHandle(element.to_string()),
            visible,
            enabled,
            text,
        })
    }

    /// The element itself when it takes text, otherwise its first input
    async fn editable(&self, element: &ElementHandle) -> E2eResult<String> {
        let tag = self.element_get(&element.0, "name").await?;
        let tag = tag.as_str().unwrap_or_default().to_ascii_lowercase();
        if matches!(tag.as_str(), "input" | "textarea" | "select") {
            return Ok(element.0.clone());
        }

        self.find_within(&element.0, "input, textarea")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| E2eError::WebDriver {
                error: "element not interactable".to_string(),
                message: format!("<{}> has no input to type into", tag),
            })
    }

    async fn send_keys(&self, element: &str, text: &str) -> E2eResult<()> {
        self.session_cmd(
            Method::POST,
            &format!("element/{}/value", element),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn execute(&self, script: &str, element: &str) -> E2eResult<Value> {
        self.session_cmd(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": [{ ELEMENT_KEY: element }] })),
        )
        .await
    }
}

#[async_trait]
impl Browser for WebDriverSession {
    async fn visit(&mut self, url: &Url) -> E2eResult<()> {
        self.session_cmd(Method::POST, "url", Some(json!({ "url": url.as_str() })))
            .await?;
        Ok(())
    }

    async fn current_url(&mut self) -> E2eResult<Url> {
        let value = self.session_cmd(Method::GET, "url", None).await?;
        Ok(Url::parse(value.as_str().unwrap_or_default())?)
    }

    async fn query(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>> {
        let roots = self.find_all(&locator.root_css()).await?;

        let ids = match &locator.within {
            Some(inner) => {
                let mut ids = Vec::new();
                for root in &roots {
                    match self.find_within(root, inner).await {
                        Ok(found) => ids.extend(found),
                        Err(e) if is_gone(&e) => continue,
                        Err(e) => return Err(e),
                    }
                }
                ids
            }
            None => roots,
        };

        let mut states = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.state(id).await {
                Ok(state) => states.push(state),
                Err(e) if is_gone(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(states)
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> E2eResult<()> {
        let target = self.editable(element).await?;
        self.send_keys(&target, text).await
    }

    async fn clear(&mut self, element: &ElementHandle) -> E2eResult<()> {
        let target = self.editable(element).await?;
        // DOM selection avoids a platform select-all chord; the keystroke
        // (rather than the clear command) makes input handlers fire
        self.execute("arguments[0].select();", &target).await?;
        self.send_keys(&target, &BACKSPACE.to_string()).await
    }

    async fn blur(&mut self, element: &ElementHandle) -> E2eResult<()> {
        let target = self.editable(element).await.unwrap_or_else(|_| element.0.clone());
        self.execute("arguments[0].blur();", &target).await?;
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> E2eResult<()> {
        self.session_cmd(Method::POST, &format!("element/{}/click", element.0), None)
            .await?;
        Ok(())
    }

    async fn check(&mut self, element: &ElementHandle) -> E2eResult<()> {
        let target = self.editable(element).await?;
        let selected = self.element_get(&target, "selected").await?.as_bool().unwrap_or(false);
        if !selected {
            self.session_cmd(Method::POST, &format!("element/{}/click", target), None)
                .await?;
        }
        Ok(())
    }

    async fn cookie(&mut self, name: &str) -> E2eResult<Option<Cookie>> {
        match self.session_cmd(Method::GET, &format!("cookie/{}", name), None).await {
            Ok(value) => Ok(Some(serde_json::from_value(value)?)),
            Err(E2eError::WebDriver { error, .. }) if error == "no such cookie" => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn screenshot(&mut self) -> E2eResult<Vec<u8>> {
        let value = self.session_cmd(Method::GET, "screenshot", None).await?;
        let encoded = value.as_str().unwrap_or_default();
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| E2eError::WebDriver {
                error: "invalid screenshot".to_string(),
                message: e.to_string(),
            })
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.session_cmd(Method::DELETE, "", None).await {
            warn!("Failed to delete session {}: {}", self.id, e);
            return Err(e);
        }
        Ok(())
    }
}

/// Opens one WebDriver session per scenario
pub struct WebDriverLauncher {
    client: WebDriverClient,
    options: SessionOptions,
}

impl WebDriverLauncher {
    pub fn new(client: WebDriverClient, options: SessionOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self, viewport: Viewport) -> E2eResult<Box<dyn Browser>> {
        let session = self.client.new_session(&self.options, viewport).await?;
        Ok(Box::new(session))
    }
}
