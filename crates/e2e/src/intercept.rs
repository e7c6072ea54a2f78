//! Network intercept rules and the alias ledger
//!
//! Rules form an ordered table of `(method, url pattern, body predicate) → alias`.
//! Every observed request is recorded; the first rule that matches assigns its
//! alias. A scenario can then block until the next request under an alias
//! has completed. Each recorded request satisfies at most one wait.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

use crate::error::{E2eError, E2eResult};

/// One row of the intercept table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptRule {
    /// HTTP method, case-insensitive
    pub method: String,

    /// Path (`/users`), absolute URL, or glob (`**/graphql`)
    pub url: String,

    /// Optional request body refinement
    #[serde(default)]
    pub body: Option<BodyPredicate>,

    /// Alias assigned to matching requests
    #[serde(default)]
    pub alias: Option<String>,
}

impl InterceptRule {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.into(),
            body: None,
            alias: None,
        }
    }

    pub fn when_body(mut self, field: impl Into<String>, equals: impl Into<serde_json::Value>) -> Self {
        self.body = Some(BodyPredicate {
            field: field.into(),
            equals: equals.into(),
        });
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn matches(&self, method: &str, url: &Url, body: Option<&serde_json::Value>) -> bool {
        if !self.method.eq_ignore_ascii_case(method) {
            return false;
        }
        if !url_matches(&self.url, url) {
            return false;
        }
        match &self.body {
            Some(predicate) => body.map(|b| predicate.matches(b)).unwrap_or(false),
            None => true,
        }
    }
}

/// Matches when the JSON body field at a dotted path equals a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPredicate {
    pub field: String,
    pub equals: serde_json::Value,
}

impl BodyPredicate {
    pub fn matches(&self, body: &serde_json::Value) -> bool {
        let mut current = body;
        for segment in self.field.split('.') {
            match current.get(segment) {
                Some(next) => current = next,
                None => return false,
            }
        }
        *current == self.equals
    }
}

/// Test a URL pattern against a request URL
///
/// Patterns starting with a scheme compare against the full URL without its
/// query; anything else compares against the path only. `*` matches within a
/// path segment, `**` across segments.
pub fn url_matches(pattern: &str, url: &Url) -> bool {
    let absolute = pattern.starts_with("http://") || pattern.starts_with("https://");
    let candidate = if absolute {
        let mut bare = url.clone();
        bare.set_query(None);
        bare.set_fragment(None);
        bare.to_string()
    } else {
        url.path().to_string()
    };

    if pattern.contains('*') {
        return glob_to_regex(pattern)
            .map(|re| re.is_match(&candidate))
            .unwrap_or(false);
    }

    trim_slash(pattern) == trim_slash(&candidate)
}

fn trim_slash(s: &str) -> &str {
    if s.len() > 1 {
        s.trim_end_matches('/')
    } else {
        s
    }
}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut expr = String::from("^");
    let mut rest = pattern;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("**") {
            expr.push_str(".*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('*') {
            expr.push_str("[^/]*");
            rest = tail;
        } else {
            let ch = rest.chars().next()?;
            expr.push_str(&regex::escape(&ch.to_string()));
            rest = &rest[ch.len_utf8()..];
        }
    }
    expr.push('$');
    Regex::new(&expr).ok()
}

/// A request seen by the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptedRequest {
    pub id: u64,
    pub method: String,
    pub url: String,
    pub alias: Option<String>,
    pub body: Option<serde_json::Value>,
    /// Response status once the round-trip finished
    pub status: Option<u16>,
}

impl InterceptedRequest {
    pub fn is_complete(&self) -> bool {
        self.status.is_some()
    }
}

/// Handle returned by [`InterceptLedger::observe`] to report completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

#[derive(Default)]
struct LedgerState {
    rules: Vec<InterceptRule>,
    requests: Vec<InterceptedRequest>,
    consumed: HashMap<String, usize>,
    next_id: u64,
}

/// Shared between the network observer (proxy or scripted app) and the runner
#[derive(Default)]
pub struct InterceptLedger {
    state: Mutex<LedgerState>,
    changed: Notify,
}

impl InterceptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all rules, records and wait positions
    pub fn reset(&self) {
        *self.state.lock() = LedgerState::default();
        self.changed.notify_waiters();
    }

    pub fn register(&self, rule: InterceptRule) {
        debug!(
            method = %rule.method,
            url = %rule.url,
            alias = rule.alias.as_deref().unwrap_or("-"),
            "Registering intercept"
        );
        self.state.lock().rules.push(rule);
    }

    pub fn rules(&self) -> Vec<InterceptRule> {
        self.state.lock().rules.clone()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.state
            .lock()
            .rules
            .iter()
            .any(|r| r.alias.as_deref() == Some(alias))
    }

    /// Record an outgoing request; the first matching rule assigns the alias
    pub fn observe(&self, method: &str, url: &Url, body: &[u8]) -> RequestTicket {
        let body = if body.is_empty() {
            None
        } else {
            serde_json::from_slice::<serde_json::Value>(body).ok()
        };

        let mut state = self.state.lock();
        let alias = state
            .rules
            .iter()
            .find(|rule| rule.matches(method, url, body.as_ref()))
            .and_then(|rule| rule.alias.clone());

        let id = state.next_id;
        state.next_id += 1;

        trace!(id, method, url = %url, alias = alias.as_deref().unwrap_or("-"), "Observed request");

        state.requests.push(InterceptedRequest {
            id,
            method: method.to_uppercase(),
            url: url.to_string(),
            alias,
            body,
            status: None,
        });
        drop(state);

        self.changed.notify_waiters();
        RequestTicket(id)
    }

    /// Mark a request as answered
    pub fn complete(&self, ticket: RequestTicket, status: u16) {
        let mut state = self.state.lock();
        if let Some(req) = state.requests.iter_mut().find(|r| r.id == ticket.0) {
            req.status = Some(status);
        }
        drop(state);
        self.changed.notify_waiters();
    }

    pub fn requests(&self) -> Vec<InterceptedRequest> {
        self.state.lock().requests.clone()
    }

    /// Wait for the next unconsumed request under `alias` to complete
    pub async fn wait(&self, alias: &str, timeout: Duration) -> E2eResult<InterceptedRequest> {
        if !self.has_alias(alias) {
            return Err(E2eError::UnknownAlias(alias.to_string()));
        }

        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before inspecting state so a completion in
            // between is not missed.
            let changed = self.changed.notified();

            let pending = {
                let mut state = self.state.lock();
                let position = state.consumed.get(alias).copied().unwrap_or(0);
                let next = state
                    .requests
                    .iter()
                    .filter(|r| r.alias.as_deref() == Some(alias))
                    .nth(position)
                    .cloned();
                match next {
                    Some(req) if req.is_complete() => {
                        state.consumed.insert(alias.to_string(), position + 1);
                        return Ok(req);
                    }
                    Some(_) => true,
                    None => false,
                }
            };

            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                let detail = if pending {
                    "request was sent but no response arrived"
                } else {
                    "no matching request was made"
                };
                return Err(E2eError::Timeout(format!(
                    "@{} after {} ms: {}",
                    alias,
                    timeout.as_millis(),
                    detail
                )));
            }
        }
    }
}
