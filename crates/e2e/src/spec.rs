//! Declarative YAML suite specification

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::device::Viewport;
use crate::error::{E2eError, E2eResult};
use crate::intercept::{BodyPredicate, InterceptRule};
use crate::locator::Locator;

/// A suite of independent scenarios sharing one setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Runs before every scenario
    #[serde(default)]
    pub setup: SetupSpec,

    pub scenarios: Vec<ScenarioSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupSpec {
    /// Reset application data before each scenario
    #[serde(default = "default_true")]
    pub seed: bool,

    /// Intercept rules, first match wins
    #[serde(default)]
    pub intercepts: Vec<InterceptRule>,
}

impl Default for SetupSpec {
    fn default() -> Self {
        Self {
            seed: true,
            intercepts: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One independent, fully seeded test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Human-readable title
    pub name: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Overrides the configured viewport
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a path relative to the app base URL
    Visit { path: String },

    /// Type text into an element (or the input inside it)
    Type { target: Locator, text: String },

    /// Clear an input
    Clear { target: Locator },

    /// Move focus away from an element
    Blur { target: Locator },

    /// Click an element
    Click { target: Locator },

    /// Check a checkbox
    Check { target: Locator },

    /// Click an item of the side navigation, opening it first when collapsed
    NavClick { target: Locator },

    /// Sign in through the form
    Login {
        username: String,
        password: String,
        #[serde(default)]
        remember: bool,
    },

    /// Bind a seeded user to variables under `bind`
    FindUser {
        #[serde(default = "default_user_binding")]
        bind: String,
    },

    /// Register an additional intercept rule
    Intercept {
        method: String,
        url: String,
        #[serde(default)]
        body: Option<BodyPredicate>,
        #[serde(default)]
        alias: Option<String>,
    },

    /// Block until an aliased request completes
    Wait {
        alias: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Capture a named visual snapshot
    Snapshot { name: String },

    /// Assert on an element; every given expectation must hold
    Assert {
        target: Locator,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        exist: Option<bool>,
        #[serde(default)]
        disabled: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        contain: Option<String>,
    },

    /// Assert on the current pathname
    Location { equals: String },

    /// Assert on a cookie
    Cookie {
        name: String,
        #[serde(default)]
        has_expiry: Option<bool>,
    },

    /// Log a message (for debugging)
    Log { message: String },
}

fn default_user_binding() -> String {
    "user".to_string()
}

impl TestStep {
    /// Short label used in results and logs
    pub fn label(&self) -> String {
        match self {
            TestStep::Visit { path } => format!("visit:{}", path),
            TestStep::Type { target, .. } => format!("type:{}", target),
            TestStep::Clear { target } => format!("clear:{}", target),
            TestStep::Blur { target } => format!("blur:{}", target),
            TestStep::Click { target } => format!("click:{}", target),
            TestStep::Check { target } => format!("check:{}", target),
            TestStep::NavClick { target } => format!("nav_click:{}", target),
            TestStep::Login { username, .. } => format!("login:{}", username),
            TestStep::FindUser { bind } => format!("find_user:{}", bind),
            TestStep::Intercept { method, url, .. } => format!("intercept:{} {}", method, url),
            TestStep::Wait { alias, .. } => format!("wait:@{}", alias),
            TestStep::Snapshot { name } => format!("snapshot:{}", name),
            TestStep::Assert { target, .. } => format!("assert:{}", target),
            TestStep::Location { equals } => format!("location:{}", equals),
            TestStep::Cookie { name, .. } => format!("cookie:{}", name),
            TestStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

impl SuiteSpec {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suites from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut suites = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            suites.push(Self::from_file(entry.path())?);
        }

        Ok(suites)
    }

    fn validate(&self) -> E2eResult<()> {
        let mut seen = std::collections::HashSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate scenario name '{}' in suite '{}'",
                    scenario.name, self.name
                )));
            }
            if scenario.steps.is_empty() {
                return Err(E2eError::SpecParse(format!(
                    "scenario '{}' has no steps",
                    scenario.name
                )));
            }
        }
        Ok(())
    }

    /// Keep only scenarios with the given tag
    pub fn filter_by_tag(&self, tag: &str) -> Self {
        self.retain(|s| s.tags.iter().any(|t| t == tag))
    }

    /// Keep only scenarios whose name contains `needle`
    pub fn filter_by_name(&self, needle: &str) -> Self {
        self.retain(|s| s.name.contains(needle))
    }

    fn retain(&self, keep: impl Fn(&ScenarioSpec) -> bool) -> Self {
        Self {
            scenarios: self.scenarios.iter().filter(|s| keep(s)).cloned().collect(),
            ..self.clone()
        }
    }
}
