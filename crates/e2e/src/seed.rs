//! Fixture seeding before each scenario
//!
//! Two backends: the application's test-data HTTP API (`POST /testData/seed`,
//! `GET /testData/users`) and an arbitrary shell command pair.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::error::{E2eError, E2eResult};

/// Password every seeded user is created with
pub const DEFAULT_FIXTURE_PASSWORD: &str = "s3cret";

/// A pre-existing user from the seeded fixture set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureUser {
    #[serde(default)]
    pub id: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// User record as returned by the application's test-data endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteUser {
    #[serde(default)]
    id: Option<String>,
    username: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl RemoteUser {
    fn into_fixture(self, password: &str) -> FixtureUser {
        FixtureUser {
            id: self.id,
            username: self.username,
            password: password.to_string(),
            first_name: self.first_name,
            last_name: self.last_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Results<T> {
    results: Vec<T>,
}

#[async_trait]
pub trait Seeder: Send + Sync {
    /// Reset application data to the known fixture set
    async fn seed(&self) -> E2eResult<()>;

    /// Return one pre-existing user
    async fn find_user(&self) -> E2eResult<FixtureUser>;
}

/// Seeds through the application's test-data API
pub struct HttpSeeder {
    client: reqwest::Client,
    endpoint: Url,
    password: String,
}

impl HttpSeeder {
    /// `api_url` is the API base, e.g. `http://localhost:3001`
    pub fn new(api_url: &str, password: impl Into<String>, timeout: Duration) -> E2eResult<Self> {
        let mut endpoint = Url::parse(api_url)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let endpoint = endpoint.join("testData/")?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            password: password.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Seeder for HttpSeeder {
    async fn seed(&self) -> E2eResult<()> {
        let url = self.endpoint.join("seed")?;
        debug!("Seeding via {}", url);

        let resp = self.client.post(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(E2eError::Seed(format!("POST {} returned {}", url, resp.status())));
        }
        Ok(())
    }

    async fn find_user(&self) -> E2eResult<FixtureUser> {
        let url = self.endpoint.join("users")?;
        let resp = self.client.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(E2eError::Seed(format!("GET {} returned {}", url, resp.status())));
        }

        let body: Results<RemoteUser> = resp.json().await?;
        body.results
            .into_iter()
            .next()
            .map(|u| u.into_fixture(&self.password))
            .ok_or_else(|| E2eError::Seed("no users in seeded data".to_string()))
    }
}

/// Seeds by running external commands
///
/// The find command must print a JSON user object (or an array of them).
pub struct CommandSeeder {
    seed: Vec<String>,
    find_user: Option<Vec<String>>,
    password: String,
}

impl CommandSeeder {
    pub fn new(seed: Vec<String>, find_user: Option<Vec<String>>, password: impl Into<String>) -> E2eResult<Self> {
        if seed.is_empty() {
            return Err(E2eError::InvalidConfig("seed command is empty".to_string()));
        }
        Ok(Self {
            seed,
            find_user,
            password: password.into(),
        })
    }

    async fn run(argv: &[String]) -> E2eResult<String> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| E2eError::InvalidConfig("empty command".to_string()))?;

        let output = Command::new(program).args(args).output().await.map_err(|e| {
            E2eError::Seed(format!("failed to run {}: {}", program, e))
        })?;

        if !output.status.success() {
            return Err(E2eError::Seed(format!(
                "{} exited with {}: {}",
                argv.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Seeder for CommandSeeder {
    async fn seed(&self) -> E2eResult<()> {
        info!("Seeding with `{}`", self.seed.join(" "));
        Self::run(&self.seed).await.map(|_| ())
    }

    async fn find_user(&self) -> E2eResult<FixtureUser> {
        let argv = self
            .find_user
            .as_ref()
            .ok_or_else(|| E2eError::Seed("no find-user command configured".to_string()))?;
        let stdout = Self::run(argv).await?;
        parse_user_listing(&stdout, &self.password)
    }
}

/// Accepts a single user object, an array, or `{ "results": [...] }`
fn parse_user_listing(raw: &str, password: &str) -> E2eResult<FixtureUser> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())?;
    let first = match value {
        serde_json::Value::Array(items) => items.into_iter().next(),
        serde_json::Value::Object(mut map) if map.contains_key("results") => match map.remove("results") {
            Some(serde_json::Value::Array(items)) => items.into_iter().next(),
            _ => None,
        },
        other => Some(other),
    };

    let first = first.ok_or_else(|| E2eError::Seed("user listing is empty".to_string()))?;
    let user: RemoteUser = serde_json::from_value(first)?;
    Ok(user.into_fixture(password))
}

/// Used when the suite seeds nothing
pub struct NoopSeeder;

#[async_trait]
impl Seeder for NoopSeeder {
    async fn seed(&self) -> E2eResult<()> {
        Ok(())
    }

    async fn find_user(&self) -> E2eResult<FixtureUser> {
        Err(E2eError::Seed("seeding is disabled; no fixture users available".to_string()))
    }
}
