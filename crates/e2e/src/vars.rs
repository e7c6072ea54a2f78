//! Per-scenario variables and `{{name}}` interpolation

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{E2eError, E2eResult};
use crate::seed::FixtureUser;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex"));

#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Expose a fixture user as `<prefix>.username`, `<prefix>.password`, ...
    pub fn bind_user(&mut self, prefix: &str, user: &FixtureUser) {
        self.set(format!("{}.username", prefix), user.username.clone());
        self.set(format!("{}.password", prefix), user.password.clone());
        if let Some(id) = &user.id {
            self.set(format!("{}.id", prefix), id.clone());
        }
        if let Some(first) = &user.first_name {
            self.set(format!("{}.first_name", prefix), first.clone());
        }
        if let Some(last) = &user.last_name {
            self.set(format!("{}.last_name", prefix), last.clone());
        }
    }

    /// Replace every `{{name}}`; unknown names are an error
    pub fn interpolate(&self, template: &str) -> E2eResult<String> {
        let mut missing = None;
        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match self.values.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(name) => Err(E2eError::UndefinedVariable(name)),
            None => Ok(rendered.into_owned()),
        }
    }
}
