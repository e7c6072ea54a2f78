//! Run and list scenarios

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;

use rwa_e2e::device::Viewport;
use rwa_e2e::runner::{write_results, ScenarioResult, SuiteResult};
use rwa_e2e::spec::SuiteSpec;
use rwa_e2e::{suites, E2eConfig, Harness};

use crate::output::{
    print_error, print_info, print_json, print_list, print_success, print_warning, status_cell,
    OutputFormat, TableDisplay,
};

/// Which scenarios to pick
#[derive(Args, Debug, Clone)]
pub struct Selection {
    /// Suite file or directory of suites (repeatable); built-in auth suite when omitted
    #[arg(long)]
    pub suite: Vec<PathBuf>,

    /// Only scenarios whose name contains this text
    #[arg(long)]
    pub name: Option<String>,

    /// Only scenarios carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: Selection,

    /// Run every scenario at this viewport, e.g. 1280x1000
    #[arg(long, conflicts_with = "mobile")]
    pub viewport: Option<Viewport>,

    /// Shorthand for a 375x667 viewport
    #[arg(long)]
    pub mobile: bool,
}

impl Selection {
    pub fn load(&self) -> Result<Vec<SuiteSpec>> {
        let mut loaded = Vec::new();
        if self.suite.is_empty() {
            loaded.push(suites::auth()?);
        }
        for path in &self.suite {
            if path.is_dir() {
                loaded.extend(
                    SuiteSpec::load_all(path)
                        .with_context(|| format!("loading suites from {}", path.display()))?,
                );
            } else {
                loaded.push(SuiteSpec::from_file(path)?);
            }
        }

        Ok(loaded
            .into_iter()
            .map(|suite| match &self.name {
                Some(name) => suite.filter_by_name(name),
                None => suite,
            })
            .map(|suite| match &self.tag {
                Some(tag) => suite.filter_by_tag(tag),
                None => suite,
            })
            .filter(|suite| !suite.scenarios.is_empty())
            .collect())
    }
}

#[derive(Serialize)]
struct ScenarioRow {
    name: String,
    success: bool,
    viewport: String,
    kind: Option<String>,
    step: Option<String>,
    message: Option<String>,
    duration_ms: u64,
    snapshots: usize,
}

impl From<&ScenarioResult> for ScenarioRow {
    fn from(result: &ScenarioResult) -> Self {
        let failure = result.failure.as_ref();
        Self {
            name: result.name.clone(),
            success: result.success,
            viewport: result.viewport.to_string(),
            kind: failure.map(|f| format!("{:?}", f.kind).to_lowercase()),
            step: failure.and_then(|f| f.step.clone()),
            message: failure.map(|f| f.message.clone()),
            duration_ms: result.duration_ms,
            snapshots: result.snapshots.len(),
        }
    }
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Status", "Viewport", "Failed Step", "Duration", "Snapshots"]
    }

    fn row(&self) -> Vec<Cell> {
        let status = match &self.kind {
            None => "PASS".to_string(),
            Some(kind) => format!("FAIL ({})", kind),
        };
        vec![
            Cell::new(&self.name),
            status_cell(self.success, &status, &status),
            Cell::new(&self.viewport),
            Cell::new(self.step.as_deref().unwrap_or("-")),
            Cell::new(format!("{} ms", self.duration_ms)),
            Cell::new(self.snapshots),
        ]
    }
}

/// Returns whether every scenario passed
pub async fn execute(args: RunArgs, config: &E2eConfig, format: OutputFormat) -> Result<bool> {
    let selected = args.selection.load()?;
    if selected.is_empty() {
        print_warning("No scenarios match the selection");
        return Ok(true);
    }

    let viewport = if args.mobile {
        Some(Viewport::MOBILE)
    } else {
        args.viewport
    };

    let mut harness = Harness::start(config).await.context("starting the browser harness")?;
    if let Some(viewport) = viewport {
        harness = harness.map_runner(|runner| runner.with_viewport(viewport));
    }

    let mut runs = Vec::with_capacity(selected.len());
    for suite in &selected {
        runs.push(harness.runner().run_suite(suite).await);
    }
    harness.shutdown().await?;

    let result = SuiteResult::merge(runs).context("no suites were run")?;
    let path = write_results(&result, config.output_dir())?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => {
            let rows: Vec<ScenarioRow> = result.results.iter().map(ScenarioRow::from).collect();
            print_list(&rows, format);
            for row in rows.iter().filter(|r| !r.success) {
                print_error(&format!(
                    "{}: {}",
                    row.name,
                    row.message.as_deref().unwrap_or("unknown error")
                ));
            }
            let summary = format!(
                "{} passed, {} failed ({} ms)",
                result.passed, result.failed, result.duration_ms
            );
            if result.success() {
                print_success(&summary);
            } else {
                print_error(&summary);
            }
            print_info(&format!("Results written to {}", path.display()));
        }
    }

    Ok(result.success())
}

#[derive(Serialize)]
struct ListRow {
    suite: String,
    scenario: String,
    tags: Vec<String>,
    viewport: Option<String>,
    steps: usize,
}

impl TableDisplay for ListRow {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Scenario", "Tags", "Viewport", "Steps"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.suite),
            Cell::new(&self.scenario),
            Cell::new(self.tags.join(", ")),
            Cell::new(self.viewport.as_deref().unwrap_or("default")),
            Cell::new(self.steps),
        ]
    }
}

pub fn list(selection: Selection, format: OutputFormat) -> Result<()> {
    let rows: Vec<ListRow> = selection
        .load()?
        .iter()
        .flat_map(|suite| {
            suite.scenarios.iter().map(|scenario| ListRow {
                suite: suite.name.clone(),
                scenario: scenario.name.clone(),
                tags: scenario.tags.clone(),
                viewport: scenario.viewport.map(|v| v.to_string()),
                steps: scenario.steps.len(),
            })
        })
        .collect();
    print_list(&rows, format);
    Ok(())
}
