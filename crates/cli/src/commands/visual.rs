//! Out-of-band visual comparison of captured snapshots

use anyhow::Result;
use comfy_table::Cell;
use serde::Serialize;

use rwa_e2e::visual::{VisualDiff, VisualTester};
use rwa_e2e::E2eConfig;

use crate::output::{
    print_error, print_json, print_list, print_success, print_warning, status_cell, OutputFormat,
    TableDisplay,
};

#[derive(Serialize)]
struct DiffRow<'a>(&'a VisualDiff);

impl TableDisplay for DiffRow<'_> {
    fn headers() -> Vec<&'static str> {
        vec!["Snapshot", "Status", "Diff", "Diff Image"]
    }

    fn row(&self) -> Vec<Cell> {
        let diff = self.0;
        vec![
            Cell::new(&diff.name),
            status_cell(diff.matches, "MATCH", "CHANGED"),
            Cell::new(format!("{:.2}%", diff.diff_percent)),
            Cell::new(
                diff.diff_image_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]
    }
}

/// Returns whether no snapshot regressed
pub fn compare(config: &E2eConfig, threshold: Option<f64>, format: OutputFormat) -> Result<bool> {
    let tester = VisualTester::new(config.visual.clone())?;
    tester.clean_diffs()?;
    let report = tester.compare_all(threshold)?;

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            let rows: Vec<DiffRow> = report.compared.iter().map(DiffRow).collect();
            print_list(&rows, format);
            for missing in &report.missing_baselines {
                print_warning(&format!("No baseline for {}", missing));
            }
            let regressions = report.regressions().count();
            if regressions == 0 {
                print_success(&format!("{} snapshot(s) match their baselines", report.compared.len()));
            } else {
                print_error(&format!("{} snapshot(s) changed", regressions));
            }
        }
    }

    Ok(report.is_clean())
}

pub fn update_baselines(config: &E2eConfig) -> Result<()> {
    let tester = VisualTester::new(config.visual.clone())?;
    let updated = tester.update_all()?;
    print_success(&format!(
        "Updated {} baseline(s) in {}",
        updated,
        config.visual.baseline_dir.display()
    ));
    Ok(())
}
