use std::path::Path;

use crate::scenario::{self, Scenario, SortReport};

pub fn sort(path: &str, format: &str) -> anyhow::Result<()> {
    let scenario = Scenario::from_file(Path::new(path))?;
    let report = scenario.report()?;
    print!("{}", render(&report, format)?);
    Ok(())
}

fn render(report: &SortReport, format: &str) -> anyhow::Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(report)? + "\n"),
        _ => Ok(scenario::format_report(report)),
    }
}
