//! Validate scenario files without launching a browser

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use walkdir::WalkDir;

use statecap_common::Scenario;

use crate::output::{print_error, print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct CheckArgs {
    /// Scenario files or directories to scan for *.yaml / *.yml
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only report scenarios carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

/// Validation result for one file
#[derive(Debug, Serialize)]
pub struct CheckRow {
    pub file: String,
    pub scenario: Option<String>,
    pub tags: Vec<String>,
    pub steps: usize,
    pub capture: Option<String>,
    pub error: Option<String>,
}

impl CheckRow {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

impl TableDisplay for CheckRow {
    fn headers() -> Vec<&'static str> {
        vec!["File", "Scenario", "Steps", "Capture", "Status"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.file.clone(),
            self.scenario.clone().unwrap_or_else(|| "-".to_string()),
            self.steps.to_string(),
            self.capture.clone().unwrap_or_else(|| "-".to_string()),
            match &self.error {
                None => "valid".to_string(),
                Some(e) => format!("invalid: {}", e),
            },
        ]
    }
}

fn is_scenario_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Expand directories into the scenario files below them
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && is_scenario_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if path.exists() {
            files.push(path.clone());
        } else {
            bail!("no such file or directory: {}", path.display());
        }
    }
    Ok(files)
}

/// Parse and validate one scenario file
pub fn check_file(path: &Path) -> CheckRow {
    let file = path.display().to_string();
    match Scenario::from_file(path) {
        Ok(scenario) => {
            let capture = scenario
                .capture_index()
                .and_then(|i| scenario.steps[i].capture_region())
                .map(|region| region.to_string());
            CheckRow {
                file,
                scenario: Some(scenario.name.clone()),
                tags: scenario.tags.clone(),
                steps: scenario.steps.len(),
                capture,
                error: scenario.validate().err().map(|e| e.to_string()),
            }
        }
        Err(e) => CheckRow {
            file,
            scenario: None,
            tags: Vec::new(),
            steps: 0,
            capture: None,
            error: Some(e.to_string()),
        },
    }
}

/// Returns whether every checked scenario is valid
pub fn execute(args: CheckArgs, format: OutputFormat) -> Result<bool> {
    let files = collect_files(&args.paths)?;
    if files.is_empty() {
        bail!("no scenario files found");
    }

    let rows: Vec<CheckRow> = files
        .iter()
        .map(|f| check_file(f))
        .filter(|row| match &args.tag {
            // files that failed to parse are always reported
            Some(tag) => row.scenario.is_none() || row.tags.iter().any(|t| t == tag),
            None => true,
        })
        .collect();

    print_list(&rows, format);

    let invalid = rows.iter().filter(|r| !r.is_valid()).count();
    if !format.is_structured() {
        if rows.is_empty() {
            print_warning("no scenario matched the tag filter");
        } else if invalid == 0 {
            print_success(&format!("{} scenario(s) valid", rows.len()));
        } else {
            print_error(&format!("{} of {} scenario(s) invalid", invalid, rows.len()));
        }
    }
    Ok(invalid == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VALID: &str = r#"
name: smoke
tags: [smoke]
app: index.html
steps:
  - action: navigate
  - action: capture
    selector: '.content-view'
artifact:
  path: out.png
"#;

    const NO_CAPTURE: &str = r#"
name: broken
app: index.html
steps:
  - action: navigate
artifact:
  path: out.png
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_collect_files_walks_directories() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.yaml", VALID);
        write(&dir, "a.yml", VALID);
        write(&dir, "notes.txt", "not a scenario");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.yaml"), VALID).unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.yml", "b.yaml", "c.yaml"]);
    }

    #[test]
    fn test_collect_files_rejects_missing_path() {
        let dir = TempDir::new().unwrap();
        assert!(collect_files(&[dir.path().join("missing.yaml")]).is_err());
    }

    #[test]
    fn test_check_file_reports_capture_region() {
        let dir = TempDir::new().unwrap();
        let row = check_file(&write(&dir, "ok.yaml", VALID));
        assert!(row.is_valid());
        assert_eq!(row.scenario.as_deref(), Some("smoke"));
        assert_eq!(row.steps, 2);
        assert_eq!(row.capture.as_deref(), Some("element .content-view"));
    }

    #[test]
    fn test_check_file_reports_invalid_and_unparseable() {
        let dir = TempDir::new().unwrap();

        let row = check_file(&write(&dir, "broken.yaml", NO_CAPTURE));
        assert!(!row.is_valid());
        assert_eq!(row.scenario.as_deref(), Some("broken"));
        assert!(row.capture.is_none());

        let row = check_file(&write(&dir, "garbage.yaml", "steps: [1, 2"));
        assert!(!row.is_valid());
        assert!(row.scenario.is_none());
    }

    #[test]
    fn test_execute_fails_when_any_invalid() {
        let dir = TempDir::new().unwrap();
        write(&dir, "ok.yaml", VALID);
        write(&dir, "broken.yaml", NO_CAPTURE);

        let args = CheckArgs {
            paths: vec![dir.path().to_path_buf()],
            tag: None,
        };
        assert!(!execute(args, OutputFormat::Plain).unwrap());

        let args = CheckArgs {
            paths: vec![dir.path().join("ok.yaml")],
            tag: Some("smoke".to_string()),
        };
        assert!(execute(args, OutputFormat::Plain).unwrap());
    }
}
