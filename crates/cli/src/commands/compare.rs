//! Compare two artifacts

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use statecap_runner::visual::{self, CompareOptions};

use crate::output::{print_error, print_item, print_success, OutputFormat};

#[derive(Args)]
pub struct CompareArgs {
    /// Freshly captured artifact
    #[arg(required = true)]
    pub actual: PathBuf,

    /// Artifact to compare against
    #[arg(required = true)]
    pub baseline: PathBuf,

    /// Allowed share of differing pixels, in percent
    #[arg(long, default_value = "0.0")]
    pub threshold: f64,

    /// Write a diff image here when pixels differ
    #[arg(long)]
    pub diff: Option<PathBuf>,
}

/// Returns whether the artifacts match
pub fn execute(args: CompareArgs, format: OutputFormat) -> Result<bool> {
    let options = CompareOptions {
        threshold: args.threshold,
        diff_path: args.diff,
    };
    let diff = visual::compare(&args.actual, &args.baseline, &options)?;

    print_item(&diff, format);
    if !format.is_structured() {
        if diff.matches {
            print_success("artifacts match");
        } else {
            print_error(&format!(
                "artifacts differ: {:.3}% of pixels changed",
                diff.diff_percent
            ));
        }
    }
    Ok(diff.matches)
}
