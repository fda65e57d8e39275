//! `fitgate check-report`: advisory read of an existing report.

use fit_report::{check_report, AdvisoryVerdict, Freshness};

use crate::cli::CheckReportArgs;
use crate::error::{EXIT_GATE_FAILURE, EXIT_PASS};

/// PASS and UNKNOWN exit 0; only a fresh failing report exits 1.
pub fn run(args: &CheckReportArgs) -> u8 {
    let (freshness, verdict) = check_report(&args.report, &args.project_root);
    match freshness {
        Freshness::Fresh => println!("{verdict}"),
        other => println!("{verdict}: report is {other}; rerun `fitgate validate`"),
    }
    match verdict {
        AdvisoryVerdict::Fail => EXIT_GATE_FAILURE,
        AdvisoryVerdict::Pass | AdvisoryVerdict::Unknown => EXIT_PASS,
    }
}
