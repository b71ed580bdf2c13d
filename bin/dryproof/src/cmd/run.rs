//! Run the configured scenarios and report the results.
use anyhow::Result;
use clap::Args;

use dryproof_context::Context;
use dryproof_executor::ConvergentUpdater;
use dryproof_rest::Rest;
use dryproof_rest_http::HttpClient;
use dryproof_verify::Report;
use dryproof_verify::Verifier;

use crate::Conf;

/// Run the configured scenarios against the API server.
#[derive(Debug, Args)]
pub struct RunCli {
    /// Only run scenarios for the given collections.
    #[arg(long = "kind")]
    pub kinds: Vec<String>,

    /// Create namespaced objects in this namespace instead of the one in their manifest.
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,
}

/// Verify all selected scenarios, exiting with 1 if any failed.
pub async fn run(context: &Context, conf: &Conf, args: &RunCli) -> Result<i32> {
    let client = HttpClient::with(conf.api.clone())?;
    let verifier = Verifier::new(
        Rest::from(client),
        ConvergentUpdater::new(conf.updater.clone()),
    );
    let report = verify(context, conf, args, &verifier).await;
    print_report(&report);
    match report.is_success() {
        true => Ok(0),
        false => Ok(1),
    }
}

/// Run the scenarios selected by the CLI arguments, one after the other.
async fn verify(context: &Context, conf: &Conf, args: &RunCli, verifier: &Verifier) -> Report {
    let mut report = Report::default();
    let scenarios = conf
        .scenarios
        .iter()
        .filter(|scenario| args.kinds.is_empty() || args.kinds.contains(&scenario.kind));
    for scenario in scenarios {
        let scenario = scenario.scenario(args.namespace.as_deref());
        let outcomes = verifier.run(context, &scenario).await;
        report.extend(outcomes);
    }
    report
}

fn print_report(report: &Report) {
    for outcome in report.outcomes() {
        let status = match outcome.passed() {
            true => "PASS",
            false => "FAIL",
        };
        print!("{} {}/{} {}", status, outcome.kind, outcome.name, outcome.verb);
        match &outcome.error {
            None => println!(),
            Some(error) => println!(": {:#}", error),
        }
    }
    let failed = report.failures().count();
    println!("{} passed, {} failed", report.passed(), failed);
}
