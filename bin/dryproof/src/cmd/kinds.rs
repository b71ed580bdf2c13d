//! List the scenarios in the configuration.
use anyhow::Result;

use dryproof_rest::Resource;

use crate::Conf;

/// Print one line for each configured scenario.
pub fn run(conf: &Conf) -> Result<i32> {
    for scenario in &conf.scenarios {
        let verbs: Vec<String> = scenario.verbs.iter().map(ToString::to_string).collect();
        println!(
            "{}/{} [{}]",
            scenario.kind,
            scenario.manifest.name(),
            verbs.join(", "),
        );
    }
    Ok(0)
}
