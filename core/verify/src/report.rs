//! Collect the results of verification scenarios.
use anyhow::Error;

use dryproof_executor::MutationVerb;

/// Result of verifying one verb against one resource.
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// Error that failed the scenario, if any.
    pub error: Option<Error>,

    /// Collection the resource belongs to.
    pub kind: String,

    /// Name of the resource the scenario operated on.
    pub name: String,

    /// Verb whose dry-run was verified.
    pub verb: MutationVerb,
}

impl ScenarioOutcome {
    /// Check if the scenario passed.
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate outcomes across scenarios.
#[derive(Debug, Default)]
pub struct Report {
    outcomes: Vec<ScenarioOutcome>,
}

impl Report {
    /// Add the outcomes of a scenario run to the report.
    pub fn extend<I>(&mut self, outcomes: I)
    where
        I: IntoIterator<Item = ScenarioOutcome>,
    {
        self.outcomes.extend(outcomes);
    }

    /// Iterate over failed outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed())
    }

    /// Check if every recorded scenario passed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ScenarioOutcome::passed)
    }

    /// All recorded outcomes, in execution order.
    pub fn outcomes(&self) -> &[ScenarioOutcome] {
        &self.outcomes
    }

    /// Number of scenarios that passed.
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.passed()).count()
    }
}

#[cfg(test)]
mod tests {
    use dryproof_executor::MutationVerb;

    use super::Report;
    use super::ScenarioOutcome;

    fn outcome(verb: MutationVerb, error: Option<&str>) -> ScenarioOutcome {
        ScenarioOutcome {
            error: error.map(|message| anyhow::anyhow!(message.to_string())),
            kind: "widgets".into(),
            name: "w1".into(),
            verb,
        }
    }

    #[test]
    fn empty_report_is_success() {
        let report = Report::default();
        assert!(report.is_success());
        assert_eq!(report.passed(), 0);
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn failures_are_counted() {
        let mut report = Report::default();
        report.extend(vec![
            outcome(MutationVerb::Create, None),
            outcome(MutationVerb::Delete, Some("object was removed")),
            outcome(MutationVerb::Update, None),
        ]);
        assert!(!report.is_success());
        assert_eq!(report.passed(), 2);
        let failed: Vec<MutationVerb> = report.failures().map(|outcome| outcome.verb).collect();
        assert_eq!(failed, vec![MutationVerb::Delete]);
        assert_eq!(report.outcomes().len(), 3);
    }
}
