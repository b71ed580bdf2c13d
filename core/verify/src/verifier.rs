//! Run dry-run requests and check the server state is left untouched.
use anyhow::Result;

use dryproof_client_utils::is_not_found;
use dryproof_context::Context;
use dryproof_executor::ConvergentUpdater;
use dryproof_executor::DryRunExecutor;
use dryproof_executor::MissingName;
use dryproof_executor::MutationVerb;
use dryproof_rest::Api;
use dryproof_rest::DeleteOptions;
use dryproof_rest::DynamicObject;
use dryproof_rest::PatchType;
use dryproof_rest::PropagationPolicy;
use dryproof_rest::Resource;
use dryproof_rest::Rest;

use crate::error::VerificationFailed;
use crate::report::ScenarioOutcome;
use crate::MetadataField;
use crate::Scenario;
use crate::MARKER_KEY;
use crate::MARKER_VALUE;

/// Resource a scenario operates on.
struct Target {
    api: Api<DynamicObject>,
    kind: String,
    name: String,
}

impl Target {
    fn new(rest: &Rest, scenario: &Scenario) -> Result<Target> {
        let name = scenario.object.name();
        if name.is_empty() {
            anyhow::bail!(MissingName {
                kind: scenario.kind.clone(),
            });
        }
        let api = Api::namespaced(
            rest.clone(),
            &scenario.kind,
            scenario.object.namespace(),
        );
        Ok(Target {
            api,
            kind: scenario.kind.clone(),
            name: name.to_string(),
        })
    }

    fn failed<S>(&self, verb: MutationVerb, reason: S) -> anyhow::Error
    where
        S: Into<String>,
    {
        anyhow::anyhow!(VerificationFailed {
            kind: self.kind.clone(),
            name: self.name.clone(),
            reason: reason.into(),
            verb,
        })
    }
}

/// Verify each mutating verb leaves no trace when sent as a dry-run.
///
/// Scenarios for delete, update and patch need an object to act on: they create one
/// for real and delete it once the verification is done, whether it passed or not.
#[derive(Clone)]
pub struct Verifier {
    executor: DryRunExecutor,
    rest: Rest,
    updater: ConvergentUpdater,
}

impl Verifier {
    pub fn new(rest: Rest, updater: ConvergentUpdater) -> Verifier {
        Verifier {
            executor: DryRunExecutor::new(rest.clone()),
            rest,
            updater,
        }
    }

    /// A dry-run create must not make the object readable.
    pub async fn create(&self, context: &Context, scenario: &Scenario) -> Result<()> {
        let target = Target::new(&self.rest, scenario)?;
        self.dry_run_create(context, &target, scenario).await
    }

    /// Repeated dry-run creates of the same object must all succeed without persisting it.
    pub async fn create_idempotent(&self, context: &Context, scenario: &Scenario) -> Result<()> {
        let target = Target::new(&self.rest, scenario)?;
        self.dry_run_create(context, &target, scenario).await?;
        self.dry_run_create(context, &target, scenario).await
    }

    /// A dry-run delete must leave the object in place and unchanged.
    pub async fn delete(&self, context: &Context, scenario: &Scenario) -> Result<()> {
        let target = Target::new(&self.rest, scenario)?;
        let created = target.api.create(&scenario.object).await?;
        let result = self.verify_delete(&target, &created).await;
        self.finish(context, &target, result).await
    }

    /// A dry-run merge patch setting the marker entry in `patch_field` must not be persisted.
    pub async fn patch(&self, context: &Context, scenario: &Scenario) -> Result<()> {
        let target = Target::new(&self.rest, scenario)?;
        target.api.create(&scenario.object).await?;
        let result = self.verify_patch(context, &target, scenario).await;
        self.finish(context, &target, result).await
    }

    /// Verify the verbs selected by the scenario, one outcome for each.
    ///
    /// The create verb is verified with repeated requests to also cover idempotence.
    pub async fn run(&self, context: &Context, scenario: &Scenario) -> Vec<ScenarioOutcome> {
        let mut outcomes = Vec::with_capacity(scenario.verbs.len());
        for verb in &scenario.verbs {
            let verb = *verb;
            let context = context.derive_with(|builder| {
                builder
                    .log_resource(
                        &scenario.kind,
                        scenario.object.namespace(),
                        scenario.object.name(),
                    )
                    .log_values(slog::o!("verb" => verb.to_string()))
            });
            let result = match verb {
                MutationVerb::Create => self.create_idempotent(&context, scenario).await,
                MutationVerb::Delete => self.delete(&context, scenario).await,
                MutationVerb::Patch => self.patch(&context, scenario).await,
                MutationVerb::Update => self.update(&context, scenario).await,
            };
            match &result {
                Ok(()) => slog::info!(context.logger, "Dry-run verification passed"),
                Err(error) => slog::error!(
                    context.logger, "Dry-run verification failed";
                    replisdk::utils::error::slog::ErrorAttributes::from(error),
                ),
            }
            outcomes.push(ScenarioOutcome {
                error: result.err(),
                kind: scenario.kind.clone(),
                name: scenario.object.name().to_string(),
                verb,
            });
        }
        outcomes
    }

    /// A dry-run update setting the marker entry in `update_field` must not be persisted.
    pub async fn update(&self, context: &Context, scenario: &Scenario) -> Result<()> {
        let target = Target::new(&self.rest, scenario)?;
        target.api.create(&scenario.object).await?;
        let result = self.verify_update(context, &target, scenario).await;
        self.finish(context, &target, result).await
    }

    /// Check the marker entry was not set by a dry-run request.
    async fn check_unchanged(
        &self,
        target: &Target,
        verb: MutationVerb,
        field: MetadataField,
    ) -> Result<()> {
        let current = target.api.get(&target.name).await?;
        if field.has_marker(current.metadata()) {
            let reason = format!(
                "{} entry '{}' was set to '{}'",
                field_name(field),
                MARKER_KEY,
                MARKER_VALUE,
            );
            return Err(target.failed(verb, reason));
        }
        Ok(())
    }

    async fn dry_run_create(
        &self,
        context: &Context,
        target: &Target,
        scenario: &Scenario,
    ) -> Result<()> {
        self.executor
            .create(
                context,
                &target.kind,
                scenario.object.namespace(),
                &scenario.object,
                None,
            )
            .await?;
        match target.api.get(&target.name).await {
            Err(error) if is_not_found(&error) => Ok(()),
            Err(error) => Err(error),
            Ok(_) => {
                let result = Err(target.failed(MutationVerb::Create, "object was persisted"));
                self.finish(context, target, result).await
            }
        }
    }

    /// Delete the scenario object for real, keeping the verification error first.
    async fn finish(&self, context: &Context, target: &Target, result: Result<()>) -> Result<()> {
        let options = DeleteOptions::default().with_propagation(PropagationPolicy::Background);
        let cleanup = target.api.delete(&target.name, &options).await;
        match (result, cleanup) {
            (result, Ok(())) => result,
            (result, Err(error)) if is_not_found(&error) => result,
            (Ok(()), Err(error)) => Err(error),
            (Err(primary), Err(error)) => {
                slog::warn!(
                    context.logger, "Failed to clean up scenario object";
                    replisdk::utils::error::slog::ErrorAttributes::from(&error),
                );
                Err(primary)
            }
        }
    }

    async fn verify_delete(&self, target: &Target, created: &DynamicObject) -> Result<()> {
        let options = DeleteOptions::dry_run_all().with_propagation(PropagationPolicy::Foreground);
        target.api.delete(&target.name, &options).await?;
        let current = match target.api.get(&target.name).await {
            Err(error) if is_not_found(&error) => {
                return Err(target.failed(MutationVerb::Delete, "object was removed"));
            }
            result => result?,
        };
        if current.metadata.deletion_timestamp.is_some() {
            return Err(target.failed(MutationVerb::Delete, "object was marked for deletion"));
        }
        if current.metadata.uid != created.metadata.uid {
            let reason = format!(
                "object was replaced (uid {:?} is now {:?})",
                created.metadata.uid, current.metadata.uid,
            );
            return Err(target.failed(MutationVerb::Delete, reason));
        }
        if current != *created {
            let reason = format!(
                "object was modified (resourceVersion {:?} is now {:?})",
                created.metadata.resource_version, current.metadata.resource_version,
            );
            return Err(target.failed(MutationVerb::Delete, reason));
        }
        Ok(())
    }

    async fn verify_patch(
        &self,
        context: &Context,
        target: &Target,
        scenario: &Scenario,
    ) -> Result<()> {
        let patch = serde_json::to_vec(&scenario.patch_field.marker_patch())?;
        self.executor
            .patch(
                context,
                &target.kind,
                &target.name,
                scenario.object.namespace(),
                PatchType::Merge,
                &patch,
                None,
            )
            .await?;
        self.check_unchanged(target, MutationVerb::Patch, scenario.patch_field)
            .await
    }

    async fn verify_update(
        &self,
        context: &Context,
        target: &Target,
        scenario: &Scenario,
    ) -> Result<()> {
        let executor = &self.executor;
        let field = scenario.update_field;
        let namespace = scenario.object.namespace();
        self.updater
            .run(context, || async move {
                let mut current = target.api.get(&target.name).await?;
                field
                    .get_mut(current.metadata_mut())
                    .insert(MARKER_KEY.to_string(), MARKER_VALUE.to_string());
                executor
                    .update(context, &target.kind, &target.name, namespace, &current, None)
                    .await
            })
            .await?;
        self.check_unchanged(target, MutationVerb::Update, field)
            .await
    }
}

fn field_name(field: MetadataField) -> &'static str {
    match field {
        MetadataField::Annotations => "annotation",
        MetadataField::Labels => "label",
    }
}
