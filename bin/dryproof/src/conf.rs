//! Configuration of the API server to verify and the scenarios to run against it.
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use dryproof_client_utils::ClientOptions;
use dryproof_client_utils::DEFAULT_API_PREFIX;
use dryproof_executor::MutationVerb;
use dryproof_executor::UpdaterBackoff;
use dryproof_rest::DynamicObject;
use dryproof_verify::MetadataField;
use dryproof_verify::Scenario;

/// Errors loading the `dryproof` configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unable to decode configuration from file at the given path.
    #[error("unable to decode configuration from file at '{0}'")]
    // (path,)
    Decode(String),

    /// Unable to read configuration file at the given path.
    #[error("unable to read configuration file at '{0}'")]
    // (path,)
    Open(String),

    /// Configuration file not found at the given path.
    #[error("configuration file not found at '{0}'")]
    // (path,)
    PathNotFound(String),
}

/// Configuration of a `dryproof` process.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conf {
    /// Connection options for the API server.
    #[serde(default)]
    pub api: ApiConf,

    /// Retry policy for dry-run updates that conflict with concurrent changes.
    #[serde(default)]
    pub updater: UpdaterBackoff,

    /// Resources to verify dry-run behaviour with, in order.
    #[serde(default)]
    pub scenarios: Vec<ScenarioConf>,
}

/// Connection options for the API server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiConf {
    /// Address of the API server.
    #[serde(default = "ApiConf::default_address")]
    pub address: String,

    /// Group and version path prefix for resource collections.
    #[serde(default = "ApiConf::default_api_prefix")]
    pub api_prefix: String,

    /// Token to authenticate requests with.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Skip verification of the server's TLS certificate.
    #[serde(default)]
    pub insecure: bool,

    /// Timeout, in seconds, for entire requests.
    #[serde(default = "ApiConf::default_timeout")]
    pub timeout: u64,

    /// Timeout, in seconds, for establishing new connections.
    #[serde(default = "ApiConf::default_timeout_connect")]
    pub timeout_connect: u64,
}

impl Default for ApiConf {
    fn default() -> Self {
        ApiConf {
            address: ApiConf::default_address(),
            api_prefix: ApiConf::default_api_prefix(),
            bearer_token: None,
            insecure: false,
            timeout: ApiConf::default_timeout(),
            timeout_connect: ApiConf::default_timeout_connect(),
        }
    }
}

impl ApiConf {
    fn default_address() -> String {
        "http://localhost:8001/".into()
    }

    fn default_api_prefix() -> String {
        DEFAULT_API_PREFIX.into()
    }

    fn default_timeout() -> u64 {
        30
    }

    fn default_timeout_connect() -> u64 {
        1
    }
}

impl From<ApiConf> for ClientOptions {
    fn from(value: ApiConf) -> Self {
        let mut options = ClientOptions::url(value.address)
            .api_prefix(value.api_prefix)
            .insecure(value.insecure)
            .timeout(Duration::from_secs(value.timeout))
            .timeout_connect(Duration::from_secs(value.timeout_connect));
        if let Some(token) = value.bearer_token {
            options = options.bearer_token(token);
        }
        options.client()
    }
}

/// A resource to verify dry-run behaviour with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioConf {
    /// Pluralised name of the collection the manifest belongs to.
    pub kind: String,

    /// Object to create, with `metadata.name` set.
    pub manifest: DynamicObject,

    /// Metadata map the patch verification sets the marker entry in.
    #[serde(default)]
    pub patch_field: MetadataField,

    /// Metadata map the update verification sets the marker entry in.
    #[serde(default)]
    pub update_field: MetadataField,

    /// Verbs to verify, all of them if not set.
    #[serde(default = "ScenarioConf::default_verbs")]
    pub verbs: Vec<MutationVerb>,
}

impl ScenarioConf {
    fn default_verbs() -> Vec<MutationVerb> {
        MutationVerb::ALL.to_vec()
    }

    /// Scenario to run, placing namespaced manifests in `namespace` if given.
    pub fn scenario(&self, namespace: Option<&str>) -> Scenario {
        let mut object = self.manifest.clone();
        if let Some(namespace) = namespace {
            if object.metadata.namespace.is_some() {
                object.metadata.namespace = Some(namespace.to_string());
            }
        }
        Scenario {
            kind: self.kind.clone(),
            object,
            patch_field: self.patch_field,
            update_field: self.update_field,
            verbs: self.verbs.clone(),
        }
    }
}

/// Load process configuration from the specified path.
pub fn load(path: &str) -> Result<Conf> {
    if !PathBuf::from(path).exists() {
        let error = Error::PathNotFound(path.to_string());
        let error = anyhow::anyhow!(error);
        return Err(error);
    }

    let file = File::open(path).with_context(|| Error::Open(path.into()))?;
    let conf = serde_yaml::from_reader(file).with_context(|| Error::Decode(path.into()))?;
    Ok(conf)
}
