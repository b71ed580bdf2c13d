//! Configuration options for structured-resource API HTTP(S) clients.
use std::time::Duration;

use reqwest::Client;
use reqwest::ClientBuilder;

/// Path prefix of the API group requests are sent to when none is given.
pub const DEFAULT_API_PREFIX: &str = "apis/kubevirt.io/v1";

/// Options to initialise clients with.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Address of the API server to connect to, with trailing slash.
    pub address: String,

    /// Group and version path prefix for resource collections, with trailing slash.
    pub api_prefix: String,

    /// Token to authenticate requests with, if any.
    pub bearer_token: Option<String>,

    /// Accept any TLS certificate presented by the server.
    pub insecure: bool,

    /// Timeout for requests made by the client.
    pub timeout: Duration,

    /// Timeout for new connections initialised by the client.
    pub timeout_connect: Duration,
}

impl ClientOptions {
    /// Begin a [`reqwest`] client configured with these options.
    pub fn client(&self, user_agent: &str) -> ClientBuilder {
        Client::builder()
            .connect_timeout(self.timeout_connect)
            .danger_accept_invalid_certs(self.insecure)
            .timeout(self.timeout)
            .user_agent(user_agent)
    }

    /// Define options for API clients.
    pub fn url<S>(address: S) -> ClientOptionsBuilder
    where
        S: Into<String>,
    {
        ClientOptionsBuilder {
            address: address.into(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            bearer_token: None,
            insecure: false,
            timeout: Duration::from_secs(30),
            timeout_connect: Duration::from_secs(1),
        }
    }
}

/// Incrementally build [`ClientOptions`] objects.
pub struct ClientOptionsBuilder {
    address: String,
    api_prefix: String,
    bearer_token: Option<String>,
    insecure: bool,
    timeout: Duration,
    timeout_connect: Duration,
}

impl ClientOptionsBuilder {
    /// Send requests to resource collections under a different group and version.
    ///
    /// Core resources are served under `api/v1`, everything else under `apis/{group}/{version}`.
    pub fn api_prefix<S>(mut self, prefix: S) -> Self
    where
        S: Into<String>,
    {
        self.api_prefix = prefix.into();
        self
    }

    /// Authenticate requests with a bearer token.
    pub fn bearer_token<S>(mut self, token: S) -> Self
    where
        S: Into<String>,
    {
        self.bearer_token = Some(token.into());
        self
    }

    /// All options are set, get a usable options object.
    pub fn client(self) -> ClientOptions {
        self.into()
    }

    /// Skip verification of the server's TLS certificate.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Timeout for entire requests.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout for establishing new connections.
    pub fn timeout_connect(mut self, timeout: Duration) -> Self {
        self.timeout_connect = timeout;
        self
    }
}

impl From<ClientOptionsBuilder> for ClientOptions {
    fn from(value: ClientOptionsBuilder) -> Self {
        let mut address = value.address;
        if !address.ends_with('/') {
            address.push('/');
        }
        let mut api_prefix = value.api_prefix.trim_matches('/').to_string();
        if !api_prefix.is_empty() {
            api_prefix.push('/');
        }
        ClientOptions {
            address,
            api_prefix,
            bearer_token: value.bearer_token,
            insecure: value.insecure,
            timeout: value.timeout,
            timeout_connect: value.timeout_connect,
        }
    }
}
