//! REST layer transport for the HTTP(S) protocol.
use anyhow::Context;
use anyhow::Result;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as ReqwestClient;
use reqwest::Method;

use dryproof_client_utils::TransportError;
use dryproof_rest::IRest;
use dryproof_rest::Request;
use dryproof_rest::Response;
use dryproof_rest::Verb;

pub use dryproof_client_utils::ClientOptions;

/// String to set as the user agent in HTTP request.
static CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// REST layer transport for the HTTP(S) protocol.
pub struct HttpClient {
    /// Base URL of resource collections: server address and API prefix.
    base: String,

    /// Token to authenticate requests with, if any.
    bearer_token: Option<String>,

    /// Low-level [`Client`](reqwest::Client) to perform HTTP requests with.
    client: ReqwestClient,
}

impl HttpClient {
    /// Initialise a client with [`ClientOptions`].
    pub fn with<O>(options: O) -> Result<HttpClient>
    where
        O: Into<ClientOptions>,
    {
        let options = options.into();
        let client = options.client(CLIENT_USER_AGENT);
        let client = HttpClient {
            base: format!("{}{}", options.address, options.api_prefix),
            bearer_token: options.bearer_token,
            client: client.build()?,
        };
        Ok(client)
    }

    /// Convert a transport-agnostic [`Request`] into a ready to send HTTP request.
    fn prepare(&self, request: &Request) -> Result<reqwest::Request> {
        let method = match request.verb {
            Verb::Delete => Method::DELETE,
            Verb::Get => Method::GET,
            Verb::Patch => Method::PATCH,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
        };
        let url = format!("{}{}", self.base, request.path.render());
        let mut builder = self.client.request(method, url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, body.content_type.as_str())
                .body(body.payload.clone());
        }
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        let request = builder.build().context(TransportError)?;
        Ok(request)
    }
}

#[async_trait::async_trait]
impl IRest for HttpClient {
    async fn execute(&self, request: Request) -> Result<Response> {
        let request = self.prepare(&request)?;
        let response = self
            .client
            .execute(request)
            .await
            .context(TransportError)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.context(TransportError)?;
        Ok(Response {
            body: body.to_vec(),
            status,
        })
    }
}
