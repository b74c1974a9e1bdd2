// src/token.rs

//! Requesting an access token from the authorization server.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION};
use http::{Method, Request, Response, StatusCode};
use url::Url;

use crate::challenge::ChallengeHandler;
use crate::error;
use crate::oauth::{self, Grant, OAuthClientConfig, ServerMetadata};
use crate::transport::{ChallengeTransport, ReqwestTransport, Transport};
use crate::Result;

/// How many redirects a token request follows before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Where the server is and how to talk to it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) host: String,
    pub(crate) insecure: bool,
    pub(crate) timeout: Option<Duration>,
}

impl ClientConfig {
    /// Targets the server at `host`, e.g. `https://api.example.com:6443`.
    pub fn new(host: impl Into<String>) -> Self {
        ClientConfig {
            host: host.into(),
            insecure: false,
            timeout: None,
        }
    }

    /// Skip verification of the server certificate.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Bound each request to `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The server address.
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// One token request: the server, the handler answering its challenges, and
/// the grant to use.
///
/// # Example
///
/// ```no_run
/// use challenge_login::{BasicChallengeHandler, ClientConfig, RequestTokenOptions};
///
/// # fn run() -> challenge_login::Result<()> {
/// let handler = BasicChallengeHandler::new("https://api.example.com:6443")
///     .username("developer")
///     .password("secret");
/// let options = RequestTokenOptions::new(ClientConfig::new("https://api.example.com:6443"), handler)?;
/// let token = options.request_token()?;
/// # let _ = token;
/// # Ok(())
/// # }
/// ```
pub struct RequestTokenOptions {
    config: ClientConfig,
    handler: Box<dyn ChallengeHandler>,
    transport: Box<dyn Transport>,
    oauth: Option<OAuthClientConfig>,
    token_flow: bool,
    max_redirects: usize,
}

impl RequestTokenOptions {
    /// Creates a request sent over a [`ReqwestTransport`] built from `config`.
    pub fn new<H>(config: ClientConfig, handler: H) -> Result<Self>
    where
        H: ChallengeHandler + 'static,
    {
        let transport = ReqwestTransport::new(&config)?;
        Ok(RequestTokenOptions::with_transport(config, handler, transport))
    }

    /// Creates a request sent over `transport`.
    pub fn with_transport<H, T>(config: ClientConfig, handler: H, transport: T) -> Self
    where
        H: ChallengeHandler + 'static,
        T: Transport + 'static,
    {
        RequestTokenOptions {
            config,
            handler: Box::new(handler),
            transport: Box::new(transport),
            oauth: None,
            token_flow: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Use the implicit grant (`true`, the default) or the authorization code
    /// grant (`false`).
    ///
    /// Set this before [`discover_oauth_config`](Self::discover_oauth_config),
    /// which only enables PKCE for the code grant.
    pub fn token_flow(mut self, token_flow: bool) -> Self {
        self.token_flow = token_flow;
        self
    }

    /// Use explicit OAuth endpoints instead of the server's well-known paths.
    pub fn oauth_config(mut self, config: OAuthClientConfig) -> Self {
        self.oauth = Some(config);
        self
    }

    /// Give up after `max` redirects without a grant.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// The OAuth endpoints set or discovered so far.
    pub fn oauth_client_config(&self) -> Option<&OAuthClientConfig> {
        self.oauth.as_ref()
    }

    /// Reads the OAuth endpoints from the server's metadata document.
    ///
    /// Fails if endpoints were already configured.
    pub fn discover_oauth_config(&mut self) -> Result<()> {
        if self.oauth.is_some() {
            return Err(error::builder("OAuth client configuration is already set"));
        }

        let url = oauth::metadata_url(&self.config.host)?;
        let response = self
            .transport
            .round_trip(build_request(Method::GET, &url, Bytes::new())?)?;
        if response.status() != StatusCode::OK {
            return Err(error::status_code(url, response.status()));
        }

        log::debug!("read OAuth server metadata from {url}");
        let metadata: ServerMetadata = serde_json::from_slice(response.body())
            .map_err(|err| error::decode(err).with_url(url))?;

        self.oauth = Some(OAuthClientConfig::from_metadata(
            &metadata,
            !self.token_flow,
        ));
        Ok(())
    }

    /// Runs the grant and returns the access token.
    ///
    /// The handler is released when the request ends, whatever the outcome.
    /// A failed release is logged and does not change the result.
    pub fn request_token(mut self) -> Result<String> {
        let result = self.acquire();
        if let Err(err) = self.handler.release() {
            log::debug!("error releasing challenge handler: {err}");
        }
        result
    }

    fn acquire(&mut self) -> Result<String> {
        self.preflight()?;

        let oauth = match self.oauth {
            Some(ref config) => config.clone(),
            None => OAuthClientConfig::for_host(&self.config.host),
        };
        let state = if self.token_flow {
            None
        } else {
            Some(oauth::generate_state())
        };
        let mut url = oauth.authorize_request_url(self.token_flow, state.as_deref())?;

        let mut transport = ChallengeTransport::new(&mut self.transport, &mut self.handler);
        let mut redirects = 0;
        let code = loop {
            let response = transport.round_trip(build_request(Method::GET, &url, Bytes::new())?)?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                return Err(error::unauthorized(unauthorized_message(response.body())));
            }
            if !status.is_redirection() {
                return Err(error::status_code(url, status));
            }

            let location = redirect_location(&url, &response)?;
            match oauth::inspect_redirect(&location, &oauth, self.token_flow)? {
                Some(Grant::Token(token)) => return Ok(token),
                Some(Grant::Code {
                    code,
                    state: returned,
                }) => {
                    if returned != state {
                        return Err(error::oauth("state mismatch in authorization response"));
                    }
                    break code;
                }
                None => {}
            }

            redirects += 1;
            if redirects >= self.max_redirects {
                return Err(error::redirect(format!(
                    "stopped after {} redirects",
                    self.max_redirects
                )));
            }
            log::debug!("following redirect to {location}");
            url = location;
        };

        self.exchange_code(&oauth, &code)
    }

    /// Contacts the server before any challenge can prompt, so connection and
    /// certificate problems surface first. The status is not inspected.
    fn preflight(&mut self) -> Result<()> {
        let url = Url::parse(self.config.host.trim_end_matches('/')).map_err(error::builder)?;
        let response = self
            .transport
            .round_trip(build_request(Method::HEAD, &url, Bytes::new())?)?;
        log::trace!("HEAD {url}: {}", response.status());
        Ok(())
    }

    fn exchange_code(&mut self, oauth: &OAuthClientConfig, code: &str) -> Result<String> {
        let url = Url::parse(&oauth.token_url).map_err(error::builder)?;
        let body = oauth.code_exchange_form(code)?;

        let mut request = build_request(Method::POST, &url, Bytes::from(body))?;
        request.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));

        log::debug!("exchanging authorization code at {url}");
        let response = self.transport.round_trip(request)?;
        if response.status().is_success() {
            return oauth::parse_token_response(response.body()).map_err(|err| err.with_url(url));
        }
        Err(oauth::parse_error_response(response.body())
            .unwrap_or_else(|| error::status_code(url, response.status())))
    }
}

impl fmt::Debug for RequestTokenOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequestTokenOptions")
            .field("config", &self.config)
            .field("oauth", &self.oauth)
            .field("token_flow", &self.token_flow)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

fn build_request(method: Method, url: &Url, body: Bytes) -> Result<Request<Bytes>> {
    let mut target = url.clone();
    target.set_fragment(None);

    let mut request = Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = target.as_str().parse().map_err(error::builder)?;
    Ok(request)
}

fn redirect_location(base: &Url, response: &Response<Bytes>) -> Result<Url> {
    let location = response
        .headers()
        .get(LOCATION)
        .ok_or_else(|| error::redirect("redirect response without a Location header"))?
        .to_str()
        .map_err(|err| error::decode(err).with_url(base.clone()))?;
    base.join(location)
        .map_err(|err| error::decode(err).with_url(base.clone()))
}

fn unauthorized_message(body: &[u8]) -> String {
    let details = String::from_utf8_lossy(body);
    let details = details.trim();
    if details.is_empty() {
        "Unauthorized".to_string()
    } else {
        format!("Unauthorized: {details}")
    }
}
