// src/oauth.rs

//! OAuth 2.0 client pieces of the login flow: endpoint configuration, server
//! metadata discovery (RFC 8414), PKCE (RFC 7636), and reading grants off
//! redirect URLs.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::{form_urlencoded, Url};

use crate::error;
use crate::Result;

/// The public client id used by command-line logins.
pub const CLIENT_ID: &str = "openshift-challenging-client";

/// Path of the authorization server metadata document, relative to the host.
pub const METADATA_PATH: &str = "/.well-known/oauth-authorization-server";

/// The only PKCE challenge method this client uses.
pub const PKCE_S256: &str = "S256";

/// Endpoints and client identity for one token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_url: String,
    /// Set when the code grant is protected with PKCE.
    pub pkce: Option<PkceChallenge>,
}

impl OAuthClientConfig {
    /// The well-known endpoints of an OpenShift-style server at `host`.
    pub fn for_host(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        OAuthClientConfig {
            client_id: CLIENT_ID.to_string(),
            authorize_url: format!("{host}/oauth/authorize"),
            token_url: format!("{host}/oauth/token"),
            redirect_url: implicit_redirect_url(host),
            pkce: None,
        }
    }

    /// Builds the configuration from a discovered metadata document.
    ///
    /// PKCE is only used for the code grant, and only when the server lists
    /// `S256` exactly.
    pub fn from_metadata(metadata: &ServerMetadata, code_flow: bool) -> Self {
        let pkce = if code_flow
            && metadata
                .code_challenge_methods_supported
                .iter()
                .any(|method| method == PKCE_S256)
        {
            Some(PkceChallenge::generate())
        } else {
            None
        };

        OAuthClientConfig {
            client_id: CLIENT_ID.to_string(),
            authorize_url: metadata.authorization_endpoint.clone(),
            token_url: metadata.token_endpoint.clone(),
            redirect_url: implicit_redirect_url(&metadata.issuer),
            pkce,
        }
    }

    /// The URL that starts the grant.
    ///
    /// `state` is only sent with the code grant.
    pub fn authorize_request_url(&self, token_flow: bool, state: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.authorize_url).map_err(error::builder)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", if token_flow { "token" } else { "code" })
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_url);
            if !token_flow {
                if let Some(state) = state {
                    query.append_pair("state", state);
                }
                if let Some(ref pkce) = self.pkce {
                    query
                        .append_pair("code_challenge", &pkce.challenge)
                        .append_pair("code_challenge_method", PKCE_S256);
                }
            }
        }
        Ok(url)
    }

    /// The form body exchanging `code` for a token.
    pub(crate) fn code_exchange_form(&self, code: &str) -> Result<String> {
        let request = TokenExchangeRequest {
            grant_type: "authorization_code",
            code,
            redirect_uri: &self.redirect_url,
            client_id: &self.client_id,
            code_verifier: self.pkce.as_ref().map(|pkce| pkce.verifier.as_str()),
        };
        serde_urlencoded::to_string(request).map_err(error::builder)
    }

    /// Returns true if `location` points at the configured redirect URL,
    /// ignoring query and fragment.
    fn is_redirect_target(&self, location: &Url) -> bool {
        let Ok(redirect) = Url::parse(&self.redirect_url) else {
            return false;
        };
        location.scheme() == redirect.scheme()
            && location.host_str() == redirect.host_str()
            && location.port_or_known_default() == redirect.port_or_known_default()
            && location.path() == redirect.path()
    }
}

fn implicit_redirect_url(issuer: &str) -> String {
    format!("{}/oauth/token/implicit", issuer.trim_end_matches('/'))
}

/// Where the metadata document of the server at `host` lives.
pub fn metadata_url(host: &str) -> Result<Url> {
    let url = format!("{}{METADATA_PATH}", host.trim_end_matches('/'));
    Url::parse(&url).map_err(error::builder)
}

/// The parts of the authorization server metadata this client reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

/// PKCE code verifier and challenge pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new S256 challenge pair.
    pub fn generate() -> Self {
        let mut verifier_bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

        PkceChallenge {
            verifier,
            challenge,
        }
    }
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    grant_type: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Reads the access token from a successful token endpoint response.
pub(crate) fn parse_token_response(body: &[u8]) -> Result<String> {
    let response: TokenResponse = serde_json::from_slice(body).map_err(error::decode)?;
    if response.access_token.is_empty() {
        return Err(error::oauth("token response has an empty access_token"));
    }
    Ok(response.access_token)
}

/// Reads an OAuth error out of a failed token endpoint response, if the body
/// is one.
pub(crate) fn parse_error_response(body: &[u8]) -> Option<crate::Error> {
    let response: ErrorResponse = serde_json::from_slice(body).ok()?;
    Some(oauth_error(&response.error, response.error_description.as_deref()))
}

fn oauth_error(code: &str, description: Option<&str>) -> crate::Error {
    match description {
        Some(description) if !description.is_empty() => {
            error::oauth(format!("{code}: {description}"))
        }
        _ => error::oauth(code.to_string()),
    }
}

/// What a redirect carried back from the authorization server.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Grant {
    Token(String),
    Code { code: String, state: Option<String> },
}

/// Looks for a grant, or an OAuth error, on a redirect target.
///
/// The implicit grant arrives in the fragment. The code grant arrives in the
/// query of a redirect to the configured redirect URL. `Ok(None)` means the
/// redirect is an ordinary one to follow.
pub(crate) fn inspect_redirect(
    location: &Url,
    config: &OAuthClientConfig,
    token_flow: bool,
) -> Result<Option<Grant>> {
    if let Some(fragment) = location.fragment() {
        let params = Params::parse(fragment);
        params.check_error()?;
        if token_flow {
            if let Some(token) = params.get("access_token").filter(|token| !token.is_empty()) {
                return Ok(Some(Grant::Token(token)));
            }
        }
    }

    if !token_flow && config.is_redirect_target(location) {
        let params = Params::parse(location.query().unwrap_or_default());
        params.check_error()?;
        if let Some(code) = params.get("code").filter(|code| !code.is_empty()) {
            return Ok(Some(Grant::Code {
                code,
                state: params.get("state"),
            }));
        }
    }

    Ok(None)
}

struct Params(Vec<(String, String)>);

impl Params {
    fn parse(input: &str) -> Self {
        Params(form_urlencoded::parse(input.as_bytes()).into_owned().collect())
    }

    fn get(&self, name: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn check_error(&self) -> Result<()> {
        match self.get("error") {
            Some(code) if !code.is_empty() => Err(oauth_error(
                &code,
                self.get("error_description").as_deref(),
            )),
            _ => Ok(()),
        }
    }
}
