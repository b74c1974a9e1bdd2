// src/challenge/negotiate.rs

//! HTTP Negotiate challenges (RFC 4559).
//!
//! The SPNEGO handshake itself happens behind the [`Negotiator`] port; this
//! module only moves tokens between `WWW-Authenticate` and `Authorization`
//! headers and tracks whether the security library could be loaded.

use std::fmt;

use base64::Engine as _;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use super::{challenges, strip_scheme, ChallengeHandler};
use crate::error::{self, BoxError};
use crate::Result;

/// A security context for one SPNEGO/Kerberos exchange.
///
/// Implementations wrap a native security library. Each instance is owned by
/// exactly one [`NegotiateChallengeHandler`] for one token request.
pub trait Negotiator {
    /// Loads the security library. Called at most once, before any other
    /// method.
    fn load(&mut self) -> std::result::Result<(), BoxError>;

    /// Initializes (first round) or continues the security context.
    ///
    /// `challenge_token` is the decoded token the server sent with its
    /// challenge, empty on the first round. Returns the token to send back.
    fn init_sec_context(
        &mut self,
        request_url: &str,
        challenge_token: &[u8],
    ) -> std::result::Result<Vec<u8>, BoxError>;

    /// Returns true once the context is fully established.
    fn is_complete(&self) -> bool;

    /// Releases the security context.
    fn release(&mut self) -> std::result::Result<(), BoxError>;
}

/// Answers `WWW-Authenticate: Negotiate` challenges through a [`Negotiator`].
pub struct NegotiateChallengeHandler {
    negotiator: Box<dyn Negotiator>,
    load: Load,
}

enum Load {
    Pending,
    Loaded,
    Failed(String),
}

impl NegotiateChallengeHandler {
    /// Creates a handler driving `negotiator`.
    pub fn new(negotiator: Box<dyn Negotiator>) -> Self {
        NegotiateChallengeHandler {
            negotiator,
            load: Load::Pending,
        }
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if let Load::Pending = self.load {
            self.load = match self.negotiator.load() {
                Ok(()) => Load::Loaded,
                Err(err) => {
                    log::debug!("failed to load negotiator: {err}");
                    Load::Failed(err.to_string())
                }
            };
        }

        match self.load {
            Load::Failed(ref message) => Err(error::negotiate(message.clone())),
            _ => Ok(()),
        }
    }
}

impl ChallengeHandler for NegotiateChallengeHandler {
    fn can_handle(&mut self, headers: &HeaderMap) -> bool {
        // the token is decoded in handle_challenge, so a malformed one fails there
        if !challenges(headers).any(|value| strip_scheme(value, "negotiate").is_some()) {
            return false;
        }
        // a library that cannot load leaves the challenge to other handlers
        self.ensure_loaded().is_ok()
    }

    fn handle_challenge(
        &mut self,
        request_url: &str,
        headers: &HeaderMap,
    ) -> Result<Option<HeaderMap>> {
        self.ensure_loaded()?;

        let incoming = negotiate_token(headers)?.unwrap_or_default();

        let outgoing = self
            .negotiator
            .init_sec_context(request_url, &incoming)
            .map_err(|err| {
                log::debug!("InitSecContext returned error: {err}");
                error::negotiate(err)
            })?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(outgoing);
        let mut value =
            HeaderValue::from_str(&format!("Negotiate {encoded}")).map_err(error::builder)?;
        value.set_sensitive(true);

        let mut response = HeaderMap::new();
        response.insert(AUTHORIZATION, value);
        Ok(Some(response))
    }

    fn complete_challenge(&mut self, request_url: &str, headers: &HeaderMap) -> Result<()> {
        if self.negotiator.is_complete() {
            return Ok(());
        }
        log::debug!("continue needed");

        let incoming = match negotiate_token(headers)? {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(error::negotiate(
                    "client requires final negotiate token, none provided",
                ))
            }
        };

        self.negotiator
            .init_sec_context(request_url, &incoming)
            .map_err(|err| {
                log::debug!("InitSecContext returned error: {err}");
                error::negotiate(err)
            })?;

        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.negotiator.release().map_err(error::negotiate)
    }
}

impl fmt::Debug for NegotiateChallengeHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let load = match self.load {
            Load::Pending => "pending",
            Load::Loaded => "loaded",
            Load::Failed(_) => "failed",
        };
        f.debug_struct("NegotiateChallengeHandler")
            .field("load", &load)
            .field("complete", &self.negotiator.is_complete())
            .finish()
    }
}

/// Finds the first Negotiate challenge in `headers`.
///
/// `Ok(None)` when there is none, `Ok(Some(token))` with the decoded token
/// otherwise (empty for a bare `Negotiate`). A token that is not base64 is an
/// error.
fn negotiate_token(headers: &HeaderMap) -> Result<Option<Vec<u8>>> {
    let Some(token) = challenges(headers).find_map(|value| strip_scheme(value, "negotiate")) else {
        return Ok(None);
    };

    let token = token.trim_end();
    if token.is_empty() {
        return Ok(Some(Vec::new()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(token)
        .map(Some)
        .map_err(error::negotiate)
}
