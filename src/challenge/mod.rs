// src/challenge/mod.rs

//! Answering HTTP authentication challenges (RFC 7235).
//!
//! A [`ChallengeHandler`] looks at the `WWW-Authenticate` headers of a
//! `401 Unauthorized` response and, if it recognizes one of the offered
//! schemes, produces the headers to replay the request with.
//!
//! - [`BasicChallengeHandler`] answers `Basic`, once.
//! - [`NegotiateChallengeHandler`] drives a SPNEGO/Kerberos exchange through a
//!   [`Negotiator`].
//! - [`MultiHandler`] tries several handlers in priority order and sticks to
//!   the first one that takes a challenge.

use std::io::Write;

use http::header::{HeaderMap, WWW_AUTHENTICATE};

use crate::prompt::PromptInput;
use crate::Result;

mod basic;
mod gssapi;
mod multi;
mod negotiate;

pub use self::basic::BasicChallengeHandler;
#[cfg(feature = "gssapi")]
pub use self::gssapi::GssapiNegotiator;
pub use self::gssapi::UnsupportedNegotiator;
pub use self::multi::MultiHandler;
pub use self::negotiate::{NegotiateChallengeHandler, Negotiator};

/// A strategy for answering one family of authentication challenges.
///
/// Handlers are stateful and belong to exactly one token request: they
/// remember what they already sent so that a rejected answer is not replayed
/// forever.
pub trait ChallengeHandler {
    /// Returns true if this handler recognizes any of the challenges in
    /// `headers`.
    fn can_handle(&mut self, headers: &HeaderMap) -> bool;

    /// Answers the challenge in `headers`.
    ///
    /// `Ok(Some(headers))` are the headers to replay the request with.
    /// `Ok(None)` means the handler recognized the challenge but declines to
    /// answer it (no credentials, or its one attempt was already used).
    fn handle_challenge(&mut self, request_url: &str, headers: &HeaderMap)
        -> Result<Option<HeaderMap>>;

    /// Inspects the first non-401 response after a challenge was answered.
    ///
    /// Schemes with mutual authentication verify the server's final token
    /// here.
    fn complete_challenge(&mut self, request_url: &str, headers: &HeaderMap) -> Result<()>;

    /// Releases any resources held by the handler. Called once, when the
    /// token request finishes.
    fn release(&mut self) -> Result<()>;
}

macro_rules! forward_handler {
    ($ty:ty) => {
        impl<H: ChallengeHandler + ?Sized> ChallengeHandler for $ty {
            fn can_handle(&mut self, headers: &HeaderMap) -> bool {
                (**self).can_handle(headers)
            }

            fn handle_challenge(
                &mut self,
                request_url: &str,
                headers: &HeaderMap,
            ) -> Result<Option<HeaderMap>> {
                (**self).handle_challenge(request_url, headers)
            }

            fn complete_challenge(&mut self, request_url: &str, headers: &HeaderMap) -> Result<()> {
                (**self).complete_challenge(request_url, headers)
            }

            fn release(&mut self) -> Result<()> {
                (**self).release()
            }
        }
    };
}

forward_handler!(Box<H>);
forward_handler!(&mut H);

/// Iterates the `WWW-Authenticate` values that are valid strings.
pub(crate) fn challenges(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
}

/// Splits a leading auth-scheme token off `value`.
///
/// Returns the remainder when `value` starts (after whitespace) with
/// `scheme`, compared case-insensitively, followed by whitespace or the end
/// of the value.
pub(crate) fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let value = value.trim_start();
    let head = value.get(..scheme.len())?;
    if !head.eq_ignore_ascii_case(scheme) {
        return None;
    }
    let rest = &value[scheme.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest.trim_start()),
        Some(_) => None,
    }
}

/// Builds the handler a command-line client normally uses: Negotiate first,
/// falling back to Basic.
///
/// `host` is only shown in prompts. Without `input`, the Basic handler never
/// prompts and relies on `username`/`password` alone. `principal` names the
/// Kerberos client principal; `None` uses the default credential cache.
pub fn default_challenge_handler(
    host: &str,
    username: Option<String>,
    password: Option<String>,
    input: Option<PromptInput>,
    principal: Option<String>,
) -> MultiHandler {
    let mut basic = BasicChallengeHandler::new(host);
    if let Some(username) = username {
        basic = basic.username(username);
    }
    if let Some(password) = password {
        basic = basic.password(password);
    }
    if let Some(input) = input {
        basic = basic.input(input);
    }

    let handlers: Vec<Box<dyn ChallengeHandler>> = vec![
        Box::new(NegotiateChallengeHandler::new(default_negotiator(principal))),
        Box::new(basic),
    ];
    MultiHandler::new(handlers)
}

#[cfg(feature = "gssapi")]
fn default_negotiator(principal: Option<String>) -> Box<dyn Negotiator> {
    Box::new(GssapiNegotiator::new(principal))
}

#[cfg(not(feature = "gssapi"))]
fn default_negotiator(principal: Option<String>) -> Box<dyn Negotiator> {
    if let Some(principal) = principal {
        log::debug!("ignoring principal {principal}, GSSAPI support is not enabled");
    }
    Box::new(UnsupportedNegotiator)
}

/// Where interactive prompts are written when no output is configured.
pub(crate) fn default_output() -> Box<dyn Write> {
    Box::new(std::io::stdout())
}
