// src/lib.rs

//! # challenge-login
//!
//! Obtains an OAuth access token for a command-line client by answering the
//! HTTP authentication challenges (`WWW-Authenticate`) the authorization
//! endpoint sends, then reading the token off the final redirect.
//!
//! The flow:
//!
//! 1. `GET <host>/oauth/authorize?response_type=token&client_id=...`, always
//!    with `X-CSRF-Token: 1`.
//! 2. On `401 Unauthorized`, a [`ChallengeHandler`] answers the challenge and
//!    the request is replayed.
//! 3. Redirects are followed (at most 10) until one carries
//!    `#access_token=...`.
//!
//! Basic credentials come from defaults or an interactive prompt. Negotiate
//! (SPNEGO/Kerberos) goes through a [`Negotiator`]; the system GSSAPI binding
//! is behind the `gssapi` feature.
//!
//! ```no_run
//! use challenge_login::{default_challenge_handler, ClientConfig, PromptInput, RequestTokenOptions};
//!
//! # fn run() -> challenge_login::Result<()> {
//! let host = "https://api.example.com:6443";
//! let handler = default_challenge_handler(host, None, None, Some(PromptInput::Terminal), None);
//! let token = RequestTokenOptions::new(ClientConfig::new(host), handler)?.request_token()?;
//! println!("{token}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Optional Features
//!
//! - **gssapi**: Negotiate authentication through the system GSSAPI library.

#![deny(missing_debug_implementations)]

pub use http::header::HeaderMap;
pub use url::Url;

pub use self::challenge::{
    default_challenge_handler, BasicChallengeHandler, ChallengeHandler, MultiHandler,
    NegotiateChallengeHandler, Negotiator, UnsupportedNegotiator,
};
#[cfg(feature = "gssapi")]
pub use self::challenge::GssapiNegotiator;
pub use self::error::{BoxError, Error, Result};
pub use self::oauth::{OAuthClientConfig, PkceChallenge, ServerMetadata};
pub use self::prompt::PromptInput;
pub use self::token::{ClientConfig, RequestTokenOptions, DEFAULT_MAX_REDIRECTS};
pub use self::transport::{ChallengeTransport, ReqwestTransport, Transport, CSRF_TOKEN_HEADER};

pub mod challenge;
mod error;
pub mod oauth;
mod prompt;
mod token;
mod transport;
