// src/challenge/gssapi.rs

//! Concrete [`Negotiator`]s.
//!
//! With the `gssapi` feature, [`GssapiNegotiator`] drives a Kerberos client
//! context through the system GSSAPI library. Without it,
//! [`UnsupportedNegotiator`] refuses to load, so Negotiate challenges fall
//! through to the other handlers.

use super::Negotiator;
use crate::error::BoxError;

/// A negotiator for builds without GSSAPI support. It never loads.
#[derive(Debug, Default)]
pub struct UnsupportedNegotiator;

impl Negotiator for UnsupportedNegotiator {
    fn load(&mut self) -> Result<(), BoxError> {
        Err("GSSAPI support is not enabled".into())
    }

    fn init_sec_context(
        &mut self,
        _request_url: &str,
        _challenge_token: &[u8],
    ) -> Result<Vec<u8>, BoxError> {
        Err("GSSAPI support is not enabled".into())
    }

    fn is_complete(&self) -> bool {
        false
    }

    fn release(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

#[cfg(feature = "gssapi")]
pub use self::krb5::GssapiNegotiator;

#[cfg(feature = "gssapi")]
mod krb5 {
    use std::fmt;

    use cross_krb5::{ClientCtx, InitiateFlags, PendingClientCtx, Step};

    use super::super::Negotiator;
    use crate::error::BoxError;

    enum Context {
        Pending(PendingClientCtx),
        Complete(ClientCtx),
    }

    /// Kerberos/SPNEGO negotiation through the system GSSAPI library.
    ///
    /// The target service principal is derived from the request URL as
    /// `HTTP@<host>`.
    pub struct GssapiNegotiator {
        principal: Option<String>,
        context: Option<Context>,
    }

    impl GssapiNegotiator {
        /// Creates a negotiator acting as `principal`, or as the default
        /// principal of the credential cache when `None`.
        pub fn new(principal: Option<String>) -> Self {
            GssapiNegotiator {
                principal,
                context: None,
            }
        }
    }

    impl Negotiator for GssapiNegotiator {
        fn load(&mut self) -> Result<(), BoxError> {
            // the library is linked, not loaded at runtime
            Ok(())
        }

        fn init_sec_context(
            &mut self,
            request_url: &str,
            challenge_token: &[u8],
        ) -> Result<Vec<u8>, BoxError> {
            match self.context.take() {
                None => {
                    let target = service_name(request_url)?;
                    log::debug!("initializing security context for {target}");
                    let (pending, token) = ClientCtx::new(
                        InitiateFlags::empty(),
                        self.principal.as_deref(),
                        &target,
                        None,
                    )
                    .map_err(|err| format!("InitSecContext failed: {err}"))?;
                    self.context = Some(Context::Pending(pending));
                    Ok(token.to_vec())
                }
                Some(Context::Pending(pending)) => {
                    match pending
                        .step(challenge_token)
                        .map_err(|err| format!("InitSecContext failed: {err}"))?
                    {
                        Step::Continue((pending, token)) => {
                            self.context = Some(Context::Pending(pending));
                            Ok(token.to_vec())
                        }
                        Step::Finished((ctx, token)) => {
                            self.context = Some(Context::Complete(ctx));
                            Ok(token.map(|token| token.to_vec()).unwrap_or_default())
                        }
                    }
                }
                Some(Context::Complete(ctx)) => {
                    self.context = Some(Context::Complete(ctx));
                    Err("InitSecContext failed: security context is already established".into())
                }
            }
        }

        fn is_complete(&self) -> bool {
            matches!(self.context, Some(Context::Complete(_)))
        }

        fn release(&mut self) -> Result<(), BoxError> {
            self.context = None;
            Ok(())
        }
    }

    impl fmt::Debug for GssapiNegotiator {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.debug_struct("GssapiNegotiator")
                .field("principal", &self.principal)
                .field("complete", &self.is_complete())
                .finish()
        }
    }

    fn service_name(request_url: &str) -> Result<String, BoxError> {
        let url = url::Url::parse(request_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| format!("URL has no host for service name: {request_url}"))?;
        Ok(format!("HTTP@{host}"))
    }

}
