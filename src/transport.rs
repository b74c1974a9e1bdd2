// src/transport.rs

//! Sending requests, and answering authentication challenges on the way.
//!
//! [`Transport`] is the seam between the token flow and the network. The
//! default implementation, [`ReqwestTransport`], never follows redirects so
//! that the flow can inspect each `Location` itself. [`ChallengeTransport`]
//! wraps any transport and replays requests that were answered with a
//! `401 Unauthorized` challenge.

use std::fmt;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, WWW_AUTHENTICATE};
use http::{Method, Request, Response, StatusCode, Uri};
use url::Url;

use crate::challenge::ChallengeHandler;
use crate::error;
use crate::token::ClientConfig;
use crate::Result;

/// Header telling the server the request does not come from a browser, so it
/// may answer with a Basic challenge.
pub const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";

/// Sends one HTTP request and returns its response, without following
/// redirects.
pub trait Transport {
    /// Sends `request` and reads the whole response body.
    fn round_trip(&mut self, request: Request<Bytes>) -> Result<Response<Bytes>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn round_trip(&mut self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        (**self).round_trip(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn round_trip(&mut self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        (**self).round_trip(request)
    }
}

/// A blocking [`Transport`] built on reqwest.
///
/// Requests run to completion on a private current-thread runtime, so this
/// must not be used from within another async runtime.
pub struct ReqwestTransport {
    runtime: tokio::runtime::Runtime,
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport for the server described by `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(error::builder)?;

        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(error::builder)?;

        Ok(ReqwestTransport { runtime, client })
    }
}

impl Transport for ReqwestTransport {
    fn round_trip(&mut self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let (parts, body) = request.into_parts();
        let url = Url::parse(&parts.uri.to_string()).map_err(error::builder)?;

        let client = &self.client;
        self.runtime.block_on(async {
            let response = client
                .request(parts.method, url.clone())
                .headers(parts.headers)
                .body(body)
                .send()
                .await
                .map_err(|err| error::request(err).with_url(url.clone()))?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|err| error::decode(err).with_url(url.clone()))?;

            let mut response = Response::new(body);
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            Ok(response)
        })
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish()
    }
}

/// A transport that answers `401 Unauthorized` challenges.
///
/// Every request carries the [`CSRF_TOKEN_HEADER`]. When a response is a 401
/// with `WWW-Authenticate` headers, the handler is asked for an answer and the
/// request is sent again with the answer's headers merged in. The handler's
/// own state (one Basic attempt, one prompt) is what ends a run of repeated
/// challenges.
///
/// A 401 without any challenge is returned as is.
pub struct ChallengeTransport<T, H> {
    inner: T,
    handler: H,
    handled_challenge: bool,
}

impl<T: Transport, H: ChallengeHandler> ChallengeTransport<T, H> {
    /// Wraps `inner`, answering challenges with `handler`.
    pub fn new(inner: T, handler: H) -> Self {
        ChallengeTransport {
            inner,
            handler,
            handled_challenge: false,
        }
    }

    /// Returns the wrapped transport and handler.
    pub fn into_parts(self) -> (T, H) {
        (self.inner, self.handler)
    }

    fn answer(&mut self, request_url: &str, headers: &HeaderMap) -> Result<HeaderMap> {
        if !self.handler.can_handle(headers) {
            return Err(error::unauthorized("unhandled challenge"));
        }
        match self.handler.handle_challenge(request_url, headers)? {
            Some(answer) => Ok(answer),
            None => Err(error::unauthorized(
                "challenger chose not to retry the request",
            )),
        }
    }
}

impl<T: Transport, H: ChallengeHandler> Transport for ChallengeTransport<T, H> {
    fn round_trip(&mut self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let (parts, body) = request.into_parts();
        let method = parts.method;
        let uri = parts.uri;
        let mut headers = parts.headers;
        headers.insert(
            HeaderName::from_static("x-csrf-token"),
            HeaderValue::from_static("1"),
        );
        let request_url = uri.to_string();

        loop {
            log::trace!("{method} {uri}");
            let response = self
                .inner
                .round_trip(build_request(&method, &uri, &headers, &body))?;

            if response.status() != StatusCode::UNAUTHORIZED {
                if self.handled_challenge {
                    self.handled_challenge = false;
                    self.handler
                        .complete_challenge(&request_url, response.headers())?;
                }
                return Ok(response);
            }

            if !response.headers().contains_key(WWW_AUTHENTICATE) {
                return Ok(response);
            }

            let answer = self.answer(&request_url, response.headers())?;
            self.handled_challenge = true;
            headers.extend(answer);
        }
    }
}

impl<T, H> fmt::Debug for ChallengeTransport<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChallengeTransport")
            .field("handled_challenge", &self.handled_challenge)
            .finish()
    }
}

fn build_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> Request<Bytes> {
    let mut request = Request::new(body.clone());
    *request.method_mut() = method.clone();
    *request.uri_mut() = uri.clone();
    *request.headers_mut() = headers.clone();
    request
}
