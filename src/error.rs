// src/error.rs

use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use url::Url;

/// A `Result` alias where the `Err` case is `challenge_login::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type accepted from pluggable components such as a
/// [`Negotiator`](crate::Negotiator).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The errors that may occur while acquiring a token.
///
/// Errors that carry a protocol message (an unhandled challenge, a failed
/// negotiation, a redirect loop, an OAuth error) display that message
/// verbatim.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
    url: Option<Url>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    Builder,
    Request,
    Decode,
    Status(StatusCode),
    Unauthorized,
    Negotiate,
    Redirect,
    OAuth,
    Release,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
                url: None,
            }),
        }
    }

    /// Returns the URL the error is related to, if any.
    pub fn url(&self) -> Option<&Url> {
        self.inner.url.as_ref()
    }

    /// Add a url related to this error (overwriting any existing).
    pub fn with_url(mut self, url: Url) -> Self {
        self.inner.url = Some(url);
        self
    }

    /// Returns true if the error is from a type Builder.
    pub fn is_builder(&self) -> bool {
        matches!(self.inner.kind, Kind::Builder)
    }

    /// Returns true if the error is related to sending a request.
    pub fn is_request(&self) -> bool {
        matches!(self.inner.kind, Kind::Request)
    }

    /// Returns true if the error is related to decoding a response body.
    pub fn is_decode(&self) -> bool {
        matches!(self.inner.kind, Kind::Decode)
    }

    /// Returns true if the server answered with an unexpected status.
    pub fn is_status(&self) -> bool {
        matches!(self.inner.kind, Kind::Status(_))
    }

    /// Returns true if the server refused the request and no handler could
    /// (or would) answer its challenge.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.inner.kind, Kind::Unauthorized)
    }

    /// Returns true if the error came from a Negotiate exchange.
    pub fn is_negotiate(&self) -> bool {
        matches!(self.inner.kind, Kind::Negotiate)
    }

    /// Returns true if the redirect limit was exceeded.
    pub fn is_redirect(&self) -> bool {
        matches!(self.inner.kind, Kind::Redirect)
    }

    /// Returns true if the authorization server reported an OAuth error.
    pub fn is_oauth(&self) -> bool {
        matches!(self.inner.kind, Kind::OAuth)
    }

    /// Returns true if releasing handler resources failed.
    pub fn is_release(&self) -> bool {
        matches!(self.inner.kind, Kind::Release)
    }

    /// Returns the status code, if the error was generated from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self.inner.kind {
            Kind::Status(code) => Some(code),
            _ => None,
        }
    }

    fn carries_message(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::Unauthorized | Kind::Negotiate | Kind::Redirect | Kind::OAuth | Kind::Release
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("challenge_login::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref url) = self.inner.url {
            builder.field("url", &url.as_str());
        }
        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.carries_message() {
            return match self.inner.source {
                Some(ref source) => write!(f, "{source}"),
                None => f.write_str(match self.inner.kind {
                    Kind::Unauthorized => "Unauthorized",
                    Kind::Negotiate => "negotiate error",
                    Kind::Redirect => "redirect error",
                    Kind::OAuth => "oauth error",
                    _ => "release error",
                }),
            };
        }

        match self.inner.kind {
            Kind::Builder => f.write_str("builder error")?,
            Kind::Request => f.write_str("error sending request")?,
            Kind::Decode => f.write_str("error decoding response body")?,
            Kind::Status(ref code) => {
                let prefix = if code.is_client_error() {
                    "HTTP status client error"
                } else if code.is_server_error() {
                    "HTTP status server error"
                } else {
                    "unexpected HTTP status"
                };
                write!(f, "{prefix} ({code})")?;
            }
            _ => unreachable!("message kinds are handled above"),
        }

        if let Some(url) = &self.inner.url {
            write!(f, " for url ({url})")?;
        }

        if let Some(source) = &self.inner.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let source = self.inner.source.as_ref()?;
        if self.carries_message() {
            // the message is already the Display text; skip to its cause
            source.source()
        } else {
            Some(&**source as _)
        }
    }
}

/// Several errors collected while releasing handlers.
#[derive(Debug)]
pub(crate) struct Aggregate(Vec<Error>);

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let [only] = self.0.as_slice() {
            return write!(f, "{only}");
        }
        f.write_str("[")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        f.write_str("]")
    }
}

impl StdError for Aggregate {}

// constructors

pub(crate) fn builder<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Builder, Some(e))
}

pub(crate) fn request<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Request, Some(e))
}

pub(crate) fn decode<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Decode, Some(e))
}

pub(crate) fn status_code(url: Url, status: StatusCode) -> Error {
    Error::new(Kind::Status(status), None::<Error>).with_url(url)
}

pub(crate) fn unauthorized<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Unauthorized, Some(e))
}

pub(crate) fn negotiate<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Negotiate, Some(e))
}

pub(crate) fn redirect<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Redirect, Some(e))
}

pub(crate) fn oauth<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::OAuth, Some(e))
}

/// Folds release failures into one error; `None` when nothing failed.
pub(crate) fn aggregate(errors: Vec<Error>) -> Option<Error> {
    if errors.is_empty() {
        return None;
    }
    Some(Error::new(Kind::Release, Some(Aggregate(errors))))
}
