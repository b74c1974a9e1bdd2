// src/challenge/basic.rs

//! HTTP Basic challenges (RFC 7617).

use std::fmt;
use std::io::Write;

use base64::Engine as _;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use super::{challenges, default_output, strip_scheme, ChallengeHandler};
use crate::prompt::PromptInput;
use crate::Result;

/// Answers `WWW-Authenticate: Basic` challenges.
///
/// Credentials come from the configured defaults; any that are missing are
/// prompted for when an input is configured. The handler answers a single
/// challenge: a second Basic challenge means the server rejected the
/// credentials, and replaying them would loop forever. Likewise it prompts
/// at most once.
pub struct BasicChallengeHandler {
    host: String,
    username: String,
    password: String,
    input: Option<PromptInput>,
    output: Option<Box<dyn Write>>,
    handled: bool,
    prompted: bool,
}

impl BasicChallengeHandler {
    /// Creates a handler with no credentials and no prompting.
    ///
    /// `host` is only used in the prompt banner.
    pub fn new(host: impl Into<String>) -> Self {
        BasicChallengeHandler {
            host: host.into(),
            username: String::new(),
            password: String::new(),
            input: None,
            output: None,
            handled: false,
            prompted: false,
        }
    }

    /// Sets the default username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the default password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Enables prompting for missing credentials.
    pub fn input(mut self, input: PromptInput) -> Self {
        self.input = Some(input);
        self
    }

    /// Sets where prompts are written. Defaults to standard output.
    pub fn output<W: Write + 'static>(mut self, output: W) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    /// Fills in missing credentials from the configured input.
    fn prompt(&mut self, realm: &str, username: &mut String, password: &mut String) {
        let Some(input) = self.input.as_mut() else {
            return;
        };
        let output = self.output.get_or_insert_with(default_output);

        let banner = if realm.is_empty() {
            writeln!(output, "Authentication required for {}", self.host)
        } else {
            writeln!(output, "Authentication required for {} ({})", self.host, realm)
        };
        if let Err(err) = banner {
            log::warn!("failed to write authentication prompt: {err}");
        }

        if username.is_empty() {
            *username = input
                .prompt_string(&mut **output, "Username: ")
                .unwrap_or_else(|err| {
                    log::warn!("failed to read username: {err}");
                    String::new()
                });
        } else if let Err(err) = writeln!(output, "Username: {username}") {
            log::warn!("failed to write authentication prompt: {err}");
        }

        if password.is_empty() {
            *password = input
                .prompt_password(&mut **output, "Password: ")
                .unwrap_or_else(|err| {
                    log::warn!("failed to read password: {err}");
                    String::new()
                });
        }

        self.prompted = true;
    }
}

impl ChallengeHandler for BasicChallengeHandler {
    fn can_handle(&mut self, headers: &HeaderMap) -> bool {
        basic_realm(headers).is_some()
    }

    fn handle_challenge(
        &mut self,
        _request_url: &str,
        headers: &HeaderMap,
    ) -> Result<Option<HeaderMap>> {
        if self.prompted {
            log::debug!("already prompted for challenge, won't prompt again");
            return Ok(None);
        }
        if self.handled {
            log::debug!("already handled basic challenge");
            return Ok(None);
        }

        let mut username = self.username.clone();
        let mut password = self.password.clone();

        if username.is_empty() || password.is_empty() {
            let realm = basic_realm(headers).unwrap_or_default();
            self.prompt(&realm, &mut username, &mut password);
        }

        if username.is_empty() && password.is_empty() {
            log::debug!("no username or password available");
            return Ok(None);
        }

        // RFC 7617 section 2: the user-id cannot contain a colon
        if username.contains(':') {
            log::warn!("username {username} is invalid for basic auth");
            return Ok(None);
        }

        let mut response = HeaderMap::new();
        response.insert(AUTHORIZATION, basic_header(&username, &password)?);
        self.handled = true;
        Ok(Some(response))
    }

    fn complete_challenge(&mut self, _request_url: &str, _headers: &HeaderMap) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl fmt::Debug for BasicChallengeHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BasicChallengeHandler")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("input", &self.input)
            .field("handled", &self.handled)
            .field("prompted", &self.prompted)
            .finish()
    }
}

fn basic_header(username: &str, password: &str) -> Result<HeaderValue> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    let mut value =
        HeaderValue::from_str(&format!("Basic {encoded}")).map_err(crate::error::builder)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Returns the realm of the first Basic challenge in `headers`.
fn basic_realm(headers: &HeaderMap) -> Option<String> {
    challenges(headers).find_map(|value| parse_basic_realm(value).map(str::to_owned))
}

/// Parses a single `WWW-Authenticate` value as a Basic challenge.
///
/// Returns `None` when the value is not a Basic challenge, otherwise the
/// realm: the raw text between the quotes of a quoted realm (escapes are
/// left as they are), the text up to the first comma of a token realm, or an
/// empty string when no realm is given.
fn parse_basic_realm(value: &str) -> Option<&str> {
    let params = strip_scheme(value, "basic")?;

    let Some(rest) = strip_param_name(params, "realm") else {
        return Some("");
    };

    if let Some(quoted) = rest.strip_prefix('"') {
        if let Some(end) = closing_quote(quoted) {
            return Some(&quoted[..end]);
        }
    }

    let end = rest.find(',').unwrap_or(rest.len());
    Some(rest[..end].trim_end())
}

/// Strips `name` and the following `=` (with optional whitespace).
fn strip_param_name<'a>(params: &'a str, name: &str) -> Option<&'a str> {
    let head = params.get(..name.len())?;
    if !head.eq_ignore_ascii_case(name) {
        return None;
    }
    let rest = params[name.len()..].trim_start();
    Some(rest.strip_prefix('=')?.trim_start())
}

/// Finds the unescaped `"` closing a quoted-string whose opening quote was
/// already consumed.
fn closing_quote(quoted: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in quoted.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}
