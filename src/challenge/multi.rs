// src/challenge/multi.rs

use std::fmt;

use http::header::HeaderMap;

use super::ChallengeHandler;
use crate::error;
use crate::Result;

/// Combines several handlers, earlier ones taking priority.
///
/// The first handler that answers a challenge is selected, and later rounds
/// of the same token request go to it alone, even if the server also offers a
/// scheme another handler could serve. The selection is only reconsidered
/// once the selected handler no longer recognizes the server's challenge.
///
/// A handler that fails before it was selected is skipped for the rest of
/// the request.
pub struct MultiHandler {
    handlers: Vec<Box<dyn ChallengeHandler>>,
    failed: Vec<bool>,
    selected: Option<usize>,
}

impl MultiHandler {
    /// Creates a combinator over `handlers`, in priority order.
    pub fn new(handlers: Vec<Box<dyn ChallengeHandler>>) -> Self {
        let failed = vec![false; handlers.len()];
        MultiHandler {
            handlers,
            failed,
            selected: None,
        }
    }

    /// Keeps the selection only while the selected handler still recognizes
    /// the challenge.
    fn revalidate_selection(&mut self, headers: &HeaderMap) -> Option<usize> {
        let index = self.selected?;
        if self.handlers[index].can_handle(headers) {
            return Some(index);
        }
        log::debug!("selected handler {index} no longer recognizes the challenge");
        self.selected = None;
        None
    }
}

impl ChallengeHandler for MultiHandler {
    fn can_handle(&mut self, headers: &HeaderMap) -> bool {
        // the selection itself is only revised in handle_challenge
        if let Some(index) = self.selected {
            if self.handlers[index].can_handle(headers) {
                return true;
            }
        }
        let failed = &self.failed;
        self.handlers
            .iter_mut()
            .enumerate()
            .any(|(i, handler)| !failed[i] && handler.can_handle(headers))
    }

    fn handle_challenge(
        &mut self,
        request_url: &str,
        headers: &HeaderMap,
    ) -> Result<Option<HeaderMap>> {
        if let Some(index) = self.revalidate_selection(headers) {
            return self.handlers[index].handle_challenge(request_url, headers);
        }

        let mut first_error = None;
        for (i, handler) in self.handlers.iter_mut().enumerate() {
            if self.failed[i] || !handler.can_handle(headers) {
                continue;
            }
            match handler.handle_challenge(request_url, headers) {
                Ok(Some(response)) => {
                    log::debug!("selected handler {i}");
                    self.selected = Some(i);
                    return Ok(Some(response));
                }
                Ok(None) => {
                    log::debug!("handler {i} declined the challenge");
                }
                Err(err) => {
                    log::debug!("handler {i} failed, falling back to the next handler: {err}");
                    self.failed[i] = true;
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    fn complete_challenge(&mut self, request_url: &str, headers: &HeaderMap) -> Result<()> {
        match self.selected {
            Some(index) => self.handlers[index].complete_challenge(request_url, headers),
            None => Ok(()),
        }
    }

    fn release(&mut self) -> Result<()> {
        let errors = self
            .handlers
            .iter_mut()
            .filter_map(|handler| handler.release().err())
            .collect();
        match error::aggregate(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for MultiHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MultiHandler")
            .field("handlers", &self.handlers.len())
            .field("selected", &self.selected)
            .finish()
    }
}
