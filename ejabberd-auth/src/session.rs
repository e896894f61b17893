//! Sequential request/response loop over the host's byte streams.

use std::io::{Read, Write};

use common_auth::{decision, JwtVerifier};
use common_observability::AuthMetrics;
use tracing::{debug, error, warn};

use crate::protocol::{read_frame, write_decision, FramingError, Request};

/// Maps decoded requests to accept/reject answers.
#[derive(Clone)]
pub struct Dispatcher {
    verifier: JwtVerifier,
    metrics: AuthMetrics,
}

impl Dispatcher {
    pub fn new(verifier: JwtVerifier, metrics: AuthMetrics) -> Self {
        Self { verifier, metrics }
    }

    pub fn metrics(&self) -> &AuthMetrics {
        &self.metrics
    }

    /// Answer for one raw frame payload. Never fails.
    pub fn answer(&self, payload: &[u8]) -> bool {
        match Request::parse(payload) {
            Ok(request) => {
                let accepted = self.handle(&request);
                self.metrics.request(request.command(), accepted);
                accepted
            }
            Err(err) => {
                warn!("rejecting unparsable request: {err}");
                self.metrics.request("malformed", false);
                false
            }
        }
    }

    pub fn handle(&self, request: &Request) -> bool {
        match request {
            Request::Auth { token, .. } => {
                let login = request.login().unwrap_or_default();
                let outcome = self.verifier.check(&login, token);
                if let Err(err) = &outcome {
                    self.metrics.rejection(err.reason());
                }
                decision(&login, &outcome)
            }
            // No user directory here, so existence cannot be disproved.
            Request::IsUser { user, server } => {
                debug!(
                    user = user.as_str(),
                    server = server.as_str(),
                    "isuser always answers true"
                );
                true
            }
            Request::Unsupported(command) => {
                warn!(command, "command needs a user store, answering false");
                false
            }
            Request::Unknown(command) => {
                warn!(command = command.as_str(), "unknown command, answering false");
                false
            }
        }
    }
}

/// Owns the input and output streams for the lifetime of the process.
pub struct Session<R, W> {
    reader: R,
    writer: W,
    dispatcher: Dispatcher,
    served: u64,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(reader: R, writer: W, dispatcher: Dispatcher) -> Self {
        Self {
            reader,
            writer,
            dispatcher,
            served: 0,
        }
    }

    pub fn served(&self) -> u64 {
        self.served
    }

    /// Handle one frame. `Ok(false)` means the stream ended cleanly while idle.
    pub fn step(&mut self) -> Result<bool, FramingError> {
        let payload = match read_frame(&mut self.reader)? {
            Some(payload) => payload,
            None => return Ok(false),
        };

        let accepted = self.dispatcher.answer(&payload);
        write_decision(&mut self.writer, accepted)?;
        self.served += 1;
        Ok(true)
    }

    /// Serve frames until end of stream. Returns the number of answered requests.
    pub fn run(mut self) -> Result<u64, FramingError> {
        loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => {
                    debug!(served = self.served, "input stream closed");
                    return Ok(self.served);
                }
                Err(err) => {
                    error!(served = self.served, "framing error, stopping: {err}");
                    return Err(err);
                }
            }
        }
    }
}
