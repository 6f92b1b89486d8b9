use std::fmt;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How the generator is asked to shape its output, and how the reply is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeMode {
    /// The backend is asked for a JSON object; the reply must decode as one strictly.
    Structured,
    /// Plain chat completion; the reply is searched for an embedded object.
    Freeform,
}

impl DecodeMode {
    pub const ORDER: [DecodeMode; 2] = [DecodeMode::Structured, DecodeMode::Freeform];
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeMode::Structured => f.write_str("structured"),
            DecodeMode::Freeform => f.write_str("freeform"),
        }
    }
}

/// A text generator backend.
///
/// The CLI implements this over an OpenAI-compatible HTTP API; tests use scripted mocks.
/// Calls are synchronous. Failures to reach the backend are reported as
/// [`Error::GeneratorUnavailable`]; malformed text is returned as-is for the decode step.
pub trait Generator: Send + Sync {
    /// Identifier used in logs and errors, usually the model name.
    fn name(&self) -> &str;

    fn generate(&self, system: &str, user: &str, mode: DecodeMode) -> Result<String>;
}

/// Run `attempt` over each `(backend, mode)` pair in order and return the first success.
///
/// When every pair fails the result is [`Error::ExtractionFailed`] carrying the last error.
pub fn first_success<T, F>(
    backends: &[Box<dyn Generator>],
    modes: &[DecodeMode],
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(&dyn Generator, DecodeMode) -> Result<T>,
{
    let mut attempts = 0;
    let mut last = None;
    for backend in backends {
        for &mode in modes {
            attempts += 1;
            debug!(backend = backend.name(), %mode, attempt = attempts, "generator attempt");
            match attempt(backend.as_ref(), mode) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(backend = backend.name(), %mode, error = %e, "generator attempt failed");
                    last = Some(e);
                }
            }
        }
    }
    let last = last.unwrap_or_else(|| Error::GeneratorUnavailable {
        backend: "none".to_string(),
        message: "no generator backends configured".to_string(),
    });
    Err(Error::ExtractionFailed {
        attempts,
        last: Box::new(last),
    })
}
