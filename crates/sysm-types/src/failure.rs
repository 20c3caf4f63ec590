use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::status::StatusError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transport,
    Authentication,
    Liveness,
    Protocol,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Authentication => write!(f, "authentication"),
            FailureKind::Liveness => write!(f, "liveness"),
            FailureKind::Protocol => write!(f, "protocol"),
        }
    }
}

/// Why a check or connection against a backend did not succeed.
///
/// `code` carries the errno-style identifier (`ECONNREFUSED`, `ENOTFOUND`, an
/// HTTP status, ...) that backends fold into their status text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendFailure {
    kind: FailureKind,
    code: Option<String>,
    message: String,
    detail: Option<String>,
}

impl BackendFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            detail: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Authentication, message)
    }

    pub fn liveness(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Liveness, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Protocol, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn from_io(err: &io::Error) -> Self {
        let failure = Self::transport(err.to_string()).with_detail(format!("{:?}", err.kind()));
        match io_error_code(err) {
            Some(code) => failure.with_code(code),
            None => failure,
        }
    }

    /// Builds a transport failure from any error, picking up the errno-style
    /// code of the first `io::Error` found in its source chain.
    pub fn from_error_chain(err: &(dyn StdError + 'static)) -> Self {
        let mut current: Option<&(dyn StdError + 'static)> = Some(err);
        while let Some(e) = current {
            if let Some(io_err) = e.downcast_ref::<io::Error>() {
                if let Some(code) = io_error_code(io_err) {
                    return Self::transport(err.to_string()).with_code(code);
                }
            }
            current = e.source();
        }
        Self::transport(err.to_string())
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn is_authentication(&self) -> bool {
        self.kind == FailureKind::Authentication
    }

    pub fn to_status_error(&self) -> StatusError {
        StatusError::from(self)
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} failure ({}): {}", self.kind, code, self.message),
            None => write!(f, "{} failure: {}", self.kind, self.message),
        }
    }
}

pub fn io_error_code(err: &io::Error) -> Option<&'static str> {
    let code = match err.kind() {
        io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
        io::ErrorKind::ConnectionReset => "ECONNRESET",
        io::ErrorKind::ConnectionAborted => "ECONNABORTED",
        io::ErrorKind::NotConnected => "ENOTCONN",
        io::ErrorKind::TimedOut => "ETIMEDOUT",
        io::ErrorKind::BrokenPipe => "EPIPE",
        io::ErrorKind::PermissionDenied => "EACCES",
        io::ErrorKind::NotFound => "ENOENT",
        io::ErrorKind::AddrNotAvailable => "EADDRNOTAVAIL",
        _ => {
            // getaddrinfo failures surface without a dedicated ErrorKind
            if err.to_string().contains("failed to lookup address") {
                "ENOTFOUND"
            } else {
                return None;
            }
        }
    };
    Some(code)
}
