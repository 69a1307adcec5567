use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    UnsupportedRegion(String),
    AccessTokenNotSet,
    RefreshTokenNotSet,
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    Rejected {
        request_id: String,
        result: String,
    },
    PollTimeout {
        request_id: String,
        attempts: u32,
    },
    Protocol(String),
    InvalidValue(String),
    Io(std::io::Error),
}

impl Error {
    /// True when the vendor refused the bearer or refresh token, meaning the
    /// caller should fall back to a full sign-in.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::Api {
                status,
                code,
                message,
            } => {
                if *status == 401 {
                    return true;
                }
                let mentions_token = |s: &str| {
                    let s = s.to_ascii_lowercase();
                    (s.contains("token") && (s.contains("invalid") || s.contains("expired")))
                        || s.contains("invalid_grant")
                };
                code.as_deref().is_some_and(mentions_token) || mentions_token(message.as_str())
            }
            Error::AccessTokenNotSet | Error::RefreshTokenNotSet => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::UnsupportedRegion(region) => write!(f, "unsupported region: {region}"),
            Error::AccessTokenNotSet => write!(f, "access token not set"),
            Error::RefreshTokenNotSet => write!(f, "refresh token not set"),
            Error::Api {
                status,
                code: Some(code),
                message,
            } => write!(f, "API error {status} ({code}): {message}"),
            Error::Api {
                status, message, ..
            } => write!(f, "API error {status}: {message}"),
            Error::Rejected { request_id, result } => {
                write!(f, "request {request_id} rejected: {result}")
            }
            Error::PollTimeout {
                request_id,
                attempts,
            } => write!(
                f,
                "request {request_id} not complete after {attempts} poll attempts"
            ),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
