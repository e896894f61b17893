//! Colon-separated extauth commands.

use std::str::FromStr;

use thiserror::Error;

pub const SEPARATOR: char = ':';

/// A decoded extauth request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `auth:User:Server:Password`, the password being the JWT.
    Auth {
        user: String,
        server: String,
        token: String,
    },
    /// `isuser:User:Server`
    IsUser { user: String, server: String },
    /// `setpass`, `tryregister`, `removeuser`, `removeuser3`: need a user store.
    Unsupported(&'static str),
    Unknown(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("'{command}' expects {expected} arguments, got {received}")]
    MissingFields {
        command: &'static str,
        expected: usize,
        received: usize,
    },
}

const UNSUPPORTED: [&str; 4] = ["setpass", "tryregister", "removeuser", "removeuser3"];

impl Request {
    /// Decode a raw frame payload.
    pub fn parse(payload: &[u8]) -> Result<Self, RequestError> {
        std::str::from_utf8(payload)
            .map_err(|_| RequestError::InvalidUtf8)?
            .parse()
    }

    /// Command name as a static label.
    pub fn command(&self) -> &'static str {
        match self {
            Request::Auth { .. } => "auth",
            Request::IsUser { .. } => "isuser",
            Request::Unsupported(command) => *command,
            Request::Unknown(_) => "unknown",
        }
    }

    /// `user@server` identity compared against the token.
    pub fn login(&self) -> Option<String> {
        match self {
            Request::Auth { user, server, .. } | Request::IsUser { user, server } => {
                Some(format!("{user}@{server}"))
            }
            _ => None,
        }
    }
}

fn fields<'a>(
    command: &'static str,
    rest: &'a str,
    expected: usize,
) -> Result<Vec<&'a str>, RequestError> {
    let fields: Vec<&str> = rest.splitn(expected, SEPARATOR).collect();
    if rest.is_empty() || fields.len() < expected {
        return Err(RequestError::MissingFields {
            command,
            expected,
            received: if rest.is_empty() { 0 } else { fields.len() },
        });
    }
    Ok(fields)
}

impl FromStr for Request {
    type Err = RequestError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let (command, rest) = payload.split_once(SEPARATOR).unwrap_or((payload, ""));
        match command {
            "auth" => {
                // the token keeps any further separators
                let fields = fields("auth", rest, 3)?;
                Ok(Request::Auth {
                    user: fields[0].to_string(),
                    server: fields[1].to_string(),
                    token: fields[2].to_string(),
                })
            }
            "isuser" => {
                // answered true whatever follows, so missing fields read as empty
                let mut fields = rest.split(SEPARATOR);
                Ok(Request::IsUser {
                    user: fields.next().unwrap_or_default().to_string(),
                    server: fields.next().unwrap_or_default().to_string(),
                })
            }
            other => Ok(UNSUPPORTED
                .iter()
                .copied()
                .find(|known| *known == other)
                .map(Request::Unsupported)
                .unwrap_or_else(|| Request::Unknown(other.to_string()))),
        }
    }
}
