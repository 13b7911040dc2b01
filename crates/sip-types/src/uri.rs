//! SIP and tel URIs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building a [`Uri`] from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("URI is empty")]
    Empty,

    #[error("URI has no scheme separator ':': {input}")]
    MissingScheme { input: String },

    #[error("URI has an empty host part: {input}")]
    EmptyHost { input: String },

    #[error("URI has an invalid port: {input}")]
    InvalidPort { input: String },

    #[error("URI has an unclosed '[' in its host part: {input}")]
    UnclosedBracket { input: String },
}

/// URI scheme. The proxy only forwards to sip, sips and tel targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Sip,
    Sips,
    Tel,
    Other(String),
}

impl Scheme {
    /// Whether a proxy branch may be created toward a URI of this scheme.
    pub fn is_supported(&self) -> bool {
        matches!(self, Scheme::Sip | Scheme::Sips | Scheme::Tel)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
            Scheme::Tel => "tel",
            Scheme::Other(s) => s,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed URI value.
///
/// For sip/sips URIs `host` is the host part and `user` the optional user
/// part; for tel URIs the subscriber number lives in `host` and `user` is
/// empty. Parameters keep their textual form; flag parameters (such as `lr`)
/// carry no value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uri {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub params: Vec<(String, Option<String>)>,
}

impl Uri {
    pub fn sip(host: impl Into<String>) -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: None,
            host: host.into(),
            port: None,
            params: Vec::new(),
        }
    }

    pub fn sip_user(user: impl Into<String>, host: impl Into<String>) -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: Some(user.into()),
            host: host.into(),
            port: None,
            params: Vec::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.set_param(name, value.map(|v| v.to_string()));
        self
    }

    /// Value of a parameter; `Some(None)` for flag parameters.
    pub fn param(&self, name: &str) -> Option<Option<&str>> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        if let Some(slot) = self
            .params
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            slot.1 = value;
        } else {
            self.params.push((name, value));
        }
    }

    pub fn remove_param(&mut self, name: &str) {
        self.params.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// The `transport` parameter, when present.
    pub fn transport(&self) -> Option<&str> {
        self.param("transport").flatten()
    }

    /// Host and optional port rendered as `host[:port]`.
    pub fn host_port(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        for (name, value) in &self.params {
            match value {
                Some(v) => write!(f, ";{}={}", name, v)?,
                None => write!(f, ";{}", name)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = UriError;

    /// Splits `scheme:[user@]host[:port][;param[=value]]*`. This is a
    /// construction convenience for values that are already known to be
    /// well-formed, not a grammar-complete parser.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(UriError::Empty);
        }
        let (scheme_text, rest) = s.split_once(':').ok_or_else(|| UriError::MissingScheme {
            input: s.to_string(),
        })?;
        let scheme = match scheme_text.to_ascii_lowercase().as_str() {
            "sip" => Scheme::Sip,
            "sips" => Scheme::Sips,
            "tel" => Scheme::Tel,
            other => Scheme::Other(other.to_string()),
        };

        let (addr, param_text) = match rest.split_once(';') {
            Some((addr, params)) => (addr, Some(params)),
            None => (rest, None),
        };

        let (user, host_port) = match addr.split_once('@') {
            Some((user, host_port)) => (Some(user.to_string()), host_port),
            None => (None, addr),
        };

        // IPv6 literals keep their brackets; the port separator only counts
        // after the closing bracket
        let (host, port) = if let Some(inner) = host_port.strip_prefix('[') {
            let (addr, tail) = inner.split_once(']').ok_or_else(|| UriError::UnclosedBracket {
                input: s.to_string(),
            })?;
            if addr.is_empty() {
                return Err(UriError::EmptyHost {
                    input: s.to_string(),
                });
            }
            let port = match tail.strip_prefix(':') {
                Some(port_text) => {
                    Some(port_text.parse::<u16>().map_err(|_| UriError::InvalidPort {
                        input: s.to_string(),
                    })?)
                }
                None if tail.is_empty() => None,
                None => {
                    return Err(UriError::InvalidPort {
                        input: s.to_string(),
                    });
                }
            };
            (format!("[{}]", addr), port)
        } else {
            match host_port.rsplit_once(':') {
                Some((host, port_text)) => {
                    let port = port_text.parse::<u16>().map_err(|_| UriError::InvalidPort {
                        input: s.to_string(),
                    })?;
                    (host.to_string(), Some(port))
                }
                None => (host_port.to_string(), None),
            }
        };
        if host.is_empty() {
            return Err(UriError::EmptyHost {
                input: s.to_string(),
            });
        }

        let mut params = Vec::new();
        if let Some(param_text) = param_text {
            for piece in param_text.split(';').filter(|p| !p.is_empty()) {
                match piece.split_once('=') {
                    Some((name, value)) => params.push((name.to_string(), Some(value.to_string()))),
                    None => params.push((piece.to_string(), None)),
                }
            }
        }

        Ok(Uri {
            scheme,
            user,
            host,
            port,
            params,
        })
    }
}
