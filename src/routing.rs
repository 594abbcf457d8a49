//! Host-aware mapping between schema paths and absolute schema URLs.
//!
//! A single [`RoutingRule`] (`{endpoint}/<path>` on one host) is used both to
//! build outbound URLs and to recognize inbound ones, so that
//! `url_to_path(path_to_url(p)) == Some(p)` for every accepted path.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RoutingError;

/// Punctuation allowed in schema paths besides ASCII alphanumerics.
///
/// These never need percent-encoding in a URL path, which keeps the mapping
/// exactly invertible.
const PATH_PUNCTUATION: &str = "-._~!$&'()*+,;=:@";

/// Path characters the HTTP router reads as parameter syntax.
const ENDPOINT_RESERVED: &str = "*:";

/// URL scheme used when building schema URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlScheme {
    Http,
    #[default]
    Https,
}

impl UrlScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlScheme::Http => "http",
            UrlScheme::Https => "https",
        }
    }
}

impl fmt::Display for UrlScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(UrlScheme::Http),
            "https" => Ok(UrlScheme::Https),
            other => Err(format!("unknown URL scheme \"{}\": expected http or https", other)),
        }
    }
}

/// Endpoint prefix and host under which schemas are addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    endpoint: String,
    host: String,
}

impl RoutingRule {
    /// Create a rule for `{endpoint}/<path>` on `host`.
    ///
    /// Trailing slashes are trimmed from the endpoint. An empty endpoint
    /// serves schemas from the host root.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::InvalidRule` if the endpoint is not absolute or
    /// contains characters that would need encoding, or the host is empty.
    pub fn new(endpoint: &str, host: &str) -> Result<Self, RoutingError> {
        let endpoint = endpoint.trim_end_matches('/');
        if !endpoint.is_empty() {
            let Some(segments) = endpoint.strip_prefix('/') else {
                return Err(RoutingError::InvalidRule {
                    message: format!("endpoint must start with '/': {}", endpoint),
                });
            };
            validate_path(segments).map_err(|e| RoutingError::InvalidRule {
                message: format!("endpoint {}: {}", endpoint, e),
            })?;
            if let Some(ch) = endpoint.chars().find(|c| ENDPOINT_RESERVED.contains(*c)) {
                return Err(RoutingError::InvalidRule {
                    message: format!(
                        "character {:?} is not allowed in endpoint {}",
                        ch, endpoint
                    ),
                });
            }
        }

        let host = host.trim();
        if host.is_empty() {
            return Err(RoutingError::InvalidRule {
                message: "host is empty".to_string(),
            });
        }

        Ok(Self {
            endpoint: endpoint.to_string(),
            host: host.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Bidirectional path/URL mapper built on a single [`RoutingRule`].
#[derive(Debug, Clone)]
pub struct PathUrlMapper {
    rule: RoutingRule,
    scheme: UrlScheme,
    /// `{scheme}://{host}{endpoint}/`, normalized by the URL parser.
    base: Url,
    prefix: Vec<String>,
}

impl PathUrlMapper {
    /// # Errors
    ///
    /// Returns `RoutingError::InvalidRule` if the host does not form a valid
    /// URL authority (e.g. contains a path, query or credentials).
    pub fn new(rule: RoutingRule, scheme: UrlScheme) -> Result<Self, RoutingError> {
        let raw = format!("{}://{}{}/", scheme, rule.host, rule.endpoint);
        let base = Url::parse(&raw).map_err(|e| RoutingError::InvalidRule {
            message: format!("{}: {}", raw, e),
        })?;

        let expected_path = format!("{}/", rule.endpoint);
        if base.path() != expected_path
            || base.query().is_some()
            || base.fragment().is_some()
            || !base.username().is_empty()
            || base.password().is_some()
        {
            return Err(RoutingError::InvalidRule {
                message: format!("host is not a plain authority: {}", rule.host),
            });
        }

        let prefix = rule
            .endpoint
            .split('/')
            .skip(1)
            .map(str::to_string)
            .collect();

        Ok(Self {
            rule,
            scheme,
            base,
            prefix,
        })
    }

    pub fn rule(&self) -> &RoutingRule {
        &self.rule
    }

    pub fn scheme(&self) -> UrlScheme {
        self.scheme
    }

    /// Build the absolute URL of a schema path.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError` if the path is empty, absolute, has empty or
    /// dot segments, or contains characters outside the routing rule.
    pub fn path_to_url(&self, path: &str) -> Result<String, RoutingError> {
        validate_path(path)?;

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RoutingError::InvalidRule {
                message: format!("{} cannot carry a path", self.base),
            })?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url.into())
    }

    /// Extract the schema path from a URL served by this rule.
    ///
    /// Returns `None` for unparsable URLs, foreign hosts, URLs outside the
    /// endpoint, and paths the rule would not have produced.
    pub fn url_to_path(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        if parsed.host_str() != self.base.host_str() || parsed.port() != self.base.port() {
            return None;
        }

        let mut segments = parsed.path_segments()?;
        for expected in &self.prefix {
            if segments.next()? != expected {
                return None;
            }
        }

        let path = segments.collect::<Vec<_>>().join("/");
        validate_path(&path).ok()?;
        Some(path)
    }

    /// Check an inbound `Host` authority (e.g. `example.org:8080`) against
    /// the configured host.
    pub fn matches_host(&self, authority: &str) -> bool {
        let Ok(parsed) = Url::parse(&format!("{}://{}/", self.scheme, authority)) else {
            return false;
        };
        parsed.path() == "/"
            && parsed.host_str() == self.base.host_str()
            && parsed.port() == self.base.port()
    }
}

/// Check that a path can be embedded in a schema URL without encoding.
pub fn validate_path(path: &str) -> Result<(), RoutingError> {
    if path.is_empty() {
        return Err(RoutingError::EmptyPath);
    }
    if path.starts_with('/') {
        return Err(RoutingError::AbsolutePath {
            path: path.to_string(),
        });
    }
    if let Some(ch) = path
        .chars()
        .find(|&c| c != '/' && !c.is_ascii_alphanumeric() && !PATH_PUNCTUATION.contains(c))
    {
        return Err(RoutingError::ForbiddenCharacter {
            path: path.to_string(),
            ch,
        });
    }
    if let Some(segment) = path
        .split('/')
        .find(|s| s.is_empty() || *s == "." || *s == "..")
    {
        return Err(RoutingError::InvalidSegment {
            path: path.to_string(),
            segment: segment.to_string(),
        });
    }
    Ok(())
}
