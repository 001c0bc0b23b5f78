use std::fmt;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{MatchCallback, MatchContext, MatchResult};
use crate::error::RouteError;

const WILDCARDS: &[char] = &['*', ':', '?', '+'];

/// What a route registered through [`Router::register`](super::Router::register) matches.
pub enum Capture {
    /// Exact URL, either a path starting with `/` or an absolute `http(s)` URL.
    Path(String),
    /// Regular expression run against the full URL. Capture groups become params.
    Regex(Regex),
    /// Arbitrary match callback.
    Callback(Box<dyn MatchCallback>),
}

impl Capture {
    /// Wraps a match callback.
    pub fn callback<M>(matcher: M) -> Self
    where
        M: MatchCallback + 'static,
    {
        Capture::Callback(Box::new(matcher))
    }

    pub(crate) fn into_matcher(self, origin: &Url) -> Result<Box<dyn MatchCallback>, RouteError> {
        match self {
            Capture::Path(capture) => {
                let matcher = PathMatcher::new(&capture, origin)?;
                Ok(Box::new(matcher))
            }
            Capture::Regex(regex) => Ok(Box::new(RegexMatcher { regex })),
            Capture::Callback(callback) => Ok(callback),
        }
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capture::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Capture::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Capture::Callback(_) => f.write_str("Callback"),
        }
    }
}

impl From<&str> for Capture {
    fn from(path: &str) -> Self {
        Capture::Path(path.to_owned())
    }
}

impl From<String> for Capture {
    fn from(path: String) -> Self {
        Capture::Path(path)
    }
}

impl From<Regex> for Capture {
    fn from(regex: Regex) -> Self {
        Capture::Regex(regex)
    }
}

/// Matches one exact URL.
#[derive(Debug)]
struct PathMatcher {
    url: Url,
}

impl PathMatcher {
    fn new(capture: &str, origin: &Url) -> Result<Self, RouteError> {
        let invalid = || RouteError::InvalidRouteCapture {
            capture: capture.to_owned(),
        };
        if !(capture.starts_with('/') || capture.starts_with("http")) {
            return Err(invalid());
        }
        let url = origin.join(capture).map_err(|_| invalid())?;

        let checked = if capture.starts_with("http") {
            url.path()
        } else {
            capture
        };
        if checked.contains(WILDCARDS) {
            warn!(
                capture,
                "route capture contains wildcard characters and is matched literally, use a regex capture instead"
            );
        }
        Ok(Self { url })
    }
}

impl MatchCallback for PathMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> MatchResult {
        (ctx.url == &self.url).into()
    }
}

/// Matches a regular expression against the full URL.
#[derive(Debug)]
struct RegexMatcher {
    regex: Regex,
}

impl MatchCallback for RegexMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> MatchResult {
        let Some(captures) = self.regex.captures(ctx.url.as_str()) else {
            return MatchResult::NoMatch;
        };
        let starts_at_zero = captures.get(0).is_some_and(|whole| whole.start() == 0);
        if !ctx.same_origin && !starts_at_zero {
            debug!(
                url = %ctx.url,
                regex = self.regex.as_str(),
                "cross-origin url only matched part of the route regex"
            );
            return MatchResult::NoMatch;
        }
        let groups = captures
            .iter()
            .skip(1)
            .map(|group| group.map_or(Value::Null, |m| Value::String(m.as_str().to_owned())))
            .collect();
        MatchResult::Match(Some(Value::Array(groups)))
    }
}
