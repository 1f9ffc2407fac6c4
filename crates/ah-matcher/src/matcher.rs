//! Silence Matcher (§4.D): Prometheus-style label matching, AND across a
//! silence's matchers, fan-out across many silences via `MatchesAny`.

use std::collections::BTreeMap;
use std::sync::Arc;

use ah_common::{Matcher, MatcherType, Silence};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::{MatcherError, Result};
use crate::regex_cache::RegexCache;

/// Evaluates silences against alert label maps, sharing compiled patterns
/// through a `RegexCache`.
pub struct SilenceMatcher {
    regex_cache: Arc<RegexCache>,
}

impl SilenceMatcher {
    pub fn new(regex_cache: Arc<RegexCache>) -> Self {
        Self { regex_cache }
    }

    fn matcher_matches(&self, matcher: &Matcher, labels: &BTreeMap<String, String>) -> Result<bool> {
        let present = labels.get(matcher.name.as_str());
        Ok(match matcher.matcher_type {
            MatcherType::Eq => present.is_some_and(|v| v == &matcher.value),
            MatcherType::Neq => !present.is_some_and(|v| v == &matcher.value),
            MatcherType::EqRegex => {
                let Some(value) = present else { return Ok(false) };
                full_match(&self.regex_cache, &matcher.value, value)?
            }
            MatcherType::NeqRegex => {
                let Some(value) = present else { return Ok(true) };
                !full_match(&self.regex_cache, &matcher.value, value)?
            }
        })
    }

    /// All matchers in `silence` must match `labels` (AND semantics).
    /// Short-circuits on the first failing matcher, including before
    /// compiling any later regex.
    pub fn matches(&self, silence: &Silence, labels: &BTreeMap<String, String>) -> Result<bool> {
        if silence.matchers.is_empty() {
            return Err(MatcherError::InvalidSilence);
        }

        for matcher in &silence.matchers {
            if !self.matcher_matches(matcher, labels)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluates every silence against `labels`, returning every matching
    /// silence id (not just the first). A regex failure on one silence is
    /// treated as that silence not matching; the scan continues. Cooperative
    /// cancellation is polled at each loop head; on cancellation the partial
    /// matched-id list is returned alongside `ErrContextCancelled`.
    pub fn matches_any(
        &self,
        cancel: &CancellationToken,
        silences: &[Silence],
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Uuid>> {
        let mut matched = Vec::new();

        for silence in silences {
            if cancel.is_cancelled() {
                return Err(MatcherError::ContextCancelled(matched));
            }

            match self.matches(silence, labels) {
                Ok(true) => matched.push(silence.id),
                Ok(false) => {}
                Err(MatcherError::RegexCompilationFailed(reason)) => {
                    debug!(silence_id = %silence.id, reason, "skipping silence: regex compilation failed");
                }
                Err(other) => return Err(other),
            }
        }

        if cancel.is_cancelled() {
            return Err(MatcherError::ContextCancelled(matched));
        }

        Ok(matched)
    }
}

/// `regex::Regex::is_match` is a substring search; matchers need `fullmatch`
/// semantics, so anchor the cached pattern explicitly.
fn full_match(cache: &RegexCache, pattern: &str, value: &str) -> Result<bool> {
    let anchored = anchor(pattern);
    Ok(cache.get(&anchored)?.is_match(value))
}

fn anchor(pattern: &str) -> String {
    let starts = pattern.starts_with('^');
    let ends = pattern.ends_with('$') && !pattern.ends_with("\\$");
    match (starts, ends) {
        (true, true) => pattern.to_string(),
        (true, false) => format!("{pattern}$"),
        (false, true) => format!("^{pattern}"),
        (false, false) => format!("^(?:{pattern})$"),
    }
}
