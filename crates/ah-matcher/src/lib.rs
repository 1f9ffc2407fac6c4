//! Regex Cache (§4.C) and Silence Matcher (§4.D).

mod error;
mod matcher;
mod regex_cache;

pub use error::{MatcherError, Result};
pub use matcher::SilenceMatcher;
pub use regex_cache::RegexCache;
