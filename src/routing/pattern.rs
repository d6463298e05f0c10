//! Path pattern compilation.
//!
//! # Dialect
//! - `static` literal segment
//! - `:name` required parameter (one segment)
//! - `:name?` optional parameter
//! - `:name*` / `:name+` repeated parameter (rest of the path, zero/one or more)
//! - `*` anonymous wildcard (rest of the path, key `"*"`)
//!
//! # Specificity
//! Static segments outrank required params, which outrank optional,
//! repeated and wildcard segments. Longer literals break ties.

use regex::Regex;
use thiserror::Error;

const STATIC_SCORE: u32 = 100;
const PARAM_SCORE: u32 = 10;
const LOOSE_SCORE: u32 = 1;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid parameter name in segment '{segment}' of pattern '{pattern}'")]
    InvalidParamName { pattern: String, segment: String },

    #[error("pattern '{pattern}' must start with '/'")]
    NotAbsolute { pattern: String },

    #[error("failed to compile pattern '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub regex: Regex,
    pub param_keys: Vec<String>,
    pub specificity: u32,
}

/// Compile a route pattern into an anchored regex plus its specificity.
pub fn compile(pattern: &str) -> Result<CompiledPattern, PatternError> {
    if !pattern.starts_with('/') {
        return Err(PatternError::NotAbsolute {
            pattern: pattern.to_string(),
        });
    }

    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut param_keys = Vec::new();
    let mut specificity = 0u32;

    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        if segment == "*" {
            source.push_str("(?:/(.*))?");
            param_keys.push("*".to_string());
            specificity += LOOSE_SCORE;
        } else if let Some(param) = segment.strip_prefix(':') {
            let (name, modifier) = match param.char_indices().last() {
                Some((idx, c @ ('?' | '*' | '+'))) => (&param[..idx], Some(c)),
                _ => (param, None),
            };
            if !is_valid_name(name) {
                return Err(PatternError::InvalidParamName {
                    pattern: pattern.to_string(),
                    segment: segment.to_string(),
                });
            }
            match modifier {
                None => {
                    source.push_str("/([^/]+)");
                    specificity += PARAM_SCORE;
                }
                Some('?') => {
                    source.push_str("(?:/([^/]+))?");
                    specificity += LOOSE_SCORE;
                }
                Some('*') => {
                    source.push_str("(?:/(.+))?");
                    specificity += LOOSE_SCORE;
                }
                Some(_) => {
                    source.push_str("/(.+)");
                    specificity += LOOSE_SCORE;
                }
            }
            param_keys.push(name.to_string());
        } else {
            source.push('/');
            source.push_str(&regex::escape(segment));
            specificity += STATIC_SCORE + segment.len() as u32;
        }
    }

    if param_keys.is_empty() && source.len() == 1 {
        // Root pattern.
        source.push_str("/$");
    } else {
        source.push_str("/?$");
    }

    let regex = Regex::new(&source).map_err(|source| PatternError::Regex {
        pattern: pattern.to_string(),
        source,
    })?;

    Ok(CompiledPattern {
        regex,
        param_keys,
        specificity,
    })
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
