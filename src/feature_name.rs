//! Textual feature names: `base(param1,param2).output`.
//!
//! Parameters are split at top-level commas; nested parentheses are kept
//! verbatim so a parameter may itself be a feature name
//! (`sum(value(1),value(2))`). A parameter wrapped in double quotes may
//! contain any character, with `\"` and `\\` as escapes. Unquoted
//! parameters are trimmed.
//!
//! The *executor name* (`base(params)`) identifies one node in the
//! dependency graph; the optional `.output` suffix selects one of that
//! node's outputs.

use std::fmt;
use std::str::FromStr;

use crate::errors::{RankError, Result};

/// A parsed feature name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureName {
    base: String,
    params: Vec<String>,
    output: Option<String>,
}

impl FeatureName {
    /// Build a feature name from parts without parsing.
    pub fn new<I, S>(base: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base: base.into(),
            params: params.into_iter().map(Into::into).collect(),
            output: None,
        }
    }

    /// Builder method: select a named output
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Parse `input` into base name, parameters and output.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let bytes = s.as_bytes();

        let mut pos = 0;
        while pos < bytes.len() && is_name_byte(bytes[pos]) {
            pos += 1;
        }
        if pos == 0 {
            return Err(RankError::invalid_config(input, "missing feature base name"));
        }
        let base = s[..pos].to_string();

        let mut params = Vec::new();
        if pos < bytes.len() && bytes[pos] == b'(' {
            let (parsed, end) = parse_params(input, s, pos + 1)?;
            params = parsed;
            pos = end;
        }

        let mut output = None;
        if pos < bytes.len() {
            if bytes[pos] != b'.' {
                let found = s[pos..].chars().next().unwrap_or_default();
                return Err(RankError::invalid_config(
                    input,
                    format!("unexpected '{}' at offset {}", found, pos),
                ));
            }
            let out = &s[pos + 1..];
            if out.is_empty() || !out.bytes().all(|b| is_name_byte(b) || b == b'.') {
                return Err(RankError::invalid_config(input, "malformed output name"));
            }
            output = Some(out.to_string());
        }

        Ok(Self {
            base,
            params,
            output,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Canonical `base(params)` form, without the output suffix.
    pub fn executor_name(&self) -> String {
        if self.params.is_empty() {
            return self.base.clone();
        }
        let mut name = String::with_capacity(self.base.len() + 2 + self.params.len() * 8);
        name.push_str(&self.base);
        name.push('(');
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                name.push(',');
            }
            push_param(&mut name, p);
        }
        name.push(')');
        name
    }

    /// Canonical name including the output suffix, if any.
    pub fn full_name(&self) -> String {
        match &self.output {
            Some(out) => format!("{}.{}", self.executor_name(), out),
            None => self.executor_name(),
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl FromStr for FeatureName {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[inline]
fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'@' || b == b'$'
}

/// Parse a parameter list starting right after `(`.
///
/// Returns the parameters and the byte offset just past the closing `)`.
/// Quoted text inside a nested feature is copied verbatim, escapes included,
/// so its parentheses and commas do not count.
fn parse_params(input: &str, s: &str, start: usize) -> Result<(Vec<String>, usize)> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut in_nested_quote = false;
    let mut quoted = false;

    let mut chars = s[start..].char_indices();
    while let Some((i, c)) = chars.next() {
        if in_quote {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => current.push(escaped),
                    None => return Err(RankError::invalid_config(input, "dangling escape")),
                },
                '"' => in_quote = false,
                _ => current.push(c),
            }
            continue;
        }

        if in_nested_quote {
            current.push(c);
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => current.push(escaped),
                    None => return Err(RankError::invalid_config(input, "dangling escape")),
                },
                '"' => in_nested_quote = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if depth == 0 && !quoted && current.trim().is_empty() => {
                current.clear();
                in_quote = true;
                quoted = true;
            }
            ',' if depth == 0 => {
                params.push(finish_param(&mut current, quoted));
                quoted = false;
            }
            ')' if depth == 0 => {
                let empty_list = params.is_empty() && !quoted && current.trim().is_empty();
                if !empty_list {
                    params.push(finish_param(&mut current, quoted));
                }
                return Ok((params, start + i + 1));
            }
            _ if quoted => {
                if !c.is_whitespace() {
                    return Err(RankError::invalid_config(
                        input,
                        "unexpected text after quoted parameter",
                    ));
                }
            }
            '"' if depth > 0 => {
                in_nested_quote = true;
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            _ => current.push(c),
        }
    }

    if in_quote || in_nested_quote {
        Err(RankError::invalid_config(input, "unterminated quoted parameter"))
    } else {
        Err(RankError::invalid_config(input, "unbalanced parentheses"))
    }
}

fn finish_param(current: &mut String, quoted: bool) -> String {
    let param = if quoted {
        std::mem::take(current)
    } else {
        current.trim().to_string()
    };
    current.clear();
    param
}

fn push_param(out: &mut String, param: &str) {
    if !needs_quoting(param) {
        out.push_str(param);
        return;
    }
    out.push('"');
    for c in param.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

/// A parameter survives a round trip unquoted when it is non-empty, has no
/// surrounding whitespace, no top-level comma and balanced parentheses.
/// Quotes are only allowed as complete quoted strings inside a nested
/// feature; backslashes only inside those strings.
fn needs_quoting(param: &str) -> bool {
    if param.is_empty() || param.trim() != param {
        return true;
    }
    let mut depth = 0i32;
    let mut chars = param.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' if depth > 0 => loop {
                match chars.next() {
                    Some('\\') => {
                        if chars.next().is_none() {
                            return true;
                        }
                    }
                    Some('"') => break,
                    Some(_) => {}
                    None => return true,
                }
            },
            '"' | '\\' => return true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            ',' if depth == 0 => return true,
            _ => {}
        }
    }
    depth != 0
}
