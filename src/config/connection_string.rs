//! `key=value;` connection strings.
//!
//! Keys are matched case-insensitively and keep their original spelling.
//! Values may be wrapped in `"..."` or `'...'` (a doubled quote inside is a
//! literal quote) or in ODBC `{...}` braces (`}}` is a literal brace).

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// An ordered, case-insensitive set of connection string options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pairs: Vec<(String, String)>,
}

impl ConnectionString {
    /// Creates an empty connection string.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a connection string.
    ///
    /// A key appearing more than once keeps its last value.
    ///
    /// # Errors
    ///
    /// Returns an error if a key has no `=` or a quoted value is not
    /// terminated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sqlwrap::config::ConnectionString;
    ///
    /// let cs = ConnectionString::parse("Server=db; Pwd=\"a;b\"; Port=3307")?;
    /// assert_eq!(cs.get("server"), Some("db"));
    /// assert_eq!(cs.get("PWD"), Some("a;b"));
    /// # Ok::<(), sqlwrap::Error>(())
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let mut parsed = Self::new();
        let mut rest = input;

        loop {
            rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
            if rest.is_empty() {
                break;
            }

            let Some(eq) = rest.find('=') else {
                return Err(parse_error(format!("option '{}' has no value", rest.trim())));
            };
            let key = rest[..eq].trim();
            if let Some(semi) = key.find(';') {
                return Err(parse_error(format!(
                    "option '{}' has no value",
                    key[..semi].trim()
                )));
            }
            if key.is_empty() {
                return Err(parse_error("empty option name".to_string()));
            }

            let (value, remainder) = read_value(rest[eq + 1..].trim_start(), key)?;
            parsed.set(key, value);
            rest = remainder;
        }

        Ok(parsed)
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.pairs[i].1.as_str())
    }

    /// Returns the value of the first key in `keys` that is present.
    #[must_use]
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Sets `key`, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => self.pairs[i].1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.position(key).map(|i| self.pairs.remove(i).1)
    }

    /// Iterates over the options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` when there are no options.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Renders the options using ODBC `{...}` quoting.
    #[must_use]
    pub fn to_odbc_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| {
                if needs_quoting(v) || v.contains(['{', '}']) {
                    format!("{k}={{{}}}", v.replace('}', "}}"))
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.pairs
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

fn parse_error(cause: String) -> Error {
    Error::config("parse_connection_string", cause)
}

/// Reads one value, returning it and the unparsed remainder.
fn read_value<'a>(input: &'a str, key: &str) -> Result<(String, &'a str)> {
    let Some(open) = input.chars().next() else {
        return Ok((String::new(), input));
    };

    let close = match open {
        '"' | '\'' => open,
        '{' => '}',
        _ => {
            let end = input.find(';').unwrap_or(input.len());
            return Ok((input[..end].trim_end().to_string(), &input[end..]));
        },
    };

    let mut value = String::new();
    let mut chars = input[1..].char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != close {
            value.push(c);
            continue;
        }
        if chars.peek().is_some_and(|&(_, next)| next == close) {
            chars.next();
            value.push(c);
            continue;
        }

        let rest = input[1 + i + c.len_utf8()..].trim_start();
        if !rest.is_empty() && !rest.starts_with(';') {
            return Err(parse_error(format!(
                "unexpected text after quoted value of '{key}'"
            )));
        }
        return Ok((value, rest));
    }

    Err(parse_error(format!("unterminated quoted value for '{key}'")))
}

fn needs_quoting(value: &str) -> bool {
    value.contains(';')
        || value.starts_with(['"', '\'', '{'])
        || value.trim() != value
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            if !needs_quoting(value) {
                write!(f, "{key}={value}")?;
            } else if value.contains('"') && !value.contains('\'') {
                write!(f, "{key}='{value}'")?;
            } else {
                write!(f, "{key}=\"{}\"", value.replace('"', "\"\""))?;
            }
        }
        Ok(())
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConnectionString {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut cs = Self::new();
        for (k, v) in iter {
            cs.set(k, v);
        }
        cs
    }
}
