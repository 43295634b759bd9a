//! Property string tokenizing.
//!
//! Device strings are plain comma separated lists of `key=value` pairs, where the first entry
//! may omit its key. Contrary to the generic proxmox-schema property strings there is no quoting
//! or escaping inside of a device string, so a value can never contain a comma.
//!
//! The device string itself travels as a JSON string literal, see [`quote`] and [`unquote`].

use std::fmt;
use std::mem;

use crate::error::Error;

/// One comma separated entry of a property string.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Token<'a> {
    pub key: Option<&'a str>,
    pub value: &'a str,
}

impl<'a> Token<'a> {
    /// Split a single entry at its first `=`.
    pub fn parse(entry: &'a str) -> Self {
        match entry.find('=') {
            Some(pos) => {
                let (key, value) = ascii_split_around(entry, pos);
                Self {
                    key: Some(key),
                    value,
                }
            }
            None => Self {
                key: None,
                value: entry,
            },
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.key {
            Some(key) => write!(f, "{key}={}", self.value),
            None => f.write_str(self.value),
        }
    }
}

/// Iterate over the entries of a property string.
///
/// Empty entries (as in `a,,b` or a trailing comma) are skipped.
pub struct PropertyIterator<'a> {
    data: &'a str,
}

impl<'a> PropertyIterator<'a> {
    pub fn new(data: &'a str) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for PropertyIterator<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.data.is_empty() {
                return None;
            }

            let entry = match self.data.find(',') {
                Some(pos) => ascii_split_off(&mut self.data, pos),
                None => mem::take(&mut self.data),
            };

            if !entry.is_empty() {
                return Some(Token::parse(entry));
            }
        }
    }
}

impl std::iter::FusedIterator for PropertyIterator<'_> {}

/// Map a key to its field through an alias table.
///
/// Tables list every accepted spelling of a key. The first entry for a field is its canonical
/// name, which is what [`canonical_key`] returns for the encoder.
pub fn lookup_key<F: Copy>(table: &[(&str, F)], key: &str) -> Option<F> {
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, field)| *field)
}

/// The canonical spelling of a field's key.
pub fn canonical_key<F: PartialEq>(
    table: &[(&'static str, F)],
    field: F,
) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, entry)| *entry == field)
        .map(|(name, _)| *name)
}

/// Parse a boolean-ish property value.
///
/// Accepts `1`, `on`, `yes`, `true` and `0`, `off`, `no`, `false`, ignoring ASCII case.
pub fn parse_boolean(value: &str) -> Option<bool> {
    const TRUE: [&str; 4] = ["1", "on", "yes", "true"];
    const FALSE: [&str; 4] = ["0", "off", "no", "false"];

    if TRUE.iter().any(|v| value.eq_ignore_ascii_case(v)) {
        Some(true)
    } else if FALSE.iter().any(|v| value.eq_ignore_ascii_case(v)) {
        Some(false)
    } else {
        None
    }
}

/// Parse the value of a flag token.
pub(crate) fn parse_flag(token: &Token) -> Result<bool, Error> {
    parse_boolean(token.value).ok_or_else(|| Error::InvalidBooleanFlag(token.to_string()))
}

/// Parse the value of a floating point token, like a speed limit.
pub(crate) fn parse_number(token: &Token) -> Result<f64, Error> {
    match token.value.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(Error::InvalidNumber(token.to_string())),
    }
}

/// Store a decoded value, keys may only appear once per property string.
pub(crate) fn set_once<T>(slot: &mut Option<T>, token: &Token, value: T) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::DuplicateField(token.to_string()));
    }
    *slot = Some(value);
    Ok(())
}

/// Remove the JSON string quoting from a device string.
pub fn unquote(raw: &str) -> Result<String, Error> {
    serde_json::from_str::<String>(raw).map_err(|err| Error::InvalidQuoting {
        input: raw.to_string(),
        reason: err.to_string(),
    })
}

/// Counterpart to [`unquote`].
pub fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Builds a property string entry by entry.
///
/// There is no escaping, so a value containing a `,` cannot be printed. The first such value
/// is remembered and returned by [`finish`](Self::finish).
#[derive(Default)]
pub(crate) struct PropertyWriter {
    out: String,
    error: Option<Error>,
}

impl PropertyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry without a key.
    pub fn value(&mut self, value: &str) -> &mut Self {
        self.push(value.to_string())
    }

    pub fn entry<V: fmt::Display + ?Sized>(&mut self, key: &str, value: &V) -> &mut Self {
        self.push(format!("{key}={value}"))
    }

    pub fn opt_entry<V: fmt::Display>(&mut self, key: &str, value: Option<&V>) -> &mut Self {
        if let Some(value) = value {
            self.entry(key, value);
        }
        self
    }

    pub fn opt_str(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.entry(key, value);
        }
        self
    }

    pub fn opt_flag(&mut self, key: &str, value: Option<bool>) -> &mut Self {
        if let Some(value) = value {
            self.entry(key, if value { "1" } else { "0" });
        }
        self
    }

    /// Append a floating point entry, `NaN` and infinities are not valid numbers.
    pub fn opt_number(&mut self, key: &str, value: Option<f64>) -> &mut Self {
        match value {
            Some(value) if !value.is_finite() => {
                self.fail(Error::InvalidNumber(format!("{key}={value}")))
            }
            Some(value) => self.entry(key, &value),
            None => self,
        }
    }

    fn push(&mut self, entry: String) -> &mut Self {
        if entry.contains(',') {
            return self.fail(Error::InvalidValue(entry));
        }
        if !self.out.is_empty() {
            self.out.push(',');
        }
        self.out.push_str(&entry);
        self
    }

    fn fail(&mut self, error: Error) -> &mut Self {
        self.error.get_or_insert(error);
        self
    }

    pub fn finish(self) -> Result<String, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.out),
        }
    }
}

/// Like `str::split_at` but assumes `mid` points to an ASCII character and the 2nd slice
/// *excludes* `mid`.
fn ascii_split_around(s: &str, mid: usize) -> (&str, &str) {
    (&s[..mid], &s[(mid + 1)..])
}

/// Split "off" the first `mid` bytes of `s`, advancing it to `mid + 1` (assuming `mid` points to
/// an ASCII character!).
fn ascii_split_off<'a, 's>(s: &'a mut &'s str, mid: usize) -> &'s str {
    let (a, b) = ascii_split_around(s, mid);
    *s = b;
    a
}
