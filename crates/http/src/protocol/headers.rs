//! An ordered multi-map of header fields.

use std::fmt;

/// Header fields of a request or response.
///
/// Names are matched case-insensitively but kept as given. Duplicates are
/// allowed and iteration follows insertion order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    /// Appends a field, keeping any existing field with the same name.
    pub fn add<N: Into<String>, V: ToString>(&mut self, name: N, value: V) -> &mut Self {
        self.entries.push((name.into(), value.to_string()));
        self
    }

    /// Sets a field, discarding every existing field with the same name.
    ///
    /// The new field takes the position of the first discarded one, or goes
    /// last when there was none.
    pub fn replace<N: Into<String>, V: ToString>(&mut self, name: N, value: V) -> &mut Self {
        let name = name.into();
        let value = value.to_string();

        match self.position(&name) {
            Some(first) => {
                let mut index = 0;
                self.entries.retain(|(n, _)| {
                    let keep = index <= first || !n.eq_ignore_ascii_case(&name);
                    index += 1;
                    keep
                });
                self.entries[first] = (name, value);
            }
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Removes every field with `name`, returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Returns the value of the first field with `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.entries[index].1.as_str())
    }

    /// Returns the values of every field with `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter(move |(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// Parses the first `Content-Length` field, `None` when absent or not a number.
    pub fn content_length(&self) -> Option<u64> {
        self.get(http::header::CONTENT_LENGTH.as_str()).and_then(|value| value.trim().parse().ok())
    }

    /// Returns true when a `name` field lists `token` among its comma separated values.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name).flat_map(|value| value.split(',')).any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<N: Into<String>, V: ToString> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<N: Into<String>, V: ToString> Extend<(N, V)> for Headers {
    fn extend<I: IntoIterator<Item = (N, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.add(name, value);
        }
    }
}
