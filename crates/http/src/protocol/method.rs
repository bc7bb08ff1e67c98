use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A request method.
///
/// Parsing with [`Method::from`] maps standard methods to their own variant
/// regardless of case, any other token becomes [`Method::Custom`] stored in
/// upper case. A `Custom` built directly keeps its spelling in
/// [`as_str`](Method::as_str) but is displayed in upper case. Comparison
/// ignores case, so `Custom("get")` equals `Get`.
#[derive(Debug, Clone)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
    Custom(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Custom(token) => token,
        }
    }

    /// GET, HEAD, OPTIONS and TRACE.
    pub fn is_safe(&self) -> bool {
        matches!(self.normalized(), Method::Get | Method::Head | Method::Options | Method::Trace)
    }

    /// Safe methods plus PUT and DELETE.
    pub fn is_idempotent(&self) -> bool {
        self.is_safe() || matches!(self.normalized(), Method::Put | Method::Delete)
    }

    /// GET, HEAD and POST.
    pub fn is_cacheable(&self) -> bool {
        matches!(self.normalized(), Method::Get | Method::Head | Method::Post)
    }

    fn normalized(&self) -> Method {
        match self {
            Method::Custom(token) => Method::from(token.as_str()),
            other => other.clone(),
        }
    }
}

impl From<&str> for Method {
    fn from(token: &str) -> Self {
        const STANDARD: [Method; 9] = [
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Patch,
            Method::Delete,
            Method::Head,
            Method::Options,
            Method::Trace,
            Method::Connect,
        ];

        STANDARD
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(token))
            .unwrap_or_else(|| Method::Custom(token.to_ascii_uppercase()))
    }
}

impl FromStr for Method {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Method::from(s))
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Eq for Method {}

impl Hash for Method {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.as_str().bytes() {
            state.write_u8(b.to_ascii_uppercase());
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Custom(token) => token.chars().try_for_each(|c| fmt::Write::write_char(f, c.to_ascii_uppercase())),
            other => f.write_str(other.as_str()),
        }
    }
}
