//! Callback Types
//!
//! Query parameters of the provider's redirect back to the application, and
//! the browser-facing outcome of handling it.

use url::Url;

/// Callback parameters from authorization redirect.
#[derive(Clone, Debug, Default)]
pub struct CallbackParams {
    /// Authorization code (if success).
    pub code: Option<String>,
    /// State parameter.
    pub state: Option<String>,
    /// Error code (if the user or provider refused).
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Callback carrying a code and optional state.
    pub fn with_code(code: impl Into<String>, state: Option<String>) -> Self {
        Self {
            code: Some(code.into()),
            state,
            ..Default::default()
        }
    }

    /// Parse callback parameters from URL.
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        params
    }

    /// Parse callback parameters from URL string.
    pub fn from_url_str(url_str: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url_str)?;
        Ok(Self::from_url(&url))
    }

    /// Check if callback contains an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One-shot message shown after a redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flash {
    Notice(String),
    Alert(String),
}

/// Redirect instruction returned to the transport layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub flash: Option<Flash>,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            flash: None,
        }
    }

    pub fn with_flash(mut self, flash: Flash) -> Self {
        self.flash = Some(flash);
        self
    }

    pub fn notice(&self) -> Option<&str> {
        match &self.flash {
            Some(Flash::Notice(message)) => Some(message),
            _ => None,
        }
    }

    pub fn alert(&self) -> Option<&str> {
        match &self.flash {
            Some(Flash::Alert(message)) => Some(message),
            _ => None,
        }
    }
}

/// Scheme and authority of the request being served.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    /// Host, with port when non-default.
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Take scheme and authority from a request URL.
    pub fn from_url(url: &Url) -> Self {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        Self::new(url.scheme(), host)
    }

    /// `scheme://host` prefix.
    pub fn base(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}
