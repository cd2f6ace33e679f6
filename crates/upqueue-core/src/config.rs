//! Session configuration.

use crate::error::{Result, UploadError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the transport parses server responses
///
/// Passed through to the transport; the session never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// JSON body
    #[default]
    Json,
    /// Plain text body
    Text,
    /// XML document
    Xml,
    /// HTML document
    Html,
    /// Script body
    Script,
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
            Self::Xml => write!(f, "xml"),
            Self::Html => write!(f, "html"),
            Self::Script => write!(f, "script"),
        }
    }
}

/// Options recognized by an upload session
///
/// Unrecognized keys are ignored when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upload target
    #[serde(default = "default_endpoint", alias = "url")]
    pub endpoint: String,
    /// Start every file as soon as it is added
    #[serde(default, alias = "autoUpload")]
    pub auto_upload: bool,
    /// Server response format
    #[serde(default, alias = "dataType", alias = "responseFormat")]
    pub response_format: ResponseFormat,
}

fn default_endpoint() -> String {
    "/upload".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auto_upload: false,
            response_format: ResponseFormat::default(),
        }
    }
}

impl SessionConfig {
    /// Set the upload target
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Enable or disable auto upload
    #[must_use]
    pub fn with_auto_upload(mut self, auto_upload: bool) -> Self {
        self.auto_upload = auto_upload;
        self
    }

    /// Set the response format
    #[must_use]
    pub fn with_response_format(mut self, response_format: ResponseFormat) -> Self {
        self.response_format = response_format;
        self
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidConfig`] if the endpoint is blank.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(UploadError::invalid_config("endpoint must not be empty"));
        }
        Ok(())
    }
}
