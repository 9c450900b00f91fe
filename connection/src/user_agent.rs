//! User agent validation for the version message.

use std::fmt;

/// Errors that can occur during user agent validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAgentError {
    /// The user agent format is invalid (must be `/name:version/`).
    InvalidFormat,
    /// The name component is missing or empty.
    MissingName,
    /// The version component is missing or empty.
    MissingVersion,
}

impl fmt::Display for UserAgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserAgentError::InvalidFormat => {
                write!(f, "User agent must follow format '/name:version/'")
            }
            UserAgentError::MissingName => {
                write!(f, "User agent name component cannot be empty")
            }
            UserAgentError::MissingVersion => {
                write!(f, "User agent version component cannot be empty")
            }
        }
    }
}

impl std::error::Error for UserAgentError {}

/// A user agent advertised in the version message.
///
/// Follows Bitcoin Core's convention of `/name:version/`.
///
/// # Example
///
/// ```
/// use dnsseed_connection::UserAgent;
///
/// let agent = UserAgent::new("/dnsseed:1.0.0/").unwrap();
/// assert_eq!(agent.as_str(), "/dnsseed:1.0.0/");
///
/// assert!(UserAgent::new("dnsseed:1.0.0").is_err());
/// assert_eq!(UserAgent::from_name_version("dnsseed", "1.0.0"), agent);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserAgent(String);

impl UserAgent {
    /// Validate and wrap a user agent string.
    pub fn new<S: Into<String>>(user_agent: S) -> Result<Self, UserAgentError> {
        let user_agent = user_agent.into();
        validate(&user_agent)?;
        Ok(UserAgent(user_agent))
    }

    /// Build a user agent from its components.
    ///
    /// The components are trusted, so no validation is performed.
    pub fn from_name_version(name: &str, version: &str) -> Self {
        UserAgent(format!("/{name}:{version}/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate(user_agent: &str) -> Result<(), UserAgentError> {
    if user_agent.len() < 2 || !user_agent.starts_with('/') || !user_agent.ends_with('/') {
        return Err(UserAgentError::InvalidFormat);
    }

    let contents = &user_agent[1..user_agent.len() - 1];
    let mut parts = contents.split(':');
    let (name, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(version), None) => (name, version),
        _ => return Err(UserAgentError::InvalidFormat),
    };

    if name.is_empty() {
        return Err(UserAgentError::MissingName);
    }
    if version.is_empty() {
        return Err(UserAgentError::MissingVersion);
    }

    Ok(())
}
