//! Login container with automatic memory zeroing.
//!
//! Login and password live in `Zeroizing` containers so they are wiped when
//! the session target that carried them is dropped. Neither is ever printed by
//! `Debug`.

use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// SQL login used to open provider sessions.
///
/// # Example
///
/// ```rust
/// use sqlscript_core::security::Credentials;
///
/// let creds = Credentials::new("backup_reader".to_string(), Some("secret".to_string()));
/// assert_eq!(creds.login(), "backup_reader");
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    login: Zeroizing<String>,
    password: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing.
    pub fn new(login: String, password: Option<String>) -> Self {
        Self {
            login: Zeroizing::new(login),
            password: Zeroizing::new(password),
        }
    }

    /// Gets the login name.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Gets the password for handing to a driver; an absent password is
    /// sent as empty.
    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    /// Checks if password is present without exposing it.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &*self.login)
            .field("password", &self.has_password().then_some("****"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = Credentials::new("sa".to_string(), Some("Str0ng!".to_string()));
        assert_eq!(creds.login(), "sa");
        assert_eq!(creds.password(), "Str0ng!");
        assert!(creds.has_password());
    }

    #[test]
    fn test_credentials_no_password() {
        let creds = Credentials::new("reader".to_string(), None);
        assert_eq!(creds.login(), "reader");
        assert_eq!(creds.password(), "");
        assert!(!creds.has_password());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("sa".to_string(), Some("hunter2".to_string()));
        let debug = format!("{:?}", creds);
        assert!(debug.contains("sa"));
        assert!(debug.contains("****"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_credentials_clone() {
        let creds1 = Credentials::new("user".to_string(), Some("pass".to_string()));
        let creds2 = creds1.clone();
        assert_eq!(creds1.login(), creds2.login());
        assert_eq!(creds1.has_password(), creds2.has_password());
    }
}
