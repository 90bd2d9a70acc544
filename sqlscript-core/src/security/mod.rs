//! Credential handling.
//!
//! Logins and passwords are kept in `Zeroizing` containers and never reach
//! logs, error messages or serialized output.

mod credentials;

pub use credentials::Credentials;
