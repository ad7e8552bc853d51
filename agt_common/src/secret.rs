//! A wrapper that keeps credentials out of logs and debug output.
use std::{
    fmt,
    fmt::{Debug, Display},
};

use log::warn;

/// Holds a sensitive value (signing keys, API tokens). Both `Debug` and `Display` print a mask, so a `Secret`
/// can never leak through log statements or formatted error messages. Callers that genuinely need the value
/// call [`Secret::reveal`] at the point of use.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// Hands back the wrapped value. Keep the result out of log statements.
    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl Secret<String> {
    /// Loads a secret from the named environment variable. A missing variable yields an empty secret and a
    /// warning rather than an error, matching how the configuration layer treats every other absent key. Use
    /// [`Secret::is_unset`] where an absent credential warrants a louder reaction.
    pub fn from_env(var: &str) -> Self {
        let value = std::env::var(var).unwrap_or_else(|_| {
            warn!("🪛️ {var} is not set. Using an empty secret, which will fail against any real upstream.");
            String::default()
        });
        Self::new(value)
    }

    /// True when no value was ever configured.
    pub fn is_unset(&self) -> bool {
        self.value.is_empty()
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formatting_never_reveals_the_value() {
        let secret = Secret::new("hunter2".to_string());
        assert_eq!(format!("{secret}"), "****");
        assert_eq!(format!("{secret:?}"), "****");
        assert_eq!(secret.reveal(), "hunter2");
    }

    #[test]
    fn from_env_reads_the_variable() {
        std::env::set_var("AGT_SECRET_TEST_KEY", "s3kr1t");
        let secret = Secret::from_env("AGT_SECRET_TEST_KEY");
        assert_eq!(secret.reveal(), "s3kr1t");
        assert!(!secret.is_unset());
    }

    #[test]
    fn a_missing_variable_yields_an_unset_secret() {
        let secret = Secret::from_env("AGT_SECRET_TEST_NEVER_SET");
        assert!(secret.is_unset());
        assert_eq!(secret.reveal(), "");
    }
}
