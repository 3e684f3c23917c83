//! Named secret lookup.

use std::env;
use zeroize::Zeroizing;

/// Resolves named secrets such as key passphrases.
///
/// A secret that is absent is `None`, never an error. Returned values are
/// wiped from memory when dropped.
pub trait SecretProvider: Send + Sync {
    /// Looks up `name`.
    fn get_secret(&self, name: &str) -> Option<Zeroizing<String>>;
}

/// Reads secrets from the process environment.
///
/// With a prefix, `get_secret("KEY")` reads `<prefix>KEY`. Unset, empty and
/// non-UTF-8 variables all resolve to `None`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    prefix: Option<String>,
}

impl EnvSecretProvider {
    /// Creates a provider that reads variables by their exact name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider that prepends `prefix` to every name.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn variable_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name.to_string(),
        }
    }
}

impl SecretProvider for EnvSecretProvider {
    fn get_secret(&self, name: &str) -> Option<Zeroizing<String>> {
        if name.is_empty() {
            return None;
        }
        env::var(self.variable_name(name))
            .ok()
            .filter(|value| !value.is_empty())
            .map(Zeroizing::new)
    }
}
