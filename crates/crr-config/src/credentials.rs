use std::fmt;

/// Where a replication side gets its credentials from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Fixed key pair supplied in configuration. Never refreshed.
    Static {
        access_key_id: String,
        secret_access_key: String,
    },
    /// The ambient default provider chain (environment, profile, instance role).
    DefaultChain,
}

impl CredentialSource {
    pub fn is_static(&self) -> bool {
        matches!(self, CredentialSource::Static { .. })
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"<redacted>")
                .finish(),
            CredentialSource::DefaultChain => write!(f, "DefaultChain"),
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Static { access_key_id, .. } => {
                write!(f, "static ({})", access_key_id)
            }
            CredentialSource::DefaultChain => write!(f, "default provider chain"),
        }
    }
}

/// Pick static credentials when both halves of a key pair are given and
/// non-empty, the default chain otherwise.
pub fn select_credentials(
    access_key_id: Option<&str>,
    secret_access_key: Option<&str>,
) -> CredentialSource {
    match (access_key_id, secret_access_key) {
        (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
            CredentialSource::Static {
                access_key_id: id.to_string(),
                secret_access_key: secret.to_string(),
            }
        }
        _ => CredentialSource::DefaultChain,
    }
}
