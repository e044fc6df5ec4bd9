use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::redirect::service_label;

/// Source and destination a migration needs, in display order.
pub const REQUIRED_SERVICES: [&str; 2] = ["google_drive", "icloud"];

/// Linked account state as the service reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Connected,
    Configured,
    Expired,
    Error,
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown credential status {0:?}")]
pub struct ParseCredentialStatusError(pub String);

impl CredentialStatus {
    const ALL: [CredentialStatus; 5] = [
        CredentialStatus::Connected,
        CredentialStatus::Configured,
        CredentialStatus::Expired,
        CredentialStatus::Error,
        CredentialStatus::NotConfigured,
    ];

    /// Stored credentials the service can use right now.
    pub fn is_usable(self) -> bool {
        matches!(self, CredentialStatus::Connected | CredentialStatus::Configured)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CredentialStatus::Connected => "connected",
            CredentialStatus::Configured => "configured",
            CredentialStatus::Expired => "expired",
            CredentialStatus::Error => "error",
            CredentialStatus::NotConfigured => "not_configured",
        }
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialStatus {
    type Err = ParseCredentialStatusError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseCredentialStatusError(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub service: String,
    pub status: CredentialStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub service: String,
    pub label: String,
    pub status: CredentialStatus,
}

/// Last credential list read. `None` until the first read lands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Accounts {
    loaded: Option<BTreeMap<String, CredentialStatus>>,
}

impl Accounts {
    pub fn replace(&mut self, credentials: Vec<Credential>) {
        self.loaded = Some(
            credentials
                .into_iter()
                .map(|credential| (credential.service, credential.status))
                .collect(),
        );
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn status(&self, service: &str) -> Option<CredentialStatus> {
        let loaded = self.loaded.as_ref()?;
        Some(
            loaded
                .get(service)
                .copied()
                .unwrap_or(CredentialStatus::NotConfigured),
        )
    }

    /// First required service without usable credentials. Unknown while
    /// nothing is loaded; the service then decides.
    pub fn missing_for_migration(&self) -> Option<&'static str> {
        REQUIRED_SERVICES
            .into_iter()
            .find(|service| self.status(service).is_some_and(|status| !status.is_usable()))
    }

    /// Required services first, then anything else the service reported.
    pub fn rows(&self) -> Option<Vec<AccountRow>> {
        let loaded = self.loaded.as_ref()?;
        let extra = loaded
            .keys()
            .map(String::as_str)
            .filter(|service| !REQUIRED_SERVICES.contains(service));
        Some(
            REQUIRED_SERVICES
                .into_iter()
                .chain(extra)
                .map(|service| AccountRow {
                    service: service.to_string(),
                    label: service_label(service).to_string(),
                    status: loaded
                        .get(service)
                        .copied()
                        .unwrap_or(CredentialStatus::NotConfigured),
                })
                .collect(),
        )
    }
}
