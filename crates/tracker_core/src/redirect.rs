//! One-shot handling of an external authorization redirect.
//!
//! The authorization provider sends the user back with the outcome in the
//! query string. The outcome must be acted on once, and the parameters must
//! be cleared in place so a reload or re-render cannot replay it.
use url::{form_urlencoded, Url};

use tracker_logging::tracker_debug;

use crate::Notification;

const INDICATOR_KEYS: [&str; 2] = ["oauth", "status"];
const SERVICE_KEY: &str = "service";
const MESSAGE_KEY: &str = "message";
const UNKNOWN_SERVICE: &str = "account";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOutcome {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRedirect {
    pub outcome: RedirectOutcome,
    pub service: String,
    pub message: Option<String>,
}

impl AuthRedirect {
    /// Extracts a completion indicator from a raw query string.
    pub fn parse(query: &str) -> Option<Self> {
        let mut outcome = None;
        let mut service = None;
        let mut message = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if INDICATOR_KEYS.contains(&&*key) {
                outcome = match &*value {
                    "success" => Some(RedirectOutcome::Success),
                    "error" => Some(RedirectOutcome::Error),
                    _ => outcome,
                };
            } else if key == SERVICE_KEY {
                service = Some(value.into_owned());
            } else if key == MESSAGE_KEY && !value.trim().is_empty() {
                message = Some(value.into_owned());
            }
        }

        Some(Self {
            outcome: outcome?,
            service: service.unwrap_or_else(|| UNKNOWN_SERVICE.to_string()),
            message,
        })
    }

    pub fn notification(&self) -> Notification {
        let label = service_label(&self.service);
        match self.outcome {
            RedirectOutcome::Success => Notification::success(format!("{label} connected")),
            RedirectOutcome::Error => Notification::error(
                self.message
                    .clone()
                    .unwrap_or_else(|| format!("Could not connect {label}. Try again.")),
            ),
        }
    }
}

pub fn service_label(service: &str) -> &str {
    match service {
        "google_drive" => "Google Drive",
        "icloud" => "iCloud",
        other => other,
    }
}

/// Removes the redirect keys, keeping unrelated parameters in order.
pub fn strip_redirect_params(query: &str) -> Option<String> {
    let kept: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| {
            !INDICATOR_KEYS.contains(&&**key) && key != SERVICE_KEY && key != MESSAGE_KEY
        })
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        return None;
    }
    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish(),
    )
}

/// Ambient location whose query can be rewritten without navigating.
pub trait TransientLocation {
    fn query(&self) -> Option<String>;
    fn replace_query(&mut self, query: Option<&str>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlLocation {
    url: Url,
}

impl UrlLocation {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Url::parse(raw).map(Self::new)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl TransientLocation for UrlLocation {
    fn query(&self) -> Option<String> {
        self.url.query().map(str::to_owned)
    }

    fn replace_query(&mut self, query: Option<&str>) {
        self.url.set_query(query);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRedirect {
    pub redirect: AuthRedirect,
    /// Query to write back in place of the current one.
    pub remaining_query: Option<String>,
}

/// Remembers the last consumed redirect so that a re-render which still
/// sees the old query (clear not yet applied) does not fire twice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedirectGuard {
    consumed: Option<String>,
}

impl RedirectGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inspect(&mut self, query: Option<&str>) -> Option<ConsumedRedirect> {
        let query = query?;
        let redirect = AuthRedirect::parse(query)?;
        if self.consumed.as_deref() == Some(query) {
            tracker_debug!("authorization redirect already handled; ignoring");
            return None;
        }
        self.consumed = Some(query.to_owned());
        Some(ConsumedRedirect {
            redirect,
            remaining_query: strip_redirect_params(query),
        })
    }

    /// Reads, decides and clears against a live location in one step.
    pub fn consume(&mut self, location: &mut dyn TransientLocation) -> Option<AuthRedirect> {
        let query = location.query();
        let consumed = self.inspect(query.as_deref())?;
        location.replace_query(consumed.remaining_query.as_deref());
        Some(consumed.redirect)
    }
}
