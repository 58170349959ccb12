//! Where scripts can be injected at all.
//!
//! Browsers refuse content scripts on their own store and account pages, and
//! scriptlets only make sense on web documents.

use serde::{Deserialize, Serialize};

use crate::domain::{extract_host, is_http_url};

/// Browser family the extension runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Opera,
    Edge,
}

const CHROMIUM_RESTRICTED: &[&str] = &["chrome.google.com", "chromewebstore.google.com"];

const FIREFOX_RESTRICTED: &[&str] = &[
    "accounts-static.cdn.mozilla.net",
    "accounts.firefox.com",
    "addons.cdn.mozilla.net",
    "addons.mozilla.org",
    "api.accounts.firefox.com",
    "content.cdn.mozilla.net",
    "discovery.addons.mozilla.org",
    "install.mozilla.org",
    "oauth.accounts.firefox.com",
    "profile.accounts.firefox.com",
    "support.mozilla.org",
    "sync.services.mozilla.com",
];

const OPERA_RESTRICTED: &[&str] = &["addons.opera.com"];

const EDGE_RESTRICTED: &[&str] = &["microsoftedge.microsoft.com"];

impl Browser {
    /// Hostnames on which this browser blocks extension scripts.
    /// Opera and Edge are Chromium based and inherit its list.
    pub fn restricted_hostnames(&self) -> impl Iterator<Item = &'static str> {
        let (base, own): (&[&str], &[&str]) = match self {
            Self::Chromium => (CHROMIUM_RESTRICTED, &[]),
            Self::Firefox => (FIREFOX_RESTRICTED, &[]),
            Self::Opera => (CHROMIUM_RESTRICTED, OPERA_RESTRICTED),
            Self::Edge => (CHROMIUM_RESTRICTED, EDGE_RESTRICTED),
        };
        base.iter().chain(own.iter()).copied()
    }
}

/// Injection restrictions for one browser.
#[derive(Debug, Clone, Default)]
pub struct InjectionPolicy {
    browser: Browser,
}

impl InjectionPolicy {
    pub fn new(browser: Browser) -> Self {
        Self { browser }
    }

    pub fn browser(&self) -> Browser {
        self.browser
    }

    /// Can scripts run in a document loaded from `url`?
    pub fn can_inject(&self, url: &str) -> bool {
        if !is_http_url(url) {
            return false;
        }

        let host = match extract_host(url) {
            Some(host) if !host.is_empty() => host,
            _ => return false,
        };

        !self
            .browser
            .restricted_hostnames()
            .any(|restricted| restricted.eq_ignore_ascii_case(host))
    }
}
