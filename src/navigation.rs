//! Decides where a navigation requested by the hosted page ends up.
//!
//! Only requests to open a new window are classified; ordinary in-window
//! navigation proceeds untouched.

use std::sync::LazyLock;

use log::{debug, info};
use regex::Regex;
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::config::{Config, ConfigStore, origin_of};
use crate::model::ConfirmAnswer;

pub const MAIL_HOST: &str = "mail.google.com";
pub const IDENTITY_HOST: &str = "accounts.google.com";
pub const HOME_URL: &str = "https://mail.google.com";

/// External links shown in the confirmation prompt are cut to this length.
const PROMPT_URL_MAX_CHARS: usize = 80;

/// Only these are handed to the OS opener.
const OPENABLE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

static ACCOUNT_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mail/u/(\d+)").expect("account segment pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Load the target in the main window (account switch, sign-in flow).
    ContinueInWindow,
    /// Same mailbox session: no new window and nothing else to do.
    StayInSession,
    /// Never open in the managed window; hand to the OS after the trust policy.
    DelegateToSystemBrowser,
}

/// Local account index from `.../mail/u/<digits>/...`. `None` is "no account
/// context", which is distinct from index 0.
pub fn account_id(url: &str) -> Option<&str> {
    ACCOUNT_SEGMENT
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_ascii_lowercase)
}

/// Classifies a new-window request coming from the page at `current_url`.
pub fn classify(target_url: &str, current_url: &str) -> NavigationDecision {
    match host_of(target_url).as_deref() {
        Some(IDENTITY_HOST) => NavigationDecision::ContinueInWindow,
        Some(MAIL_HOST) => {
            if account_id(target_url) == account_id(current_url) {
                NavigationDecision::StayInSession
            } else {
                NavigationDecision::ContinueInWindow
            }
        }
        _ => NavigationDecision::DelegateToSystemBrowser,
    }
}

/// Unwraps Google redirect links (`https://www.google.com/url?q=<target>`).
pub fn clean_google_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let is_google = matches!(parsed.host_str(), Some("www.google.com" | "google.com"));
    if !is_google || parsed.path() != "/url" {
        return url.to_string();
    }
    parsed
        .query_pairs()
        .find(|(key, _)| key == "q" || key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|target| Url::parse(target).is_ok())
        .unwrap_or_else(|| url.to_string())
}

/// Compose URL opened in a satellite window for a `mailto:` link.
pub fn compose_url(mailto: &str) -> String {
    let encoded: String = byte_serialize(mailto.as_bytes()).collect();
    format!("{}/mail/?extsrc=mailto&url={}", HOME_URL, encoded)
}

pub fn is_mailto(url: &str) -> bool {
    url.get(..7).is_some_and(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalLinkPolicy {
    Open(String),
    Confirm { url: String, origin: String },
    Rejected,
}

/// Runs the external-link policy against the current configuration.
pub fn external_link_policy(url: &str, config: &Config) -> ExternalLinkPolicy {
    let cleaned = clean_google_url(url);
    let scheme = match Url::parse(&cleaned) {
        Ok(parsed) => parsed.scheme().to_string(),
        Err(_) => {
            debug!("Rejecting unparsable external link {:?}", url);
            return ExternalLinkPolicy::Rejected;
        }
    };
    if !OPENABLE_SCHEMES.contains(&scheme.as_str()) {
        debug!("Rejecting external link with scheme {:?}", scheme);
        return ExternalLinkPolicy::Rejected;
    }
    let Some(origin) = origin_of(&cleaned) else {
        // mailto: has no origin to trust; it only opens after confirmation.
        return if config.confirm_external_links {
            ExternalLinkPolicy::Confirm {
                url: cleaned.clone(),
                origin: cleaned,
            }
        } else {
            ExternalLinkPolicy::Open(cleaned)
        };
    };

    if !config.confirm_external_links || config.is_trusted(&origin) {
        ExternalLinkPolicy::Open(cleaned)
    } else {
        ExternalLinkPolicy::Confirm { url: cleaned, origin }
    }
}

/// Applies the user's answer to a confirmation prompt. Returns the URL to
/// open, if any; "open and trust" persists the origin first.
pub fn resolve_confirmation(
    url: String,
    origin: &str,
    answer: ConfirmAnswer,
    config: &ConfigStore,
) -> Option<String> {
    match answer {
        ConfirmAnswer::Cancel => {
            debug!("External link to {} declined", origin);
            None
        }
        ConfirmAnswer::Open => Some(url),
        ConfirmAnswer::OpenAndTrust => {
            if origin_of(origin).as_deref() == Some(origin) {
                info!("Trusting all links on {}", origin);
                config.set(|c| {
                    if !c.is_trusted(origin) {
                        c.trusted_hosts.push(origin.to_string());
                    }
                });
            }
            Some(url)
        }
    }
}

/// Prompt detail text: the link, shortened when long.
pub fn prompt_detail(url: &str) -> String {
    if url.chars().count() > PROMPT_URL_MAX_CHARS {
        let head: String = url.chars().take(PROMPT_URL_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_account_segment() {
        assert_eq!(account_id("https://mail.google.com/mail/u/0/#inbox"), Some("0"));
        assert_eq!(account_id("https://mail.google.com/mail/u/12/#sent"), Some("12"));
        assert_eq!(account_id("https://mail.google.com/mail/#inbox"), None);
    }

    #[test]
    fn account_switch_continues_in_window() {
        assert_eq!(
            classify(
                "https://mail.google.com/mail/u/1/#inbox",
                "https://mail.google.com/mail/u/0/#inbox"
            ),
            NavigationDecision::ContinueInWindow
        );
        // Absent context differs from index 0.
        assert_eq!(
            classify("https://mail.google.com/mail/u/0/", "https://mail.google.com/mail/"),
            NavigationDecision::ContinueInWindow
        );
    }

    #[test]
    fn same_account_stays_in_session() {
        assert_eq!(
            classify(
                "https://mail.google.com/mail/u/0/#label/x",
                "https://mail.google.com/mail/u/0/#inbox"
            ),
            NavigationDecision::StayInSession
        );
        assert_eq!(
            classify("https://mail.google.com/mail/?view=cm", "https://mail.google.com/mail/"),
            NavigationDecision::StayInSession
        );
    }

    #[test]
    fn identity_provider_continues_in_window() {
        assert_eq!(
            classify(
                "https://accounts.google.com/AddSession?service=mail",
                "https://mail.google.com/mail/u/0/"
            ),
            NavigationDecision::ContinueInWindow
        );
    }

    #[test]
    fn other_hosts_are_delegated() {
        for target in [
            "https://example.com",
            "https://mail.google.com.evil.test/mail/u/1",
            "http://accounts.google.com.example.org",
        ] {
            assert_eq!(
                classify(target, "https://mail.google.com/mail/u/0/"),
                NavigationDecision::DelegateToSystemBrowser,
                "{target}"
            );
        }
    }

    #[test]
    fn google_redirects_are_unwrapped() {
        assert_eq!(
            clean_google_url("https://www.google.com/url?q=https://example.com/a%3Fb%3D1&sa=D"),
            "https://example.com/a?b=1"
        );
        assert_eq!(
            clean_google_url("https://www.google.com/search?q=rust"),
            "https://www.google.com/search?q=rust"
        );
        assert_eq!(clean_google_url("not a url"), "not a url");
    }

    #[test]
    fn untrusted_origin_requires_confirmation_until_trusted() {
        let store = ConfigStore::in_memory(Config::default());
        let first = external_link_policy("https://example.com", &store.snapshot());
        let ExternalLinkPolicy::Confirm { url, origin } = first else {
            panic!("expected confirmation, got {first:?}");
        };
        assert_eq!(origin, "https://example.com");

        let opened = resolve_confirmation(url, &origin, ConfirmAnswer::OpenAndTrust, &store);
        assert_eq!(opened.as_deref(), Some("https://example.com"));
        assert_eq!(
            external_link_policy("https://example.com/any/path?x=1", &store.snapshot()),
            ExternalLinkPolicy::Open("https://example.com/any/path?x=1".into())
        );
    }

    #[test]
    fn plain_open_and_cancel_do_not_trust() {
        let store = ConfigStore::in_memory(Config::default());
        let url = "https://example.com/".to_string();
        assert_eq!(
            resolve_confirmation(url.clone(), "https://example.com", ConfirmAnswer::Open, &store),
            Some(url.clone())
        );
        assert_eq!(
            resolve_confirmation(url, "https://example.com", ConfirmAnswer::Cancel, &store),
            None
        );
        assert!(store.get(|c| c.trusted_hosts.is_empty()));
    }

    #[test]
    fn confirmation_disabled_opens_directly() {
        let config = Config {
            confirm_external_links: false,
            ..Config::default()
        };
        assert_eq!(
            external_link_policy("https://example.com/x", &config),
            ExternalLinkPolicy::Open("https://example.com/x".into())
        );
        assert_eq!(external_link_policy("::nope", &config), ExternalLinkPolicy::Rejected);
    }

    #[test]
    fn only_web_and_mail_schemes_reach_the_os() {
        let config = Config {
            confirm_external_links: false,
            ..Config::default()
        };
        for url in [
            "file:///etc/passwd",
            "javascript:alert(1)",
            "ms-settings:privacy",
            "smb://server/share",
            "https://www.google.com/url?q=file:///C:/Windows/System32/calc.exe",
        ] {
            assert_eq!(external_link_policy(url, &config), ExternalLinkPolicy::Rejected, "{url}");
        }
        assert_eq!(
            external_link_policy("mailto:a@b.com", &config),
            ExternalLinkPolicy::Open("mailto:a@b.com".into())
        );
        assert_eq!(
            external_link_policy("http://example.com", &Config::default()),
            ExternalLinkPolicy::Confirm {
                url: "http://example.com".into(),
                origin: "http://example.com".into()
            }
        );
    }

    #[test]
    fn mailto_becomes_compose_url() {
        assert!(is_mailto("MAILTO:someone@example.com"));
        assert!(!is_mailto("https://example.com"));
        assert_eq!(
            compose_url("mailto:a@b.com?subject=Hi there"),
            "https://mail.google.com/mail/?extsrc=mailto&url=mailto%3Aa%40b.com%3Fsubject%3DHi+there"
        );
    }

    #[test]
    fn prompt_detail_is_truncated() {
        let long = format!("https://example.com/{}", "a".repeat(100));
        let detail = prompt_detail(&long);
        assert!(detail.ends_with("..."));
        assert_eq!(detail.chars().count(), PROMPT_URL_MAX_CHARS + 3);
        assert_eq!(prompt_detail("https://x.y"), "https://x.y");
    }
}
