//! Discovery and parsing of donation documents from disk (§6.5 layout:
//! one `<handler>.json` file per handler, living alongside the handler's
//! own source under the donations root).

use std::path::Path;

use va_domain::error::{Error, Result};

use crate::types::HandlerDonation;

/// Parse a single donation document from its JSON contents.
pub fn parse_donation(handler_domain: &str, content: &str) -> Result<HandlerDonation> {
    let mut donation: HandlerDonation = serde_json::from_str(content)?;
    if donation.handler_domain.is_empty() {
        donation.handler_domain = handler_domain.to_owned();
    }
    for method in &mut donation.method_donations {
        method.handler_domain = donation.handler_domain.clone();
        method.full_intent_name = format!("{}.{}", donation.handler_domain, method.intent_suffix);
    }
    Ok(donation)
}

/// Load one handler's donation file, identified by `<root>/<handler>.json`.
pub fn load_handler_donation(root: &Path, handler_domain: &str) -> Result<HandlerDonation> {
    let path = root.join(format!("{handler_domain}.json"));
    let content = std::fs::read_to_string(&path)?;
    parse_donation(handler_domain, &content)
}

/// Scan a donations root directory and parse every `*.json` file found
/// there. Files that fail to parse are skipped with a warning rather than
/// aborting the whole scan — a single malformed donation should not take
/// down every other handler's recognition.
pub fn scan_donations(root: &Path) -> Result<Vec<HandlerDonation>> {
    let mut donations = Vec::new();
    if !root.exists() {
        return Ok(donations);
    }
    let read_dir = std::fs::read_dir(root)?;
    for entry in read_dir {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let handler_domain = match path.file_stem().and_then(|s| s.to_str()) {
            Some(s) => s.to_owned(),
            None => continue,
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable donation file");
                continue;
            }
        };
        match parse_donation(&handler_domain, &content) {
            Ok(donation) => donations.push(donation),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed donation document");
                continue;
            }
        }
    }
    donations.sort_by(|a, b| a.handler_domain.cmp(&b.handler_domain));
    Ok(donations)
}

/// Strict variant used at startup when every enabled handler is expected
/// to have a donation document: any handler named in `expected_handlers`
/// with no corresponding file is a fatal error.
pub fn scan_donations_strict(root: &Path, expected_handlers: &[String]) -> Result<Vec<HandlerDonation>> {
    let donations = scan_donations(root)?;
    for handler in expected_handlers {
        if !donations.iter().any(|d| &d.handler_domain == handler) {
            return Err(Error::DonationSchema {
                handler: handler.clone(),
                message: "no donation document found for enabled handler".to_owned(),
            });
        }
    }
    Ok(donations)
}
