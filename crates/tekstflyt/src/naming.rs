//! Human-readable document names and output file names.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::types::DocumentType;

/// Norwegian short date used in names and the `{{dato}}` placeholder.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// `"{date} - Tilbud på {subject} til {recipient}"` and its siblings. The
/// recipient part is left out when there is no recipient.
pub fn document_name(
    document_type: DocumentType,
    date: NaiveDate,
    subject: &str,
    recipient: Option<&str>,
) -> String {
    let date = date.format(DATE_FORMAT);
    let recipient = recipient.map(str::trim).filter(|r| !r.is_empty());

    match (document_type, recipient) {
        (DocumentType::Offer | DocumentType::Rebranding, Some(r)) => {
            format!("{} - Tilbud på {} til {}", date, subject, r)
        }
        (DocumentType::Offer | DocumentType::Rebranding, None) => {
            format!("{} - Tilbud på {}", date, subject)
        }
        (DocumentType::Letter, Some(r)) => format!("{} - Brev til {} vedr. {}", date, r, subject),
        (DocumentType::Letter, None) => format!("{} - Brev vedr. {}", date, subject),
        (DocumentType::Note, _) => format!("{} - Notat vedr. {}", date, subject),
        (DocumentType::LetterReply, Some(r)) => {
            format!("{} - Svar til {} vedr. {}", date, r, subject)
        }
        (DocumentType::LetterReply, None) => format!("{} - Svar vedr. {}", date, subject),
        (DocumentType::ServiceAgreement, Some(r)) => {
            format!("{} - Serviceavtale {} for {}", date, subject, r)
        }
        (DocumentType::ServiceAgreement, None) => format!("{} - Serviceavtale {}", date, subject),
    }
}

struct TitlePatterns {
    date_prefix: Regex,
    offer: Regex,
    service: Regex,
}

fn patterns() -> &'static TitlePatterns {
    static PATTERNS: OnceLock<TitlePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TitlePatterns {
        date_prefix: Regex::new(r"^\d{2}\.\d{2}\.\d{4}\s*-\s*").expect("static regex"),
        offer: Regex::new(r"Tilbud på (.+)$").expect("static regex"),
        service: Regex::new(r"Serviceavtale (.+)$").expect("static regex"),
    })
}

/// The subject part of a document name, used for the `{{tittel}}`
/// placeholder. Only the exact recipient suffix (`" til <recipient>"`,
/// `" for <recipient>"`) is removed, so subjects such as "Luft til vann
/// varmepumpe" survive. Falls back to the name without its date prefix.
pub fn short_title(document_name: &str, recipient: Option<&str>) -> String {
    let patterns = patterns();
    let name = patterns.date_prefix.replace(document_name.trim(), "");
    let recipient = recipient.map(str::trim).filter(|r| !r.is_empty());

    if let Some((_, subject)) = name.split_once(" vedr. ") {
        return subject.trim().to_string();
    }
    for (pattern, joiner) in [(&patterns.offer, " til "), (&patterns.service, " for ")] {
        let Some(subject) = pattern.captures(&name).and_then(|c| c.get(1)) else {
            continue;
        };
        let subject = subject.as_str().trim();
        let subject = recipient
            .and_then(|r| subject.strip_suffix(&format!("{}{}", joiner, r)))
            .unwrap_or(subject);
        return subject.trim().to_string();
    }
    name.into_owned()
}

/// Keep alphanumerics and `._- `; everything else becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || "._- ".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// `<sanitized-name>_<yyyyMMdd_HHmmss>`, shared by all four artifacts of one
/// finalization.
pub fn file_stem(document_name: &str, timestamp: NaiveDateTime) -> String {
    let mut base = sanitize_filename(document_name);
    if base.is_empty() {
        base = "dokument".to_string();
    }
    format!("{}_{}", base, timestamp.format("%Y%m%d_%H%M%S"))
}
