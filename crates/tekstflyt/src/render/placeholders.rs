//! The `{{name}}` tokens a template may contain and their values for one
//! document.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::naming::{short_title, DATE_FORMAT};
use crate::types::Document;

/// Paragraph holding this token is replaced by the rendered body.
pub const BODY_TOKEN: &str = "{{innhold}}";

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderValues {
    entries: Vec<(&'static str, String)>,
}

impl PlaceholderValues {
    pub fn for_document(doc: &Document, today: NaiveDate) -> Self {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            entries: vec![
                ("{{dato}}", today.format(DATE_FORMAT).to_string()),
                ("{{mottaker_navn}}", field(&doc.recipient_name)),
                ("{{mottaker_adresse}}", field(&doc.recipient_address)),
                ("{{mottaker_postnr}}", field(&doc.recipient_postal_code)),
                ("{{mottaker_poststed}}", field(&doc.recipient_city)),
                ("{{kontaktperson}}", field(&doc.recipient_person)),
                ("{{telefon}}", field(&doc.recipient_phone)),
                ("{{epost}}", field(&doc.recipient_email)),
                ("{{tittel}}", short_title(&doc.document_name, doc.recipient_name.as_deref())),
                ("{{dokumentnavn}}", doc.document_name.clone()),
                ("{{pris_produkt}}", format_price(doc.price_product)),
                ("{{pris_installasjon}}", format_price(doc.price_installation)),
            ],
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(token, _)| *token)
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, v)| v.as_str())
    }

    pub fn matches(&self, text: &str) -> bool {
        self.entries.iter().any(|(token, _)| text.contains(token))
    }

    /// Replace every known token. Unknown `{{...}}` text is left alone.
    pub fn apply(&self, text: &str) -> String {
        self.entries
            .iter()
            .fold(text.to_string(), |acc, (token, value)| {
                if acc.contains(token) {
                    acc.replace(token, value)
                } else {
                    acc
                }
            })
    }
}

/// `1,500.00 kr`; an absent price renders empty.
pub fn format_price(price: Option<Decimal>) -> String {
    match price {
        Some(p) => format!("{} kr", group_thousands(p)),
        None => String::new(),
    }
}

fn group_thousands(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let formatted = format!("{:.2}", rounded.abs());
    let (integer, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}{}.{}", sign, grouped, fraction)
}
