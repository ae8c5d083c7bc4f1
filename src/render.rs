//! Placeholder substitution for template bodies.

use std::collections::BTreeMap;

/// Placeholders recognised by [`render`], in substitution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Day,
    Date,
    Time,
}

impl Placeholder {
    pub const ALL: [Placeholder; 3] = [Placeholder::Day, Placeholder::Date, Placeholder::Time];

    /// Field name callers use for this placeholder.
    pub fn key(self) -> &'static str {
        match self {
            Placeholder::Day => "DAY",
            Placeholder::Date => "DATE",
            Placeholder::Time => "TIME",
        }
    }

    /// Literal token as it appears in a body.
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Day => "{DAY}",
            Placeholder::Date => "{DATE}",
            Placeholder::Time => "{TIME}",
        }
    }
}

/// Replace `{DAY}`, `{DATE}` and `{TIME}` with the matching field, or with
/// nothing when the field is absent. Other `{...}` tokens and extra fields
/// are ignored.
pub fn render(body: &str, fields: &BTreeMap<String, String>) -> String {
    let mut out = body.to_string();
    for placeholder in Placeholder::ALL {
        let value = fields
            .get(placeholder.key())
            .map(String::as_str)
            .unwrap_or_default();
        out = out.replace(placeholder.token(), value);
    }
    out
}
