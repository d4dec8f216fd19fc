#![forbid(unsafe_code)]

use crate::model::Receipt;
use std::borrow::Cow;

pub const CSV_HEADER: [&str; 5] = ["#", "Provider", "Status", "TXID", "Time"];

const BOM: char = '\u{feff}';
const ZERO_WIDTH_SPACE: char = '\u{200b}';

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CsvOptions {
    /// Prefix txids with a zero-width space so spreadsheets keep them as text.
    pub text_txid: bool,
}

/// Renders receipts in the given order as a BOM-prefixed, CRLF-terminated CSV document.
pub fn receipts_to_csv<'a>(
    receipts: impl IntoIterator<Item = &'a Receipt>,
    options: CsvOptions,
) -> String {
    let mut out = String::new();
    out.push(BOM);
    push_row(&mut out, CSV_HEADER.iter().copied());

    for (index, receipt) in receipts.into_iter().enumerate() {
        let number = (index + 1).to_string();
        let txid = match receipt.txid.as_deref() {
            Some(txid) if options.text_txid && !txid.is_empty() => {
                format!("{ZERO_WIDTH_SPACE}{txid}")
            }
            Some(txid) => txid.to_string(),
            None => String::new(),
        };
        push_row(
            &mut out,
            [
                number.as_str(),
                receipt.provider.as_str(),
                receipt.status.as_str(),
                txid.as_str(),
                receipt.created_at.as_str(),
            ],
        );
    }
    out
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field));
    }
    out.push_str("\r\n");
}

pub fn escape_field(value: &str) -> Cow<'_, str> {
    if !value.contains([',', '"', '\r', '\n']) {
        return Cow::Borrowed(value);
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    Cow::Owned(quoted)
}
