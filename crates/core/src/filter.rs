#![forbid(unsafe_code)]

use crate::model::Receipt;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Term {
    Provider(String),
    Status(String),
    Txid(String),
    Text(String),
}

/// Keyword filter over receipts.
///
/// Whitespace-separated tokens are ANDed. `provider:` and `status:` match the field exactly
/// (ignoring case), `txid:` matches a substring, and any other token must appear in the
/// provider, status or txid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceiptFilter {
    terms: Vec<Term>,
}

impl ReceiptFilter {
    pub fn parse(raw: &str) -> Self {
        let mut terms = Vec::new();
        for token in raw.split_whitespace() {
            let token = token.to_lowercase();
            let term = match token.split_once(':') {
                Some((_, "")) => continue,
                Some(("provider", value)) => Term::Provider(value.to_string()),
                Some(("status", value)) => Term::Status(value.to_string()),
                Some(("txid", value)) => Term::Txid(value.to_string()),
                _ => Term::Text(token),
            };
            terms.push(term);
        }
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, receipt: &Receipt) -> bool {
        let provider = receipt.provider.as_str().to_lowercase();
        let status = receipt.status.to_lowercase();
        let txid = receipt.txid_str().to_lowercase();
        self.terms.iter().all(|term| match term {
            Term::Provider(value) => provider == *value,
            Term::Status(value) => status == *value,
            Term::Txid(value) => txid.contains(value.as_str()),
            Term::Text(value) => {
                provider.contains(value.as_str())
                    || status.contains(value.as_str())
                    || txid.contains(value.as_str())
            }
        })
    }

    pub fn apply<'a>(&self, receipts: &'a [Receipt]) -> Vec<&'a Receipt> {
        receipts.iter().filter(|r| self.matches(r)).collect()
    }
}
