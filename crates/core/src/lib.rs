#![forbid(unsafe_code)]

pub mod export;
pub mod filter;
pub mod history;
pub mod ids;
pub mod model;

pub use export::{CSV_HEADER, CsvOptions, receipts_to_csv};
pub use filter::ReceiptFilter;
pub use history::{HistoryView, ProviderSummary, merge_history};
pub use ids::{CertId, CertIdError, DEFAULT_CERT_ID, Provider};
pub use model::{Evidence, EvidenceUpdate, NewReceipt, Receipt, ReceiptKey};
