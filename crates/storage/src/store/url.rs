#![forbid(unsafe_code)]

use std::path::PathBuf;

/// Database connection string.
///
/// Accepts SQLAlchemy-style `sqlite:///relative.db` and `sqlite:////abs/path.db`, `file:` URLs
/// and bare paths. Server databases are recognised but not supported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DbUrl {
    Sqlite(PathBuf),
    Unsupported { scheme: String },
}

impl DbUrl {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("sqlite://") {
            // `sqlite:///x` leaves `/x` (relative x); `sqlite:////x` leaves `//x` (absolute /x).
            let path = rest.strip_prefix('/').unwrap_or(rest);
            if path.is_empty() || path == ":memory:" {
                return Self::Unsupported {
                    scheme: "sqlite-memory".to_string(),
                };
            }
            let path = path.split('?').next().unwrap_or(path);
            return Self::Sqlite(PathBuf::from(path));
        }
        if let Some(rest) = raw.strip_prefix("file:") {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            return Self::Sqlite(PathBuf::from(path));
        }
        if let Some((scheme, _)) = raw.split_once("://") {
            return Self::Unsupported {
                scheme: scheme.to_ascii_lowercase(),
            };
        }
        Self::Sqlite(PathBuf::from(raw))
    }
}
