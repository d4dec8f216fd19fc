#![forbid(unsafe_code)]

//! External programs behind the provenance endpoints: `c2patool` for manifest signing and
//! `openssl ts` for RFC 3161 timestamp queries.

use crate::support::random_hex;
use serde_json::json;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Program names or paths. A bare name is looked up on `PATH`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPaths {
    pub c2patool: String,
    pub openssl: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            c2patool: "c2patool".to_string(),
            openssl: "openssl".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} not found; install it or configure its path")]
    Missing(String),

    #[error("{tool} failed: {detail}")]
    Failed { tool: String, detail: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryDigest {
    Sha256,
    Sha512,
}

impl QueryDigest {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    fn flag(self) -> &'static str {
        match self {
            Self::Sha256 => "-sha256",
            Self::Sha512 => "-sha512",
        }
    }
}

/// Resolves `program` to an executable file, searching `PATH` for bare names.
pub fn locate(program: &str) -> Option<PathBuf> {
    let program = program.trim();
    if program.is_empty() {
        return None;
    }
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension("exe");
        (cfg!(windows) && exe.is_file()).then_some(exe)
    })
}

pub fn require(program: &str) -> Result<PathBuf, ToolError> {
    locate(program).ok_or_else(|| ToolError::Missing(program.to_string()))
}

/// `photo.png` becomes `photo-signed.png` in the same directory.
pub fn signed_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}-signed.{}", ext.to_string_lossy()),
        None => format!("{stem}-signed"),
    };
    input.with_file_name(name)
}

pub struct SignJob<'a> {
    pub input: &'a Path,
    pub signer_cert: &'a Path,
    pub signer_key: &'a Path,
    /// Claim definition; a generic demo manifest is used when absent.
    pub manifest: Option<&'a Path>,
    pub output: &'a Path,
}

/// Embeds a signed provenance manifest into `job.input`, writing `job.output`. Returns the
/// tool's stdout.
pub async fn c2pa_sign(program: &Path, job: &SignJob<'_>) -> Result<String, ToolError> {
    let scratch = match job.manifest {
        Some(_) => None,
        None => Some(write_default_manifest().await?),
    };
    let manifest = job.manifest.or(scratch.as_deref()).unwrap_or(Path::new(""));

    let output = Command::new(program)
        .arg(job.input)
        .arg("--signcert")
        .arg(job.signer_cert)
        .arg("--signkey")
        .arg(job.signer_key)
        .arg("--out")
        .arg(job.output)
        .arg("-m")
        .arg(manifest)
        .output()
        .await;
    if let Some(path) = &scratch {
        let _ = tokio::fs::remove_file(path).await;
    }
    let output = output?;
    if !output.status.success() {
        return Err(failure("c2patool", &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Builds a DER timestamp query for `data` with `openssl ts -query` and returns its bytes.
pub async fn timestamp_query(
    program: &Path,
    data: &Path,
    digest: QueryDigest,
) -> Result<Vec<u8>, ToolError> {
    let out = std::env::temp_dir().join(format!("vu_tsq_{}.tsq", random_hex(8)));
    let output = Command::new(program)
        .args(["ts", "-query", "-data"])
        .arg(data)
        .arg(digest.flag())
        .args(["-cert", "-out"])
        .arg(&out)
        .output()
        .await?;
    if !output.status.success() {
        let _ = tokio::fs::remove_file(&out).await;
        return Err(failure("openssl ts -query", &output));
    }
    let bytes = tokio::fs::read(&out).await;
    let _ = tokio::fs::remove_file(&out).await;
    Ok(bytes?)
}

fn failure(tool: &str, output: &std::process::Output) -> ToolError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let detail = if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr
    };
    ToolError::Failed {
        tool: tool.to_string(),
        detail,
    }
}

async fn write_default_manifest() -> Result<PathBuf, ToolError> {
    let manifest = json!({
        "claim_generator": "verify-upgrade",
        "format": "image/png",
        "assertions": [
            {
                "label": "stds.schema-org.CreativeWork",
                "data": { "author": "verify-upgrade", "about": "Evidence upgrade" }
            },
            {
                "label": "stds.iptc.photo-metadata",
                "data": { "title": "Evidence upgrade", "caption": "Signed via c2patool" }
            }
        ]
    });
    let path = std::env::temp_dir().join(format!("vu_manifest_{}.json", random_hex(8)));
    let body = serde_json::to_vec_pretty(&manifest).map_err(std::io::Error::other)?;
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_output_keeps_extension() {
        assert_eq!(
            signed_output_path(Path::new("/tmp/a/photo.png")),
            PathBuf::from("/tmp/a/photo-signed.png")
        );
        assert_eq!(
            signed_output_path(Path::new("notes")),
            PathBuf::from("notes-signed")
        );
    }

    #[test]
    fn digest_names() {
        assert_eq!(QueryDigest::parse(" SHA512 "), Some(QueryDigest::Sha512));
        assert_eq!(QueryDigest::parse("md5"), None);
    }

    #[test]
    fn missing_programs_are_reported() {
        assert!(locate("").is_none());
        assert!(locate("/definitely/not/here/c2patool").is_none());
        assert!(matches!(
            require("vu-no-such-tool-on-path"),
            Err(ToolError::Missing(name)) if name == "vu-no-such-tool-on-path"
        ));
    }
}
