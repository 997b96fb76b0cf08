//! Container image asset fingerprinting.
//!
//! The tag-manager image is built from a local Docker build context. Its
//! fingerprint is a SHA-256 over every file's relative path and contents,
//! walked in sorted order, so the image tag only changes when the context
//! does.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StackError, StackResult};

/// Repository the synthesized image reference points at.
pub const ASSET_REPOSITORY: &str = "sgtm-container-assets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub path: PathBuf,
    /// Hex SHA-256 of the build context.
    pub hash: String,
}

impl ImageAsset {
    /// Fingerprint the build context at `dir`.
    pub fn fingerprint(dir: &Path) -> StackResult<Self> {
        if !dir.is_dir() {
            return Err(StackError::AssetNotFound(dir.to_path_buf()));
        }
        if !dir.join("Dockerfile").is_file() {
            return Err(StackError::MissingDockerfile(dir.to_path_buf()));
        }

        let mut hasher = Sha256::new();
        let mut files = 0usize;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let bytes = std::fs::read(entry.path()).map_err(|source| StackError::Io {
                path: entry.path().to_path_buf(),
                source,
            })?;

            hasher.update(relative.as_bytes());
            hasher.update([0u8]);
            hasher.update(&bytes);
            hasher.update([0u8]);
            files += 1;
        }

        let hash = hex::encode(hasher.finalize());
        debug!(path = %dir.display(), files, hash = %hash, "fingerprinted image asset");
        Ok(Self {
            path: dir.to_path_buf(),
            hash,
        })
    }

    /// Image reference for a container definition, tagged with the hash.
    pub fn image_uri(&self) -> Value {
        json!({
            "Fn::Sub": format!(
                "${{AWS::AccountId}}.dkr.ecr.${{AWS::Region}}.${{AWS::URLSuffix}}/{ASSET_REPOSITORY}:{}",
                self.hash
            )
        })
    }
}
