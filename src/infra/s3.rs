//! Artifact publishing to S3.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where published artifacts go.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishTarget {
    pub bucket: String,
    /// Key prefix without a trailing slash; empty for the bucket root.
    pub prefix: String,
    pub gzip: bool,
}

impl PublishTarget {
    /// Object key for a file relative to the published directory.
    pub fn object_key(&self, relative: &Path) -> String {
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = if self.gzip { format!("{name}.gz") } else { name };
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() { name } else { format!("{prefix}/{name}") }
    }
}

/// CSV and SVG files under `dir`, recursively, sorted by path.
pub fn collect_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("failed to list '{}'", current.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_artifact(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn is_artifact(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("csv") | Some("svg")
    )
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("svg") => "image/svg+xml",
        _ => "text/csv",
    }
}

/// Gzip-compresses `contents` when asked to, otherwise returns them as is.
pub fn encode_body(contents: Vec<u8>, gzip: bool) -> Result<Vec<u8>> {
    if !gzip {
        return Ok(contents);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&contents)?;
    Ok(encoder.finish()?)
}

/// Uploads every artifact under `dir`. Returns the number of objects written.
#[tracing::instrument(skip(client), fields(bucket = %target.bucket, gzip = target.gzip))]
pub async fn publish_artifacts(
    client: &aws_sdk_s3::Client,
    target: &PublishTarget,
    dir: &Path,
) -> Result<usize> {
    let artifacts = collect_artifacts(dir)?;
    let mut upload_count = 0;

    for path in &artifacts {
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let key = target.object_key(relative);
        let contents = std::fs::read(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        let body = encode_body(contents, target.gzip)?;

        let content_type = if target.gzip { "application/gzip" } else { content_type(path) };
        client
            .put_object()
            .bucket(&target.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("upload of '{key}' failed"))?;

        debug!(key = %key, "Artifact uploaded");
        upload_count += 1;
    }

    info!(upload_count, "S3 upload complete");
    Ok(upload_count)
}
