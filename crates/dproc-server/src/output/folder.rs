//! Filesystem folder destination

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use dproc_common::types::{DestinationType, OutputDestination};
use tracing::{debug, info};

use super::handler::{OutputContent, OutputHandler, WriteError, Written};
use super::template::{expand, timestamped, TemplateContext, DEFAULT_FILE_NAME_PATTERN, DEFAULT_SUBFOLDER_PATTERN};

#[derive(Debug, Clone, Copy, Default)]
pub struct FolderOutputHandler;

impl FolderOutputHandler {
    pub fn new() -> Self {
        Self
    }
}

async fn exists(path: &Path) -> Result<bool, WriteError> {
    Ok(tokio::fs::try_exists(path).await?)
}

/// A free path for `name` in `dir` when overwriting is disabled.
async fn collision_free(dir: &Path, name: &str) -> Result<PathBuf, WriteError> {
    let candidate = dir.join(name);
    if !exists(&candidate).await? {
        return Ok(candidate);
    }

    let renamed = timestamped(name, Utc::now());
    let mut candidate = dir.join(&renamed);
    let mut counter = 1;
    while exists(&candidate).await? {
        candidate = dir.join(format!("{}_{counter}", renamed));
        counter += 1;
    }
    debug!(original = name, renamed = %candidate.display(), "Target exists, writing under a new name");
    Ok(candidate)
}

#[async_trait]
impl OutputHandler for FolderOutputHandler {
    fn can_handle(&self, destination_type: DestinationType) -> bool {
        destination_type == DestinationType::Folder
    }

    async fn write(
        &self,
        destination: &OutputDestination,
        content: &OutputContent,
    ) -> Result<Written, WriteError> {
        let config = destination.folder_config.as_ref().ok_or_else(|| {
            WriteError::Permanent(format!("destination '{}' has no folder configuration", destination.id))
        })?;
        if config.path.trim().is_empty() {
            return Err(WriteError::Permanent(format!(
                "destination '{}' has an empty folder path",
                destination.id
            )));
        }

        let ctx = TemplateContext::for_content(content);
        let mut dir = PathBuf::from(&config.path);
        if config.create_subfolders {
            let pattern = config
                .subfolder_pattern
                .as_deref()
                .unwrap_or(DEFAULT_SUBFOLDER_PATTERN);
            dir.push(expand(pattern, &ctx));
        }
        tokio::fs::create_dir_all(&dir).await?;

        let name = expand(
            config
                .file_name_pattern
                .as_deref()
                .unwrap_or(DEFAULT_FILE_NAME_PATTERN),
            &ctx,
        );
        let target = if config.overwrite_existing {
            dir.join(&name)
        } else {
            collision_free(&dir, &name).await?
        };

        tokio::fs::write(&target, &content.bytes).await?;
        info!(
            destination = %destination.name,
            path = %target.display(),
            bytes = content.bytes.len(),
            "Wrote output file"
        );

        Ok(Written {
            bytes_written: content.bytes.len(),
            location: target.display().to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use dproc_common::types::FolderOutputConfig;
    use dproc_convert::SourceFormat;

    fn destination(path: &Path, overwrite: bool) -> OutputDestination {
        serde_json::from_value(serde_json::json!({
            "id": "d1",
            "name": "archive",
            "type": "folder",
            "folderConfig": {"path": path, "overwriteExisting": overwrite}
        }))
        .unwrap()
    }

    fn content(name: &str, body: &str) -> OutputContent {
        OutputContent {
            bytes: body.as_bytes().to_vec(),
            format: SourceFormat::Json,
            original_file_name: name.into(),
            data_source_id: "ds".into(),
            data_source_name: "Orders".into(),
            correlation_id: "c".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_creates_folder_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/out");
        let written = FolderOutputHandler
            .write(&destination(&root, false), &content("orders.csv", "[]"))
            .await
            .unwrap();
        assert_eq!(written.bytes_written, 2);
        assert_eq!(std::fs::read_to_string(root.join("orders.json")).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_existing_file_is_kept_when_overwrite_disabled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.json"), "old").unwrap();

        let written = FolderOutputHandler
            .write(&destination(dir.path(), false), &content("out.json", "new"))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("out.json")).unwrap(), "old");
        let name = Path::new(&written.location).file_name().unwrap().to_str().unwrap().to_string();
        let stamp = name.strip_prefix("out_").unwrap().strip_suffix(".json").unwrap();
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.json"), "old").unwrap();
        FolderOutputHandler
            .write(&destination(dir.path(), true), &content("out.json", "new"))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("out.json")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_subfolders_and_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let mut dest = destination(dir.path(), false);
        dest.folder_config = Some(FolderOutputConfig {
            path: dir.path().display().to_string(),
            file_name_pattern: Some("{datasource}-{filename}.{ext}".into()),
            create_subfolders: true,
            subfolder_pattern: Some("{datasource}/{year}".into()),
            overwrite_existing: false,
        });
        let item = content("orders.csv", "[]");
        FolderOutputHandler.write(&dest, &item).await.unwrap();

        let year = item.created_at.format("%Y").to_string();
        assert!(dir.path().join("Orders").join(year).join("Orders-orders.json").exists());
    }

    #[tokio::test]
    async fn test_file_name_cannot_leave_destination_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("exports").join("orders");

        for overwrite in [true, false] {
            let written = FolderOutputHandler
                .write(&destination(&root, overwrite), &content("../../escaped.csv", "[]"))
                .await
                .unwrap();
            assert!(Path::new(&written.location).starts_with(&root));
        }

        assert!(root.join("escaped.json").exists());
        assert!(!dir.path().join("escaped.json").exists());
    }

    #[tokio::test]
    async fn test_missing_config_is_permanent() {
        let mut dest = destination(Path::new("/tmp"), false);
        dest.folder_config = None;
        let err = FolderOutputHandler.write(&dest, &content("a.json", "[]")).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
