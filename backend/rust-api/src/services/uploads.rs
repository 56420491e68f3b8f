use std::path::Path;

use anyhow::Context;
use tokio::fs;
use uuid::Uuid;

use crate::error::ApiError;

/// Persist an uploaded file under the uploads directory. The stored name is
/// a UUID prefix plus a sanitized version of the client's filename, so
/// uploads can never collide or escape the directory.
pub async fn save_upload(
    uploads_dir: &str,
    original_name: &str,
    data: &[u8],
) -> Result<String, ApiError> {
    fs::create_dir_all(uploads_dir)
        .await
        .context("Failed to create uploads directory")
        .map_err(ApiError::Internal)?;

    let filename = format!("{}-{}", Uuid::new_v4(), sanitize_filename(original_name));
    let path = Path::new(uploads_dir).join(&filename);

    fs::write(&path, data)
        .await
        .with_context(|| format!("Failed to write upload {}", path.display()))
        .map_err(ApiError::Internal)?;

    Ok(filename)
}

/// Keep only characters that are safe in a filename; everything else
/// (separators, path tricks, control characters) becomes an underscore.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize_filename("avatar.png"), "avatar.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_filename("..."), "file");
    }

    #[tokio::test]
    async fn save_upload_writes_file_with_unique_name() {
        let dir = std::env::temp_dir().join(format!("uploads-test-{}", Uuid::new_v4()));
        let dir_str = dir.to_str().unwrap();

        let first = save_upload(dir_str, "avatar.png", b"png-bytes").await.unwrap();
        let second = save_upload(dir_str, "avatar.png", b"png-bytes").await.unwrap();

        assert_ne!(first, second);
        assert!(first.ends_with("avatar.png"));

        let stored = fs::read(dir.join(&first)).await.unwrap();
        assert_eq!(stored, b"png-bytes");

        let _ = fs::remove_dir_all(&dir).await;
    }
}
