//! Blob keys for uploaded images.
//!
//! Keys are deterministic so a row's `file_path` always points at the blob
//! written for it.

use crate::{Error, Result};

/// Reduce a client-supplied file name to its final path component.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(Error::validation("file_name", "must name a file"));
    }
    if base.chars().any(char::is_control) {
        return Err(Error::validation(
            "file_name",
            "must not contain control characters",
        ));
    }
    Ok(base.to_string())
}

/// Blob key for an image attached to a step.
pub fn step_image_key(manual_id: i64, step_id: i64, file_name: &str) -> String {
    format!("steps/manual_{manual_id}/step_{step_id}/image_{file_name}")
}

/// Blob key for a user's profile image. Only the extension of the upload is kept.
pub fn profile_image_key(user_id: i64, file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(stem, ext)| (stem, ext.to_ascii_lowercase()))
        .filter(|(stem, ext)| {
            !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|(_, ext)| format!(".{ext}"))
        .unwrap_or_default();
    format!("profiles/user_{user_id}{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("photo.png").unwrap(), "photo.png");
        assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_file_name(r"C:\Users\me\shot.jpg").unwrap(), "shot.jpg");
    }

    #[test]
    fn test_sanitize_rejects_empty_names() {
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("dir/").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("a/.").is_err());
        assert!(sanitize_file_name("bad\nname").is_err());
    }

    #[test]
    fn test_step_image_key() {
        assert_eq!(
            step_image_key(4, 19, "diagram.png"),
            "steps/manual_4/step_19/image_diagram.png"
        );
    }

    #[test]
    fn test_profile_image_key() {
        assert_eq!(profile_image_key(5, "me.JPG"), "profiles/user_5.jpg");
        assert_eq!(profile_image_key(5, "avatar"), "profiles/user_5");
        assert_eq!(profile_image_key(5, ".hidden"), "profiles/user_5");
    }
}
