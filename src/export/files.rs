//! Write the attached and inline files of a decoded message to disk.

use std::path::{Path, PathBuf};

use crate::model::mail::Email;

/// Write every attached and inline file of `email` into `output_dir`.
///
/// Files keep their suggested name when they have one; otherwise a name is
/// derived from the media type. Existing files are never overwritten.
pub fn export_files(email: &Email, output_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut paths = Vec::new();

    let attached = email
        .attached_files
        .iter()
        .map(|f| (f.filename(), f.content_type.media_type.as_str(), &f.data));
    let inline = email
        .inline_files
        .iter()
        .map(|f| (f.filename(), f.content_type.media_type.as_str(), &f.data));

    for (index, (name, media_type, data)) in attached.chain(inline).enumerate() {
        let filename = match name {
            Some(name) => sanitize_filename_part(name, 150),
            None => fallback_name(index, media_type),
        };
        let path = unique_path(&output_dir.join(filename));
        std::fs::write(&path, data)?;
        tracing::debug!(path = %path.display(), size = data.len(), "Wrote file");
        paths.push(path);
    }

    Ok(paths)
}

/// `part_3.pdf` for an unnamed `application/pdf` part.
fn fallback_name(index: usize, media_type: &str) -> String {
    let subtype = media_type.rsplit('/').next().unwrap_or("bin");
    let ext = match subtype {
        "plain" => "txt",
        "octet-stream" => "bin",
        "jpeg" => "jpg",
        "pgp-signature" => "asc",
        "pkcs7-signature" | "x-pkcs7-signature" => "p7s",
        other => other,
    };
    format!("part_{}.{}", index + 1, sanitize_filename_part(ext, 20))
}

/// Replace anything that is not safe in a file name with `_`.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    // "." and ".." are not file names.
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    parent.join(format!("{stem}_dup.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::{AttachedFile, InlineFile};
    use crate::parser::params::{parse_content_disposition, parse_content_type};

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename_part("hello world", 20), "hello_world");
        assert_eq!(sanitize_filename_part("report.pdf", 30), "report.pdf");
        assert_eq!(sanitize_filename_part("../../etc/passwd", 30), ".._.._etc_passwd");
        assert_eq!(sanitize_filename_part("..", 20), "unknown");
        assert_eq!(sanitize_filename_part("", 20), "unknown");
    }

    #[test]
    fn test_fallback_name() {
        assert_eq!(fallback_name(0, "application/pdf"), "part_1.pdf");
        assert_eq!(fallback_name(2, "text/plain"), "part_3.txt");
    }

    #[test]
    fn test_export_files_writes_everything_without_overwriting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let email = Email {
            attached_files: vec![
                AttachedFile {
                    content_type: parse_content_type("application/pdf").value,
                    content_disposition: parse_content_disposition("attachment; filename=a.pdf")
                        .value,
                    data: b"one".to_vec(),
                },
                AttachedFile {
                    content_type: parse_content_type("application/pdf; name=a.pdf").value,
                    data: b"two".to_vec(),
                    ..AttachedFile::default()
                },
            ],
            inline_files: vec![InlineFile {
                content_type: parse_content_type("image/png").value,
                content_id: Some("img@x".to_string()),
                data: vec![0x89, b'P', b'N', b'G'],
                ..InlineFile::default()
            }],
            ..Email::default()
        };

        let paths = export_files(&email, dir.path()).expect("export");
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "a_1.pdf", "part_3.png"]);
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"two");
    }
}
