//! Stateless upload acceptance policy.
//!
//! [`FilterPolicy::accept`] is pure and deterministic given the policy
//! configuration, and total over its input: malformed metadata is a
//! [`FilterRejection::DisallowedType`], never a panic.

use regex::Regex;

use silo_shared::constants::MAX_UPLOAD_SIZE;
use silo_shared::UploadMetadata;

use crate::error::FilterRejection;

/// Type/size/policy checks applied before anything touches the platform.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    /// Accepted file extensions, lowercase, without the dot.  Empty means
    /// any extension is fine.
    pub allowed_extensions: Vec<String>,
    /// Hard size ceiling.
    pub max_size_bytes: u64,
    /// Patterns matched (case-insensitively) against file name and caption.
    pub banned_patterns: Vec<Regex>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: Vec::new(),
            max_size_bytes: MAX_UPLOAD_SIZE,
            banned_patterns: Vec::new(),
        }
    }
}

impl FilterPolicy {
    /// Build a policy from plain-string configuration.
    pub fn new(
        allowed_extensions: Vec<String>,
        max_size_bytes: u64,
        banned_patterns: &[String],
    ) -> Result<Self, regex::Error> {
        let banned = banned_patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_size_bytes,
            banned_patterns: banned,
        })
    }

    /// Decide whether an upload is accepted.
    pub fn accept(&self, metadata: &UploadMetadata) -> Result<(), FilterRejection> {
        if metadata.size_bytes > self.max_size_bytes {
            return Err(FilterRejection::TooLarge {
                size: metadata.size_bytes,
                max: self.max_size_bytes,
            });
        }

        let name = metadata.file_name.trim();
        if name.is_empty() {
            return Err(FilterRejection::DisallowedType("<unnamed>".to_string()));
        }

        if !self.allowed_extensions.is_empty() {
            let ext = name
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .unwrap_or_default();
            if !self.allowed_extensions.contains(&ext) {
                return Err(FilterRejection::DisallowedType(name.to_string()));
            }
        }

        let haystack = match &metadata.caption {
            Some(caption) => format!("{name} {caption}"),
            None => name.to_string(),
        };
        for pattern in &self.banned_patterns {
            if pattern.is_match(&haystack) {
                return Err(FilterRejection::PolicyBlocked(pattern.to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, size: u64, caption: Option<&str>) -> UploadMetadata {
        UploadMetadata {
            file_name: name.to_string(),
            caption: caption.map(str::to_string),
            size_bytes: size,
            mime_type: "application/octet-stream".to_string(),
        }
    }

    #[test]
    fn default_policy_accepts_ordinary_files() {
        let policy = FilterPolicy::default();
        assert!(policy.accept(&meta("movie.mkv", 700_000_000, None)).is_ok());
    }

    #[test]
    fn oversize_is_too_large() {
        let policy = FilterPolicy::new(vec![], 100, &[]).unwrap();
        assert_eq!(
            policy.accept(&meta("a.bin", 101, None)),
            Err(FilterRejection::TooLarge { size: 101, max: 100 })
        );
    }

    #[test]
    fn extension_allow_list_is_enforced() {
        let policy =
            FilterPolicy::new(vec!["mp4".into(), ".MKV".into()], 1_000, &[]).unwrap();
        assert!(policy.accept(&meta("a.mp4", 1, None)).is_ok());
        assert!(policy.accept(&meta("b.Mkv", 1, None)).is_ok());
        assert!(matches!(
            policy.accept(&meta("c.exe", 1, None)),
            Err(FilterRejection::DisallowedType(_))
        ));
        // No extension at all.
        assert!(matches!(
            policy.accept(&meta("README", 1, None)),
            Err(FilterRejection::DisallowedType(_))
        ));
    }

    #[test]
    fn malformed_metadata_is_disallowed_not_a_panic() {
        let policy = FilterPolicy::default();
        assert!(matches!(
            policy.accept(&meta("   ", 1, None)),
            Err(FilterRejection::DisallowedType(_))
        ));
    }

    #[test]
    fn banned_pattern_blocks_name_and_caption() {
        let policy = FilterPolicy::new(vec![], 1_000, &["cam\\s*rip".to_string()]).unwrap();
        assert!(matches!(
            policy.accept(&meta("Movie.CAMRip.mp4", 1, None)),
            Err(FilterRejection::PolicyBlocked(_))
        ));
        assert!(matches!(
            policy.accept(&meta("movie.mp4", 1, Some("cam rip quality"))),
            Err(FilterRejection::PolicyBlocked(_))
        ));
        assert!(policy.accept(&meta("movie.mp4", 1, Some("bluray"))).is_ok());
    }
}
