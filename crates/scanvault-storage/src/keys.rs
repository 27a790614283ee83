//! Object naming shared by all backends.

use std::path::Path;

use uuid::Uuid;

/// Lower-cased extension of `filename` including the dot, or an empty string.
///
/// Only ASCII alphanumeric extensions are kept so a hostile filename can never
/// contribute path separators to a backend object name.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Backend object name: `{file_id}{extension}`.
pub fn object_name(file_id: Uuid, filename: &str) -> String {
    format!("{}{}", file_id, file_extension(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(file_extension("Report.PDF"), ".pdf");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
    }

    #[test]
    fn test_hostile_extensions_dropped() {
        assert_eq!(file_extension("noext"), "");
        assert_eq!(file_extension("evil.t/xt"), "");
        assert_eq!(file_extension("dots..."), "");
    }

    #[test]
    fn test_object_name_uses_file_id() {
        let id = Uuid::nil();
        assert_eq!(
            object_name(id, "note.txt"),
            "00000000-0000-0000-0000-000000000000.txt"
        );
    }
}
