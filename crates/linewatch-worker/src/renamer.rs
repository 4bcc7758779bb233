//! Original-to-server filename mapping.

/// Maps an uploaded file's original name to the name it is stored under.
///
/// The results document records this mapping for every detected image.
/// An upload pipeline that renames files on arrival supplies its own
/// implementation.
pub trait FilenameRenamer: Send + Sync {
    fn rename(&self, session_id: &str, original: &str) -> String;
}

/// Files are stored under their original names.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRenamer;

impl FilenameRenamer for IdentityRenamer {
    fn rename(&self, _session_id: &str, original: &str) -> String {
        original.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert_eq!(IdentityRenamer.rename("s1", "DJI_0042.JPG"), "DJI_0042.JPG");
    }
}
