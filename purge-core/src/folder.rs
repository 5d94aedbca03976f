use std::collections::BTreeSet;

/// File name whose presence under a top-level folder condemns that folder.
pub const DEFAULT_MARKER: &str = "deletion-mark.json";

/// Owning folder of a key: everything before the first '/', or the whole key.
pub fn top_level_segment(key: &str) -> &str {
    key.split_once('/').map_or(key, |(head, _)| head)
}

/// Last path element of a key. Trailing slashes are ignored, so
/// `a/b/` yields `b`.
pub fn base_name(key: &str) -> &str {
    let trimmed = key.trim_end_matches('/');
    if trimmed.is_empty() {
        return trimmed;
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Folders marked for deletion in this run.
///
/// Filled by the scanner and read-only afterwards. Iteration is sorted so the
/// backup file is stable for a given set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CondemnedSet {
    folders: BTreeSet<String>,
}

impl CondemnedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, folder: impl Into<String>) -> bool {
        self.folders.insert(folder.into())
    }

    pub fn contains(&self, folder: &str) -> bool {
        self.folders.contains(folder)
    }

    /// Whether `key` lives under a condemned folder.
    pub fn owns(&self, key: &str) -> bool {
        self.contains(top_level_segment(key))
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.folders.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for CondemnedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            folders: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_segment_takes_first_component() {
        assert_eq!(top_level_segment("folderA/deletion-mark.json"), "folderA");
        assert_eq!(top_level_segment("folderA/nested/file.txt"), "folderA");
        assert_eq!(top_level_segment("root.txt"), "root.txt");
        assert_eq!(top_level_segment("/leading"), "");
    }

    #[test]
    fn base_name_ignores_trailing_slashes() {
        assert_eq!(base_name("folderA/deletion-mark.json"), "deletion-mark.json");
        assert_eq!(base_name("deletion-mark.json"), "deletion-mark.json");
        assert_eq!(base_name("folderA/sub/"), "sub");
        assert_eq!(base_name("/"), "");
        assert_eq!(base_name(""), "");
    }

    #[test]
    fn owns_matches_whole_segment_only() {
        let condemned: CondemnedSet = ["folderA"].into_iter().collect();

        assert!(condemned.owns("folderA/file1.txt"));
        assert!(condemned.owns("folderA/deletion-mark.json"));
        assert!(!condemned.owns("folderAB/file.txt"));
        assert!(!condemned.owns("folderB/folderA/file.txt"));
    }

    #[test]
    fn insert_deduplicates_and_iterates_sorted() {
        let mut condemned = CondemnedSet::new();
        assert!(condemned.insert("b"));
        assert!(condemned.insert("a"));
        assert!(!condemned.insert("b"));

        assert_eq!(condemned.len(), 2);
        assert_eq!(condemned.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
