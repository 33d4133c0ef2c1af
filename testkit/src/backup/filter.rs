use std::collections::HashSet;
use std::path::Path;

/// Decides which directory entries are excluded from a backup copy.
///
/// Invoked once per directory visited by the recursive copy, with the
/// directory path and its entry names; the returned subset is skipped.
/// Different paths may get different exclusion rules. Closures with the
/// matching signature implement the trait directly.
pub trait EntryFilter: Send + Sync {
    fn entries_to_exclude(&self, dir: &Path, names: &[String]) -> HashSet<String>;
}

impl<F> EntryFilter for F
where
    F: Fn(&Path, &[String]) -> HashSet<String> + Send + Sync,
{
    fn entries_to_exclude(&self, dir: &Path, names: &[String]) -> HashSet<String> {
        self(dir, names)
    }
}

/// Filter that excludes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExclusions;

impl EntryFilter for NoExclusions {
    fn entries_to_exclude(&self, _dir: &Path, _names: &[String]) -> HashSet<String> {
        HashSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_no_exclusions_is_empty() {
        let excluded = NoExclusions
            .entries_to_exclude(&PathBuf::from("/anywhere"), &["a".to_string(), "b".to_string()]);

        assert!(excluded.is_empty());
    }

    #[test]
    fn test_closures_implement_the_filter() {
        let filter = |_dir: &Path, names: &[String]| -> HashSet<String> {
            names
                .iter()
                .filter(|name| name.ends_with(".tmp"))
                .cloned()
                .collect()
        };

        let excluded = filter.entries_to_exclude(
            &PathBuf::from("/anywhere"),
            &["keep".to_string(), "drop.tmp".to_string()],
        );

        assert_eq!(excluded.len(), 1);
        assert!(excluded.contains("drop.tmp"));
    }
}
