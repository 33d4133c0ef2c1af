//! Deterministic port and working-directory allocation.
//!
//! Concurrently running test modules must never collide on ports or
//! directories, without any runtime coordination. Each module's base port is
//! a pure function of its lexicographic rank among the sibling test modules,
//! so sorting the module list once per process is the only coordination
//! needed. Working directories get a random suffix instead, since nothing
//! else ever needs to compute them.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// File-name suffix identifying test modules during discovery.
pub const DEFAULT_MODULE_SUFFIX: &str = "_test.rs";

/// Ports claimed by one module: two consecutive ports starting at an even
/// offset above the configured base.
pub const PORTS_PER_MODULE: u16 = 2;

/// Returns the rank of `module` within the sorted sibling list.
///
/// The sibling list must already be sorted and must not contain the shared
/// base module; [`discover_test_modules`] produces it in that form.
pub fn module_ordinal(module: &str, sorted_siblings: &[String]) -> Option<usize> {
    sorted_siblings.iter().position(|name| name == module)
}

/// Lists the test modules in `dir`, sorted lexicographically.
///
/// Collects regular files ending in `suffix`, excluding `shared_base` (the
/// module holding common helpers, which claims no ports). Adding or removing
/// a module shifts the ordinals of every module sorting after it; only
/// within-run disjointness is guaranteed.
pub fn discover_test_modules(
    dir: &Path,
    suffix: &str,
    shared_base: &str,
) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(suffix) && name != shared_base {
            names.push(name);
        }
    }
    names.sort();

    Ok(names)
}

/// Port pair assigned to one test module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModulePorts {
    base: u16,
}

impl ModulePorts {
    /// Computes the port pair for the module at `ordinal`.
    pub fn new(configured_base: u16, ordinal: usize) -> ModulePorts {
        ModulePorts {
            base: configured_base + PORTS_PER_MODULE * ordinal as u16,
        }
    }

    /// Port of the module's primary node.
    pub fn primary(&self) -> u16 {
        self.base
    }

    /// Port of the module's replica or branch.
    pub fn secondary(&self) -> u16 {
        self.base + 1
    }
}

/// Strips the module suffix (or a plain `.rs` extension) from a file name.
pub fn module_short_name<'a>(file_name: &'a str, suffix: &str) -> &'a str {
    file_name
        .strip_suffix(suffix)
        .or_else(|| file_name.strip_suffix(".rs"))
        .unwrap_or(file_name)
}

/// Returns a unique base directory under the system temp dir.
///
/// The name combines the module's short name, a role tag (`node`, `backup`)
/// and a random suffix, so concurrent runs of the same module never share a
/// directory.
pub fn unique_base_dir(short_name: &str, role: &str) -> PathBuf {
    let suffix = Uuid::new_v4().simple().to_string();
    std::env::temp_dir().join(format!("{short_name}_{role}_{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modules(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_ordinal_follows_sort_order() {
        let siblings = modules(&["backup_test.rs", "checkpoint_test.rs", "replica_test.rs"]);

        assert_eq!(module_ordinal("backup_test.rs", &siblings), Some(0));
        assert_eq!(module_ordinal("replica_test.rs", &siblings), Some(2));
        assert_eq!(module_ordinal("unknown_test.rs", &siblings), None);
    }

    #[test]
    fn test_port_pairs_never_intersect() {
        let names: Vec<String> = (0..40).map(|i| format!("module_{i:02}_test.rs")).collect();

        let mut claimed = std::collections::HashSet::new();
        for name in &names {
            let ordinal = module_ordinal(name, &names).unwrap();
            let ports = ModulePorts::new(20000, ordinal);
            assert!(claimed.insert(ports.primary()));
            assert!(claimed.insert(ports.secondary()));
        }
    }

    #[test]
    fn test_base_port_arithmetic() {
        assert_eq!(ModulePorts::new(20000, 0).primary(), 20000);
        assert_eq!(ModulePorts::new(20000, 0).secondary(), 20001);
        assert_eq!(ModulePorts::new(20000, 7).primary(), 20014);
        assert_eq!(ModulePorts::new(20000, 7).secondary(), 20015);
    }

    #[test]
    fn test_module_short_name() {
        assert_eq!(module_short_name("backup_test.rs", DEFAULT_MODULE_SUFFIX), "backup");
        assert_eq!(module_short_name("helpers.rs", DEFAULT_MODULE_SUFFIX), "helpers");
        assert_eq!(module_short_name("weird", DEFAULT_MODULE_SUFFIX), "weird");
    }

    #[test]
    fn test_unique_base_dirs_differ() {
        let first = unique_base_dir("backup", "node");
        let second = unique_base_dir("backup", "node");

        assert_ne!(first, second);
        assert!(first.file_name().unwrap().to_string_lossy().starts_with("backup_node_"));
    }
}
