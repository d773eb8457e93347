//! Result of one scan: the units that need recompiling.

use crate::source::SourceUnit;

/// New-or-modified units found by a single scan. Transient: produced by one
/// scan, consumed by one reload cycle. Sorted by qualified name so repeated
/// scans over the same tree are deterministic.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub units: Vec<SourceUnit>,
}

impl ChangeSet {
    pub fn new(mut units: Vec<SourceUnit>) -> Self {
        units.sort_by(|a, b| a.name.cmp(&b.name));
        Self { units }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Names of the changed units, in order.
    pub fn names(&self) -> Vec<&crate::core::QualifiedName> {
        self.units.iter().map(|u| &u.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_by_name() {
        let set = ChangeSet::new(vec![
            SourceUnit::with_text("com.example.Zed", ""),
            SourceUnit::with_text("com.example.Abe", ""),
        ]);
        let names: Vec<_> = set.names().iter().map(|n| n.as_str().to_string()).collect();
        assert_eq!(names, ["com.example.Abe", "com.example.Zed"]);
    }
}
