//! Extension include/exclude filtering.

use std::collections::HashSet;

use compact_str::CompactString;

use topicmirror_core::THUMB_EXT;

/// Compiled include/exclude extension sets.
///
/// Thumbnail sidecars are always excluded. When `includes` is non-empty only
/// listed extensions pass; otherwise anything not in `excludes` passes.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    includes: HashSet<CompactString>,
    excludes: HashSet<CompactString>,
}

impl FilterSet {
    /// Compile extension lists. Entries may be given with or without the dot.
    pub fn new<I, E, S, T>(includes: I, excludes: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            includes: compile(includes),
            excludes: compile(excludes),
        }
    }

    /// Check whether a file name is dropped by the filters.
    pub fn is_excluded(&self, file_name: &str) -> bool {
        let ext = extension_of(file_name);

        if ext == THUMB_EXT {
            return true;
        }
        if !self.includes.is_empty() && !self.includes.contains(ext) {
            return true;
        }
        !self.excludes.is_empty() && self.excludes.contains(ext)
    }
}

fn compile<I, S>(exts: I) -> HashSet<CompactString>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    exts.into_iter()
        .filter_map(|ext| {
            let ext = ext.as_ref().trim();
            if ext.is_empty() {
                None
            } else if ext.starts_with('.') {
                Some(CompactString::new(ext))
            } else {
                Some(compact_str::format_compact!(".{ext}"))
            }
        })
        .collect()
}

/// Final-dot suffix of a file name, dot included (`"a.tar.gz"` -> `".gz"`).
pub fn extension_of(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) => &file_name[idx..],
        None => "",
    }
}
