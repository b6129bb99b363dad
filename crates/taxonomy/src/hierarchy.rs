use nomap_protocol::HierarchicalEntry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Code length for each depth (depth 1 is the single-letter category).
pub const DEFAULT_DEPTH_LENGTHS: [usize; 6] = [1, 3, 5, 7, 9, 11];

/// Orphans logged individually before switching to a summary line.
const ORPHAN_LOG_SAMPLES: usize = 10;

/// Depth implied by `len`, if `len` is one of the segment boundaries.
#[must_use]
pub fn depth_for_length(len: usize, depth_lengths: &[usize]) -> Option<u8> {
    depth_lengths
        .iter()
        .position(|&l| l == len)
        .and_then(|idx| u8::try_from(idx + 1).ok())
}

/// Parent of `code`: the code truncated to the longest segment boundary strictly shorter than it.
///
/// Roots (no shorter boundary) and codes whose truncated prefix is not in `known_codes` get
/// `None`. Irregular lengths fall back to the nearest shorter boundary.
#[must_use]
pub fn parent_code_for(
    code: &str,
    known_codes: &HashSet<&str>,
    depth_lengths: &[usize],
) -> Option<String> {
    let len = code.len();
    if len <= 1 {
        return None;
    }
    let parent_len = depth_lengths.iter().copied().filter(|&l| l < len).max()?;
    let prefix = code.get(..parent_len)?;
    known_codes.contains(prefix).then(|| prefix.to_string())
}

/// Summary counters for a reconstructed hierarchy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HierarchyStats {
    pub entries: usize,
    pub roots: usize,
    pub orphans: usize,
    pub terminal: usize,
    pub max_depth: u8,
    pub duplicate_codes: usize,
}

/// Hierarchical entries indexed by code, with derived parent links.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    entries: Vec<HierarchicalEntry>,
    by_code: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
    orphans: Vec<usize>,
    duplicate_codes: usize,
}

/// Derive `parent_code` for every entry and index the result.
///
/// Entries are sorted by code; a repeated code keeps its first occurrence. Any incoming
/// `parent_code` is recomputed. Runs in O(n) over a hash set of codes, never fails.
pub fn reconstruct(entries: Vec<HierarchicalEntry>, depth_lengths: &[usize]) -> HierarchyIndex {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(entries.len());
    let mut duplicate_codes = 0usize;
    for entry in entries {
        if seen.insert(entry.code.clone()) {
            unique.push(entry);
        } else {
            duplicate_codes += 1;
            log::warn!("duplicate hierarchical code {} ignored", entry.code);
        }
    }
    unique.sort_by(|a, b| a.code.cmp(&b.code));

    let parents: Vec<Option<String>> = {
        let known: HashSet<&str> = unique.iter().map(|e| e.code.as_str()).collect();
        unique
            .iter()
            .map(|e| parent_code_for(&e.code, &known, depth_lengths))
            .collect()
    };

    let mut index = HierarchyIndex {
        by_code: HashMap::with_capacity(unique.len()),
        duplicate_codes,
        ..HierarchyIndex::default()
    };
    for (idx, (mut entry, parent)) in unique.into_iter().zip(parents).enumerate() {
        let is_root = entry.code.len() <= depth_lengths.first().copied().unwrap_or(1);
        if let Some(parent) = &parent {
            index.children.entry(parent.clone()).or_default().push(idx);
        } else if !is_root {
            if index.orphans.len() < ORPHAN_LOG_SAMPLES {
                log::warn!("orphan hierarchical entry {} (no known parent)", entry.code);
            }
            index.orphans.push(idx);
        }
        if let Some(implied) = depth_for_length(entry.code.len(), depth_lengths) {
            if implied != entry.depth {
                log::debug!(
                    "{}: source depth {} disagrees with code length depth {implied}",
                    entry.code,
                    entry.depth
                );
            }
        }
        entry.parent_code = parent;
        index.by_code.insert(entry.code.clone(), idx);
        index.entries.push(entry);
    }

    if index.orphans.len() > ORPHAN_LOG_SAMPLES {
        log::warn!(
            "{} orphan hierarchical entries in total",
            index.orphans.len()
        );
    }
    index
}

impl HierarchyIndex {
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&HierarchicalEntry> {
        self.by_code.get(code).map(|&idx| &self.entries[idx])
    }

    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = &HierarchicalEntry> {
        self.entries.iter()
    }

    pub fn terminal_entries(&self) -> impl Iterator<Item = &HierarchicalEntry> {
        self.entries.iter().filter(|e| e.is_terminal)
    }

    /// Direct children of `code`, in code order.
    pub fn children(&self, code: &str) -> impl Iterator<Item = &HierarchicalEntry> {
        self.children
            .get(code)
            .into_iter()
            .flatten()
            .map(|&idx| &self.entries[idx])
    }

    /// Parent chain of `code`, nearest first.
    #[must_use]
    pub fn ancestors(&self, code: &str) -> Vec<&HierarchicalEntry> {
        let mut chain = Vec::new();
        let mut current = self.get(code).and_then(|e| e.parent_code.as_deref());
        while let Some(parent_code) = current {
            let Some(parent) = self.get(parent_code) else {
                break;
            };
            chain.push(parent);
            current = parent.parent_code.as_deref();
        }
        chain
    }

    pub fn roots(&self) -> impl Iterator<Item = &HierarchicalEntry> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(idx, e)| e.parent_code.is_none() && !self.orphans.contains(idx))
            .map(|(_, e)| e)
    }

    pub fn orphans(&self) -> impl Iterator<Item = &HierarchicalEntry> {
        self.orphans.iter().map(|&idx| &self.entries[idx])
    }

    #[must_use]
    pub fn stats(&self) -> HierarchyStats {
        HierarchyStats {
            entries: self.entries.len(),
            roots: self.roots().count(),
            orphans: self.orphans.len(),
            terminal: self.terminal_entries().count(),
            max_depth: self.entries.iter().map(|e| e.depth).max().unwrap_or(0),
            duplicate_codes: self.duplicate_codes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(code: &str, depth: u8) -> HierarchicalEntry {
        HierarchicalEntry {
            code: code.to_string(),
            description: format!("term {code}"),
            category_prefix: code.chars().next().unwrap_or('?'),
            depth,
            is_terminal: false,
            parent_code: None,
        }
    }

    #[test]
    fn parent_codes_follow_segment_table() {
        let known: HashSet<&str> = ["A", "A01", "A0101"].into_iter().collect();
        let table = DEFAULT_DEPTH_LENGTHS;
        assert_eq!(parent_code_for("A0101", &known, &table).as_deref(), Some("A01"));
        assert_eq!(parent_code_for("A01", &known, &table).as_deref(), Some("A"));
        assert_eq!(parent_code_for("A", &known, &table), None);
    }

    #[test]
    fn unknown_prefix_yields_none() {
        let known: HashSet<&str> = ["A", "A01"].into_iter().collect();
        assert_eq!(parent_code_for("Z9999", &known, &DEFAULT_DEPTH_LENGTHS), None);
    }

    #[test]
    fn irregular_length_uses_nearest_shorter_boundary() {
        let known: HashSet<&str> = ["M", "M03", "M0304"].into_iter().collect();
        assert_eq!(
            parent_code_for("M03040", &known, &DEFAULT_DEPTH_LENGTHS).as_deref(),
            Some("M0304")
        );
    }

    #[test]
    fn reconstruct_links_parents_and_tracks_orphans() {
        let index = reconstruct(
            vec![
                entry("A0101", 3),
                entry("A", 1),
                entry("A01", 2),
                entry("B0102", 3),
                entry("A01", 2),
            ],
            &DEFAULT_DEPTH_LENGTHS,
        );

        assert_eq!(index.len(), 4);
        assert_eq!(
            index.get("A0101").and_then(|e| e.parent_code.as_deref()),
            Some("A01")
        );
        let orphans: Vec<&str> = index.orphans().map(|e| e.code.as_str()).collect();
        assert_eq!(orphans, vec!["B0102"]);
        let roots: Vec<&str> = index.roots().map(|e| e.code.as_str()).collect();
        assert_eq!(roots, vec!["A"]);
        let ancestors: Vec<&str> = index.ancestors("A0101").iter().map(|e| e.code.as_str()).collect();
        assert_eq!(ancestors, vec!["A01", "A"]);
        let children: Vec<&str> = index.children("A").map(|e| e.code.as_str()).collect();
        assert_eq!(children, vec!["A01"]);

        let stats = index.stats();
        assert_eq!(stats.orphans, 1);
        assert_eq!(stats.roots, 1);
        assert_eq!(stats.duplicate_codes, 1);
        assert_eq!(stats.max_depth, 3);
    }

    #[test]
    fn reconstruct_is_deterministic() {
        let input = vec![entry("C01", 2), entry("C", 1), entry("C0102", 3)];
        let mut reversed = input.clone();
        reversed.reverse();
        let a: Vec<_> = reconstruct(input, &DEFAULT_DEPTH_LENGTHS).iter().cloned().collect();
        let b: Vec<_> = reconstruct(reversed, &DEFAULT_DEPTH_LENGTHS).iter().cloned().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn depth_for_length_maps_boundaries() {
        assert_eq!(depth_for_length(1, &DEFAULT_DEPTH_LENGTHS), Some(1));
        assert_eq!(depth_for_length(7, &DEFAULT_DEPTH_LENGTHS), Some(4));
        assert_eq!(depth_for_length(4, &DEFAULT_DEPTH_LENGTHS), None);
    }
}
