use nomap_protocol::{FlatCode, ReferenceEntry, ReferenceStatus};
use std::collections::HashMap;

/// The authoritative flat-taxonomy list, one entry per code.
#[derive(Debug, Clone, Default)]
pub struct ReferenceList {
    entries: Vec<ReferenceEntry>,
    by_code: HashMap<String, usize>,
    dropped_duplicates: usize,
}

impl ReferenceList {
    /// Build the list, collapsing repeated codes.
    ///
    /// A repeated code keeps the row with the preferred status (Active, then Unknown, then
    /// Obsolete); on equal status the earlier row stays. Every drop is logged.
    pub fn from_entries(rows: impl IntoIterator<Item = ReferenceEntry>) -> Self {
        let mut kept: Vec<ReferenceEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut dropped_duplicates = 0usize;

        for row in rows {
            match positions.get(&row.code) {
                None => {
                    positions.insert(row.code.clone(), kept.len());
                    kept.push(row);
                }
                Some(&pos) => {
                    dropped_duplicates += 1;
                    let existing = &kept[pos];
                    if row.status.preference() < existing.status.preference() {
                        log::info!(
                            "reference code {}: {:?} row replaces {:?} row",
                            row.code,
                            row.status,
                            existing.status
                        );
                        kept[pos] = row;
                    } else {
                        log::info!(
                            "reference code {}: duplicate {:?} row dropped",
                            row.code,
                            row.status
                        );
                    }
                }
            }
        }

        kept.sort_by(|a, b| a.code.cmp(&b.code));
        let by_code = kept
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.code.clone(), idx))
            .collect();
        Self {
            entries: kept,
            by_code,
            dropped_duplicates,
        }
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<&ReferenceEntry> {
        self.by_code.get(code).map(|&idx| &self.entries[idx])
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
    pub fn iter(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn dropped_duplicates(&self) -> usize {
        self.dropped_duplicates
    }

    /// Flat codes to map, in code order. Obsolete terms are left out unless asked for.
    #[must_use]
    pub fn flat_codes(&self, include_obsolete: bool) -> Vec<FlatCode> {
        self.entries
            .iter()
            .filter(|e| include_obsolete || e.status != ReferenceStatus::Obsolete)
            .map(ReferenceEntry::to_flat_code)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, description: &str, status: ReferenceStatus) -> ReferenceEntry {
        ReferenceEntry {
            code: code.to_string(),
            description: description.to_string(),
            status,
        }
    }

    #[test]
    fn duplicate_ids_prefer_active_status() {
        let list = ReferenceList::from_entries(vec![
            row("10002", "Old stethoscope", ReferenceStatus::Obsolete),
            row("10001", "Scalpel", ReferenceStatus::Active),
            row("10002", "Stethoscope", ReferenceStatus::Active),
            row("10002", "Stethoscope, unknown", ReferenceStatus::Unknown),
        ]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.dropped_duplicates(), 2);
        assert_eq!(list.get("10002").unwrap().description, "Stethoscope");
        let codes: Vec<&str> = list.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["10001", "10002"]);
    }

    #[test]
    fn equal_status_keeps_first_row() {
        let list = ReferenceList::from_entries(vec![
            row("20001", "First", ReferenceStatus::Active),
            row("20001", "Second", ReferenceStatus::Active),
        ]);
        assert_eq!(list.get("20001").unwrap().description, "First");
    }

    #[test]
    fn flat_codes_skip_obsolete_by_default() {
        let list = ReferenceList::from_entries(vec![
            row("30001", "Live", ReferenceStatus::Active),
            row("30002", "Gone", ReferenceStatus::Obsolete),
        ]);
        assert_eq!(list.flat_codes(false).len(), 1);
        assert_eq!(list.flat_codes(true).len(), 2);
    }
}
