use crate::models::EquipmentType;

const DEFAULT_PREFIXES: [(&str, EquipmentType); 3] = [
    ("FLIB", EquipmentType::Flib),
    ("AIB", EquipmentType::Aib),
    ("AOB", EquipmentType::Aob),
];

/// Ordered cell-code prefix table. Entries are kept longest-first so a short
/// prefix never shadows a more specific one.
#[derive(Debug, Clone)]
pub struct PrefixTable {
    entries: Vec<(String, EquipmentType)>,
}

impl Default for PrefixTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_PREFIXES
                .iter()
                .map(|(prefix, equipment)| (prefix.to_string(), *equipment)),
        )
    }
}

impl PrefixTable {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, EquipmentType)>,
    {
        let mut entries: Vec<(String, EquipmentType)> = entries
            .into_iter()
            .map(|(prefix, equipment)| (normalize(&prefix), equipment))
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();
        // stable: equal lengths keep table order
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    /// Default table plus extra entries.
    pub fn extended<I>(extra: I) -> Self
    where
        I: IntoIterator<Item = (String, EquipmentType)>,
    {
        let defaults = DEFAULT_PREFIXES
            .iter()
            .map(|(prefix, equipment)| (prefix.to_string(), *equipment));
        Self::new(defaults.chain(extra))
    }

    pub fn classify(&self, cell_code: &str) -> EquipmentType {
        let normalized = normalize(cell_code);
        if normalized.is_empty() {
            return EquipmentType::Unknown;
        }

        self.entries
            .iter()
            .find(|(prefix, _)| normalized.starts_with(prefix.as_str()))
            .map(|(_, equipment)| *equipment)
            .unwrap_or(EquipmentType::Unknown)
    }
}

/// Trim, drop interior whitespace, uppercase.
pub fn normalize(cell_code: &str) -> String {
    cell_code
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn classify(cell_code: &str) -> EquipmentType {
    PrefixTable::default().classify(cell_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_prefixes() {
        assert_eq!(classify(" aib101 "), EquipmentType::Aib);
        assert_eq!(classify("AOB102"), EquipmentType::Aob);
        assert_eq!(classify("FLIB7"), EquipmentType::Flib);
        assert_eq!(classify(""), EquipmentType::Unknown);
        assert_eq!(classify("XYZ1"), EquipmentType::Unknown);
    }

    #[test]
    fn strips_interior_whitespace() {
        assert_eq!(classify("a ib 1 01"), EquipmentType::Aib);
        assert_eq!(classify("\tf l i b\n"), EquipmentType::Flib);
        assert_eq!(classify("   "), EquipmentType::Unknown);
    }

    #[test]
    fn longer_prefix_wins_regardless_of_table_order() {
        let table = PrefixTable::new(vec![
            ("AI".to_string(), EquipmentType::Aob),
            ("AIB".to_string(), EquipmentType::Aib),
        ]);
        assert_eq!(table.classify("AIB3"), EquipmentType::Aib);
        assert_eq!(table.classify("AIX3"), EquipmentType::Aob);
    }

    #[test]
    fn extended_table_adds_types_without_losing_defaults() {
        let table = PrefixTable::extended(vec![("AIBX".to_string(), EquipmentType::Flib)]);
        assert_eq!(table.classify("aibx-1"), EquipmentType::Flib);
        assert_eq!(table.classify("aib-1"), EquipmentType::Aib);
    }

    #[test]
    fn classification_is_repeatable() {
        let inputs = ["aib1", " AOB 2", "flib", "", "??", "1234"];
        for input in inputs {
            assert_eq!(classify(input), classify(input));
        }
        assert_eq!(classify("1234"), EquipmentType::Unknown);
    }
}
