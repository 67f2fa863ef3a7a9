//! Enum value registry: raw integer codes ⇄ symbolic names, per field
//! category (instrument type, modulator destination, FX command, ...).
//!
//! Fields are stored on disk as raw integers but exposed to humans as names;
//! the registry is the single authority keeping both representations in
//! sync. Lookups are O(1) in both directions: the codec resolves every
//! enumerated field of every record through here.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown enum registry: {0}")]
    UnknownRegistry(String),
    #[error("enum registry {0} defined twice")]
    DuplicateRegistry(String),
    #[error("{registry}: value {value:#04x} has no registered name")]
    OutOfRange { registry: String, value: u64 },
    #[error("{registry}: unknown symbol {symbol:?}")]
    UnknownSymbol { registry: String, symbol: String },
    #[error("{registry}: duplicate value {value:#04x}")]
    DuplicateValue { registry: String, value: u64 },
    #[error("{registry}: duplicate symbol {symbol:?}")]
    DuplicateSymbol { registry: String, symbol: String },
}

/// One closed set of `(value, name)` pairs. Values need not be contiguous
/// or start at zero (FX codes start at 0x80 on some firmware).
#[derive(Debug, Clone, Default)]
pub struct EnumEntry {
    members: Vec<(u64, String)>,
    by_value: HashMap<u64, usize>,
    by_name: HashMap<String, usize>,
}

impl EnumEntry {
    fn new(registry: &str, members: Vec<(u64, String)>) -> Result<Self, RegistryError> {
        let mut by_value = HashMap::with_capacity(members.len());
        let mut by_name = HashMap::with_capacity(members.len());
        for (i, (value, name)) in members.iter().enumerate() {
            if by_value.insert(*value, i).is_some() {
                return Err(RegistryError::DuplicateValue {
                    registry: registry.to_string(),
                    value: *value,
                });
            }
            if by_name.insert(name.clone(), i).is_some() {
                return Err(RegistryError::DuplicateSymbol {
                    registry: registry.to_string(),
                    symbol: name.clone(),
                });
            }
        }
        Ok(EnumEntry { members, by_value, by_name })
    }

    /// Members in registration order.
    pub fn members(&self) -> &[(u64, String)] {
        &self.members
    }
}

/// All enum categories for one format version.
#[derive(Debug, Clone, Default)]
pub struct EnumRegistry {
    entries: HashMap<String, EnumEntry>,
}

impl EnumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category. Rejects duplicate categories and duplicate
    /// values/names within the category.
    pub fn insert(
        &mut self,
        registry: impl Into<String>,
        members: Vec<(u64, String)>,
    ) -> Result<(), RegistryError> {
        let registry = registry.into();
        let entry = EnumEntry::new(&registry, members)?;
        if self.entries.contains_key(&registry) {
            return Err(RegistryError::DuplicateRegistry(registry));
        }
        self.entries.insert(registry, entry);
        Ok(())
    }

    pub fn contains(&self, registry: &str) -> bool {
        self.entries.contains_key(registry)
    }

    pub fn entry(&self, registry: &str) -> Option<&EnumEntry> {
        self.entries.get(registry)
    }

    /// Symbolic name for a raw value.
    pub fn resolve(&self, registry: &str, value: u64) -> Result<&str, RegistryError> {
        let entry = self
            .entries
            .get(registry)
            .ok_or_else(|| RegistryError::UnknownRegistry(registry.to_string()))?;
        let idx = entry.by_value.get(&value).ok_or_else(|| RegistryError::OutOfRange {
            registry: registry.to_string(),
            value,
        })?;
        Ok(&entry.members[*idx].1)
    }

    /// Raw value for a symbolic name.
    pub fn reverse(&self, registry: &str, symbol: &str) -> Result<u64, RegistryError> {
        let entry = self
            .entries
            .get(registry)
            .ok_or_else(|| RegistryError::UnknownRegistry(registry.to_string()))?;
        let idx = entry.by_name.get(symbol).ok_or_else(|| RegistryError::UnknownSymbol {
            registry: registry.to_string(),
            symbol: symbol.to_string(),
        })?;
        Ok(entry.members[*idx].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr_types() -> EnumRegistry {
        let mut reg = EnumRegistry::new();
        reg.insert(
            "instr_type",
            vec![
                (0x00, "WAVSYNTH".to_string()),
                (0x01, "MACROSYNTH".to_string()),
                (0x02, "SAMPLER".to_string()),
                (0xFF, "NONE".to_string()),
            ],
        )
        .expect("insert");
        reg
    }

    #[test]
    fn resolve_and_reverse_every_member() {
        let reg = instr_types();
        for (value, name) in reg.entry("instr_type").expect("entry").members().to_vec() {
            assert_eq!(reg.resolve("instr_type", value).expect("resolve"), name);
            assert_eq!(reg.reverse("instr_type", &name).expect("reverse"), value);
        }
    }

    #[test]
    fn resolve_unregistered_value_is_out_of_range() {
        let reg = instr_types();
        assert_eq!(
            reg.resolve("instr_type", 0x7F),
            Err(RegistryError::OutOfRange { registry: "instr_type".to_string(), value: 0x7F })
        );
    }

    #[test]
    fn reverse_unregistered_name_is_unknown_symbol() {
        let reg = instr_types();
        assert!(matches!(
            reg.reverse("instr_type", "FMSYNTH"),
            Err(RegistryError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn unknown_registry_key() {
        let reg = instr_types();
        assert!(matches!(reg.resolve("fx_dest", 0), Err(RegistryError::UnknownRegistry(_))));
        assert!(matches!(reg.reverse("fx_dest", "X"), Err(RegistryError::UnknownRegistry(_))));
    }

    #[test]
    fn duplicate_value_rejected() {
        let mut reg = EnumRegistry::new();
        let err = reg.insert(
            "dup",
            vec![(1, "A".to_string()), (1, "B".to_string())],
        );
        assert!(matches!(err, Err(RegistryError::DuplicateValue { .. })));
    }

    #[test]
    fn duplicate_symbol_rejected() {
        let mut reg = EnumRegistry::new();
        let err = reg.insert(
            "dup",
            vec![(1, "A".to_string()), (2, "A".to_string())],
        );
        assert!(matches!(err, Err(RegistryError::DuplicateSymbol { .. })));
    }

    #[test]
    fn noncontiguous_values_allowed() {
        let mut reg = EnumRegistry::new();
        reg.insert(
            "fx_cmd",
            vec![(0x80, "ARP".to_string()), (0x83, "PORT".to_string())],
        )
        .expect("sparse values are fine");
        assert_eq!(reg.resolve("fx_cmd", 0x83).expect("resolve"), "PORT");
    }
}
