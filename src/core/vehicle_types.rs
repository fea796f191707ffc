use std::collections::HashMap;

use crate::models::VehicleTypeMapping;

/// Built-in vehicle-size vocabulary, used when a tenant has no mapping rows
/// configured.
pub const DEFAULT_VEHICLE_TYPES: [&str; 6] = [
    "LARGE STRAIGHT",
    "SMALL STRAIGHT",
    "CARGO VAN",
    "SPRINTER",
    "STRAIGHT",
    "FLATBED",
];

/// Reconciles inconsistent vehicle-size vocabulary across loadboards.
///
/// Keys are lowercase original labels, values are uppercase canonical labels.
/// Labels with no mapping pass through uppercased rather than being dropped,
/// so an unmapped posting still displays and still compares
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct VehicleTypeTable {
    map: HashMap<String, String>,
}

impl VehicleTypeTable {
    /// Build a table from a tenant's mapping rows. Empty input falls back to
    /// the built-in vocabulary mapped onto itself.
    pub fn from_mappings(rows: &[VehicleTypeMapping]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }

        let map = rows
            .iter()
            .map(|row| {
                (
                    row.original_label.trim().to_lowercase(),
                    row.canonical_label.trim().to_uppercase(),
                )
            })
            .collect();

        Self { map }
    }

    /// Canonical form of a free-text vehicle-size label.
    pub fn canonicalize(&self, label: &str) -> String {
        let key = label.trim().to_lowercase();
        match self.map.get(&key) {
            Some(canonical) => canonical.clone(),
            None => label.trim().to_uppercase(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for VehicleTypeTable {
    fn default() -> Self {
        let map = DEFAULT_VEHICLE_TYPES
            .iter()
            .map(|label| (label.to_lowercase(), label.to_string()))
            .collect();
        Self { map }
    }
}
