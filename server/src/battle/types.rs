//! Element effectiveness chart.

use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};

/// Highest element id
pub const MAX_ELEMENT: usize = 26;

/// Element names by id, starting at 1
pub const ELEMENT_NAMES: [&str; MAX_ELEMENT] = [
    "GRASS", "WATER", "FIRE", "FLYING", "ELECTRIC", "MACHINE", "GROUND", "NORMAL", "ICE", "PSYCHIC",
    "FIGHTING", "LIGHT", "DARK", "MYSTERY", "DRAGON", "HOLY", "DIMENSION", "ANCIENT", "EVIL", "NATURE",
    "KING", "CHAOS", "DIVINE", "CYCLE", "BUG", "VOID",
];

/// Resolve an element by name or numeric id
pub fn element_id(key: &str) -> Option<usize> {
    let key = key.trim();
    if let Ok(id) = key.parse::<usize>() {
        return (1..=MAX_ELEMENT).contains(&id).then_some(id);
    }
    ELEMENT_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(key))
        .map(|idx| idx + 1)
}

/// Attacker element x defender element damage multiplier
#[derive(Debug, Clone, PartialEq)]
pub struct TypeChart {
    table: Vec<[f64; MAX_ELEMENT + 1]>,
}

impl Default for TypeChart {
    fn default() -> Self {
        Self::identity()
    }
}

impl TypeChart {
    /// Every multiplier 1.0
    pub fn identity() -> Self {
        Self {
            table: vec![[1.0; MAX_ELEMENT + 1]; MAX_ELEMENT + 1],
        }
    }

    /// Parse a JSON chart of the form `{"FIRE": {"GRASS": 2.0, "WATER": 0.5}}`.
    ///
    /// Keys may be element names or ids. Unknown keys and negative values are
    /// skipped; pairs not listed stay at 1.0.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: HashMap<String, HashMap<String, f64>> = serde_json::from_str(raw)?;
        let mut chart = Self::identity();
        for (attacker, row) in &parsed {
            let Some(atk) = element_id(attacker) else {
                continue;
            };
            for (defender, value) in row {
                let Some(def) = element_id(defender) else {
                    continue;
                };
                if value.is_finite() && *value >= 0.0 {
                    chart.table[atk][def] = *value;
                }
            }
        }
        Ok(chart)
    }

    /// Load a chart file, falling back to the identity chart when it is
    /// missing or invalid.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Type chart {} unavailable ({}), using neutral multipliers", path.display(), e);
                return Self::identity();
            }
        };
        match Self::from_json(&raw) {
            Ok(chart) => {
                info!("Loaded type chart from {}", path.display());
                chart
            }
            Err(e) => {
                warn!("Type chart {} is invalid ({}), using neutral multipliers", path.display(), e);
                Self::identity()
            }
        }
    }

    /// Multiplier for an attack of `attacker` element on a `defender` element.
    ///
    /// Zero or out of range elements give 1.0.
    pub fn multiplier(&self, attacker: u32, defender: u32) -> f64 {
        let (atk, def) = (attacker as usize, defender as usize);
        if atk == 0 || def == 0 || atk > MAX_ELEMENT || def > MAX_ELEMENT {
            return 1.0;
        }
        self.table[atk][def]
    }

    pub fn set(&mut self, attacker: u32, defender: u32, value: f64) {
        let (atk, def) = (attacker as usize, defender as usize);
        if (1..=MAX_ELEMENT).contains(&atk) && (1..=MAX_ELEMENT).contains(&def) {
            self.table[atk][def] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_and_out_of_range() {
        let chart = TypeChart::identity();
        assert_eq!(chart.multiplier(3, 1), 1.0);
        assert_eq!(chart.multiplier(0, 1), 1.0);
        assert_eq!(chart.multiplier(1, 27), 1.0);
        assert_eq!(chart.multiplier(u32::MAX, 5), 1.0);
    }

    #[test]
    fn test_json_by_name_and_id() {
        let chart = TypeChart::from_json(
            r#"{ "FIRE": { "GRASS": 2.0, "water": 0.5 }, "5": { "7": 0 }, "NOPE": { "FIRE": 9 } }"#,
        )
        .unwrap();
        assert_eq!(chart.multiplier(3, 1), 2.0);
        assert_eq!(chart.multiplier(3, 2), 0.5);
        assert_eq!(chart.multiplier(5, 7), 0.0);
        assert_eq!(chart.multiplier(1, 3), 1.0);
    }

    #[test]
    fn test_bad_input_falls_back_to_identity() {
        assert!(TypeChart::from_json("not json").is_err());
        let chart = TypeChart::load(Path::new("/nonexistent/elements.json"));
        assert_eq!(chart, TypeChart::identity());
    }

    #[test]
    fn test_element_lookup() {
        assert_eq!(element_id("GRASS"), Some(1));
        assert_eq!(element_id("void"), Some(26));
        assert_eq!(element_id("26"), Some(26));
        assert_eq!(element_id("0"), None);
        assert_eq!(element_id("SPACE"), None);
    }
}
