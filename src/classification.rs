// 🏷️ Classification Registry - closed set of group natures and their 2-letter codes
//
// Pre-seeded and immutable. Lookups accept either the label ("Trading") or
// the code ("TR"), case-insensitively.

use crate::error::{MasterDataError, Result};
use serde::Serialize;
use std::collections::HashMap;

// ============================================================================
// CLASSIFICATION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationType {
    pub code: &'static str,
    pub label: &'static str,
}

/// Seed data, also written to the `classification_types` table
pub const CLASSIFICATION_TYPES: &[ClassificationType] = &[
    ClassificationType { code: "AS", label: "Assets" },
    ClassificationType { code: "LI", label: "Liabilities" },
    ClassificationType { code: "CA", label: "Capital" },
    ClassificationType { code: "IN", label: "Income" },
    ClassificationType { code: "EX", label: "Expenses" },
    ClassificationType { code: "TR", label: "Trading" },
    ClassificationType { code: "PL", label: "Profit & Loss" },
    ClassificationType { code: "BS", label: "Balance Sheet" },
];

// ============================================================================
// REGISTRY
// ============================================================================

pub struct ClassificationRegistry {
    by_code: HashMap<&'static str, ClassificationType>,
    by_label: HashMap<String, ClassificationType>,
}

impl ClassificationRegistry {
    /// Registry holding the standard classification types
    pub fn new() -> Self {
        let mut registry = ClassificationRegistry {
            by_code: HashMap::new(),
            by_label: HashMap::new(),
        };
        for ty in CLASSIFICATION_TYPES {
            registry.by_code.insert(ty.code, *ty);
            registry.by_label.insert(ty.label.to_lowercase(), *ty);
        }
        registry
    }

    /// Find by label or code
    pub fn lookup(&self, label_or_code: &str) -> Option<ClassificationType> {
        let key = label_or_code.trim();
        self.by_code
            .get(key.to_ascii_uppercase().as_str())
            .or_else(|| self.by_label.get(&key.to_lowercase()))
            .copied()
    }

    /// Resolve to the 2-letter code, reporting unknown input as a validation error
    pub fn resolve(&self, label_or_code: &str) -> Result<&'static str> {
        self.lookup(label_or_code)
            .map(|ty| ty.code)
            .ok_or_else(|| {
                MasterDataError::validation(
                    "classification",
                    format!("unknown classification type '{}'", label_or_code.trim()),
                )
            })
    }

    pub fn label_for(&self, code: &str) -> Option<&'static str> {
        self.by_code.get(code).map(|ty| ty.label)
    }

    /// All types in seed order
    pub fn all(&self) -> Vec<ClassificationType> {
        CLASSIFICATION_TYPES.to_vec()
    }

    pub fn count(&self) -> usize {
        self.by_code.len()
    }
}

impl Default for ClassificationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
