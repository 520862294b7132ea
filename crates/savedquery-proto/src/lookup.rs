//! Lookup operators for value clauses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The comparison a `QueryValue` applies to the targets reached by its path.
///
/// Unknown operator names are kept as [`Lookup::Unrecognized`] rather than
/// rejected; the engine evaluates them as equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Lookup {
    /// Target id is one of the candidate values.
    Equal,
    /// Target value contains any candidate.
    Contains,
    /// Target value starts with any candidate.
    StartsWith,
    /// Target value ends with any candidate.
    EndsWith,
    /// Target value matches any candidate LIKE pattern.
    Pattern,
    /// Target value is greater than any candidate.
    Gt,
    /// Target value is greater than or equal to any candidate.
    Gte,
    /// Target value is less than any candidate.
    Lt,
    /// Target value is less than or equal to any candidate.
    Lte,
    /// Target value lies between the first two candidates.
    Range,
    /// Target has no scalar value.
    Null,
    /// Target has a scalar value.
    NotNull,
    /// Target properties match every `property=value` candidate.
    PropertyValues,
    /// An operator this engine does not know.
    Unrecognized(String),
}

impl Lookup {
    /// Resolve an operator name. Never fails.
    pub fn from_name(name: &str) -> Self {
        match name {
            "equal" | "eq" | "exact" => Lookup::Equal,
            "contains" => Lookup::Contains,
            "startswith" => Lookup::StartsWith,
            "endswith" => Lookup::EndsWith,
            "pattern" => Lookup::Pattern,
            "gt" => Lookup::Gt,
            "gte" => Lookup::Gte,
            "lt" => Lookup::Lt,
            "lte" => Lookup::Lte,
            "range" => Lookup::Range,
            "null" => Lookup::Null,
            "not_null" => Lookup::NotNull,
            "property_values" => Lookup::PropertyValues,
            other => Lookup::Unrecognized(other.to_string()),
        }
    }

    /// Canonical operator name.
    pub fn name(&self) -> &str {
        match self {
            Lookup::Equal => "equal",
            Lookup::Contains => "contains",
            Lookup::StartsWith => "startswith",
            Lookup::EndsWith => "endswith",
            Lookup::Pattern => "pattern",
            Lookup::Gt => "gt",
            Lookup::Gte => "gte",
            Lookup::Lt => "lt",
            Lookup::Lte => "lte",
            Lookup::Range => "range",
            Lookup::Null => "null",
            Lookup::NotNull => "not_null",
            Lookup::PropertyValues => "property_values",
            Lookup::Unrecognized(name) => name,
        }
    }

    /// Whether this operator consumes candidate values at all.
    pub fn takes_values(&self) -> bool {
        !matches!(self, Lookup::Null | Lookup::NotNull)
    }
}

/// Returns true for equality or an unset lookup.
pub fn is_equality(lookup: Option<&Lookup>) -> bool {
    matches!(lookup, None | Some(Lookup::Equal))
}

impl From<String> for Lookup {
    fn from(name: String) -> Self {
        Lookup::from_name(&name)
    }
}

impl From<Lookup> for String {
    fn from(lookup: Lookup) -> Self {
        lookup.name().to_string()
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for name in [
            "equal",
            "contains",
            "startswith",
            "endswith",
            "pattern",
            "gt",
            "gte",
            "lt",
            "lte",
            "range",
            "null",
            "not_null",
            "property_values",
        ] {
            assert_eq!(Lookup::from_name(name).name(), name);
        }
    }

    #[test]
    fn test_unrecognized_is_preserved() {
        let lookup = Lookup::from_name("icontains_fuzzy");
        assert_eq!(lookup, Lookup::Unrecognized("icontains_fuzzy".into()));
        assert_eq!(lookup.to_string(), "icontains_fuzzy");
    }

    #[test]
    fn test_equality_detection() {
        assert!(is_equality(None));
        assert!(is_equality(Some(&Lookup::Equal)));
        assert!(!is_equality(Some(&Lookup::Contains)));
        assert!(!is_equality(Some(&Lookup::Unrecognized("x".into()))));
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Lookup::NotNull).unwrap();
        assert_eq!(json, "\"not_null\"");
        let lookup: Lookup = serde_json::from_str("\"whatever\"").unwrap();
        assert_eq!(lookup, Lookup::Unrecognized("whatever".into()));
    }
}
