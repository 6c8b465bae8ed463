use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// Requested sophistication of the generated code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Intermediate,
    Advanced,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Intermediate => "intermediate",
            Complexity::Advanced => "advanced",
        }
    }

    fn base_cost(self) -> i64 {
        match self {
            Complexity::Simple | Complexity::Intermediate => 1,
            Complexity::Advanced => 2,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownComplexity(pub String);

impl FromStr for Complexity {
    type Err = UnknownComplexity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Complexity::Simple),
            "intermediate" => Ok(Complexity::Intermediate),
            "advanced" => Ok(Complexity::Advanced),
            other => Err(UnknownComplexity(other.to_string())),
        }
    }
}

/// Credits charged for one generation.
///
/// Used both for the quote shown before generating and for the actual debit.
pub fn generation_cost(complexity: Complexity, include_tests: bool, framework: Option<&str>) -> i64 {
    let mut cost = complexity.base_cost();
    if include_tests {
        cost += 1;
    }
    if framework.is_some_and(|f| !f.trim().is_empty()) {
        cost += 1;
    }
    cost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_costs() {
        assert_eq!(generation_cost(Complexity::Simple, false, None), 1);
        assert_eq!(generation_cost(Complexity::Intermediate, false, None), 1);
        assert_eq!(generation_cost(Complexity::Advanced, false, None), 2);
    }

    #[test]
    fn test_advanced_with_tests_and_framework() {
        assert_eq!(generation_cost(Complexity::Advanced, true, Some("axum")), 4);
    }

    #[test]
    fn test_blank_framework_is_free() {
        assert_eq!(generation_cost(Complexity::Simple, false, Some("")), 1);
        assert_eq!(generation_cost(Complexity::Simple, false, Some("   ")), 1);
        assert_eq!(generation_cost(Complexity::Intermediate, true, Some("react")), 3);
    }

    #[test]
    fn test_complexity_text_round_trip() {
        for c in [Complexity::Simple, Complexity::Intermediate, Complexity::Advanced] {
            assert_eq!(c.as_str().parse::<Complexity>(), Ok(c));
        }
        assert!("expert".parse::<Complexity>().is_err());
    }

    #[test]
    fn test_complexity_deserializes_snake_case() {
        let c: Complexity = serde_json::from_str("\"intermediate\"").unwrap();
        assert_eq!(c, Complexity::Intermediate);
    }
}
