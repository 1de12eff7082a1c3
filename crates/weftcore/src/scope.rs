use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sharing granularity of a data node.
///
/// Ordered from broadest to narrowest sharing: a `Global` node is shared by
/// every entity in the application, a `Pipeline` node is private to one
/// pipeline instance. "Narrowest wins" comparisons therefore use [`Ord::max`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Cycle,
    Scenario,
    Pipeline,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Cycle => write!(f, "cycle"),
            Scope::Scenario => write!(f, "scenario"),
            Scope::Pipeline => write!(f, "pipeline"),
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Ok(Scope::Global),
            "cycle" => Ok(Scope::Cycle),
            "scenario" => Ok(Scope::Scenario),
            "pipeline" => Ok(Scope::Pipeline),
            other => Err(format!("unknown scope: {}", other)),
        }
    }
}

/// Recurrence frequency of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(format!("unknown frequency: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_orders_from_broadest_to_narrowest() {
        assert!(Scope::Global < Scope::Cycle);
        assert!(Scope::Cycle < Scope::Scenario);
        assert!(Scope::Scenario < Scope::Pipeline);
    }

    #[test]
    fn narrowest_scope_is_the_maximum() {
        let scopes = [Scope::Scenario, Scope::Global, Scope::Pipeline];
        assert_eq!(scopes.iter().copied().max(), Some(Scope::Pipeline));
    }

    #[test]
    fn scope_parses_case_insensitively() {
        assert_eq!("GLOBAL".parse::<Scope>().unwrap(), Scope::Global);
        assert_eq!("pipeline".parse::<Scope>().unwrap(), Scope::Pipeline);
        assert!("galaxy".parse::<Scope>().is_err());
    }
}
