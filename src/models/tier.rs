use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription tiers, strictly ordered. Route access and credit allowances
/// derive from this ordering, never from per-route conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub const ALL: [PlanTier; 4] = [
        PlanTier::Free,
        PlanTier::Starter,
        PlanTier::Pro,
        PlanTier::Enterprise,
    ];

    /// Credits granted at the start of each 30-day billing period.
    pub fn monthly_allowance(&self) -> i64 {
        match self {
            PlanTier::Free => 50,
            PlanTier::Starter => 1_000,
            PlanTier::Pro => 10_000,
            PlanTier::Enterprise => 50_000,
        }
    }

    /// Monthly price in USD cents.
    pub fn monthly_price_cents(&self) -> u32 {
        match self {
            PlanTier::Free => 0,
            PlanTier::Starter => 900,
            PlanTier::Pro => 2_900,
            PlanTier::Enterprise => 9_900,
        }
    }

    /// Per-minute request ceiling. `None` means unthrottled.
    pub fn requests_per_minute(&self) -> Option<u32> {
        match self {
            PlanTier::Free => Some(10),
            PlanTier::Starter => Some(60),
            PlanTier::Pro => Some(300),
            PlanTier::Enterprise => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Pro => "pro",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(PlanTier::Free),
            "starter" => Ok(PlanTier::Starter),
            "pro" => Ok(PlanTier::Pro),
            "enterprise" => Ok(PlanTier::Enterprise),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}
