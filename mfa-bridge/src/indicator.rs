//! The fixed set of MFA panel indicators
//!
//! Thirteen named lamps, matching the charlieplexed hardware. Wire indices
//! are 1-based (the `LED:n:s` serial form counts from 1); the 12-LED
//! four-pin hardware variant simply has no Befehl40 path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical indicator lamp on the MFA panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Indicator {
    /// SIFA vigilance warning (white)
    Sifa,
    /// LZB Ende (yellow)
    LzbEnde,
    /// PZB train category 70 km/h (blue)
    Pzb70,
    /// PZB train category 85 km/h (blue)
    Pzb85,
    /// PZB train category 55 km/h (blue)
    Pzb55,
    /// 500 Hz magnet (red)
    Hz500,
    /// 1000 Hz magnet (yellow)
    Hz1000,
    /// Doors released, left side (yellow)
    DoorsLeft,
    /// Doors released, right side (yellow)
    DoorsRight,
    /// LZB Ü transmission (blue)
    LzbUe,
    /// LZB G active (red)
    LzbG,
    /// LZB S emergency braking (red)
    LzbS,
    /// Befehl 40 override (yellow); absent on the 12-LED variant
    Befehl40,
}

/// All indicators in wire order (index 1 first)
pub const ALL: [Indicator; 13] = [
    Indicator::Sifa,
    Indicator::LzbEnde,
    Indicator::Pzb70,
    Indicator::Pzb85,
    Indicator::Pzb55,
    Indicator::Hz500,
    Indicator::Hz1000,
    Indicator::DoorsLeft,
    Indicator::DoorsRight,
    Indicator::LzbUe,
    Indicator::LzbG,
    Indicator::LzbS,
    Indicator::Befehl40,
];

impl Indicator {
    /// Number of indicators
    pub const COUNT: usize = ALL.len();

    /// 1-based index on the wire (`LED:n:s`)
    pub fn index(self) -> u8 {
        ALL.iter().position(|i| *i == self).unwrap_or(0) as u8 + 1
    }

    /// Serial command alias (`ALIAS:0|1`)
    pub fn alias(self) -> &'static str {
        match self {
            Indicator::Sifa => "SIFA",
            Indicator::LzbEnde => "LZB",
            Indicator::Pzb70 => "PZB70",
            Indicator::Pzb85 => "PZB85",
            Indicator::Pzb55 => "PZB55",
            Indicator::Hz500 => "500HZ",
            Indicator::Hz1000 => "1000HZ",
            Indicator::DoorsLeft => "TUEREN_L",
            Indicator::DoorsRight => "TUEREN_R",
            Indicator::LzbUe => "LZB_UE",
            Indicator::LzbG => "LZB_G",
            Indicator::LzbS => "LZB_S",
            Indicator::Befehl40 => "BEF40",
        }
    }

    /// Reverse lookup from a serial alias
    pub fn from_alias(alias: &str) -> Option<Indicator> {
        ALL.into_iter().find(|i| i.alias() == alias)
    }

    /// Lookup by 1-based wire index
    pub fn from_index(index: u8) -> Option<Indicator> {
        if index == 0 {
            return None;
        }
        ALL.get(index as usize - 1).copied()
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_dense_and_one_based() {
        for (pos, ind) in ALL.iter().enumerate() {
            assert_eq!(ind.index() as usize, pos + 1);
            assert_eq!(Indicator::from_index(ind.index()), Some(*ind));
        }
        assert_eq!(Indicator::from_index(0), None);
        assert_eq!(Indicator::from_index(14), None);
    }

    #[test]
    fn test_alias_round_trip() {
        for ind in ALL {
            assert_eq!(Indicator::from_alias(ind.alias()), Some(ind));
        }
        assert_eq!(Indicator::from_alias("PZB99"), None);
    }
}
