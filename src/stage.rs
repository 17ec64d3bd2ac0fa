//! Build stages and plugin priorities.
//!
//! The stage sequence is fixed for the life of the program. Configuration
//! can change which plugins run, never the order of the phases they run in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One globally ordered phase of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Load,
    Transform,
    Render,
    Collect,
    Write,
    Cleanup,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 7] = [
        Stage::Discover,
        Stage::Load,
        Stage::Transform,
        Stage::Render,
        Stage::Collect,
        Stage::Write,
        Stage::Cleanup,
    ];

    /// Position of this stage in [`Stage::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Load => "load",
            Stage::Transform => "transform",
            Stage::Render => "render",
            Stage::Collect => "collect",
            Stage::Write => "write",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named priority bands. Plugins may use any `i32`; these are anchors.
///
/// Lower runs earlier. `FIRST` and `LAST` sit far from the others so a
/// plugin can still be placed before `EARLY` or after `LATE` without
/// colliding with the extremes.
pub struct Priority;

impl Priority {
    pub const FIRST: i32 = -1000;
    pub const EARLY: i32 = -100;
    pub const DEFAULT: i32 = 0;
    pub const LATE: i32 = 100;
    pub const LAST: i32 = 1000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_in_declaration_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn stages_compare_by_execution_order() {
        assert!(Stage::Discover < Stage::Load);
        assert!(Stage::Write < Stage::Cleanup);
    }

    #[test]
    fn display_uses_lowercase_name() {
        assert_eq!(Stage::Transform.to_string(), "transform");
    }

    #[test]
    fn priority_bands_ascend() {
        let bands = [
            Priority::FIRST,
            Priority::EARLY,
            Priority::DEFAULT,
            Priority::LATE,
            Priority::LAST,
        ];
        assert!(bands.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Priority::DEFAULT, 0);
    }
}
