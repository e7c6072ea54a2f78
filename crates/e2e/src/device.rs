//! Viewport handling and the navigation reachability predicate

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::E2eError;

/// Viewports narrower than this render the side navigation collapsed
pub const DEFAULT_MOBILE_BREAKPOINT: u32 = 414;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const DESKTOP: Viewport = Viewport { width: 1280, height: 1000 };
    pub const MOBILE: Viewport = Viewport { width: 375, height: 667 };
}

impl Default for Viewport {
    fn default() -> Self {
        Self::DESKTOP
    }
}

impl FromStr for Viewport {
    type Err = E2eError;

    /// Parses `WIDTHxHEIGHT`, e.g. `375x667`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || E2eError::InvalidConfig(format!("viewport must look like 1280x1000, got '{}'", s));
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(bad)?;
        let width = w.trim().parse().map_err(|_| bad())?;
        let height = h.trim().parse().map_err(|_| bad())?;
        if width == 0 || height == 0 {
            return Err(bad());
        }
        Ok(Viewport { width, height })
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Whether the primary navigation can be clicked directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationLayout {
    /// Side navigation is rendered open
    Direct,
    /// Side navigation sits behind a toggle that must be opened first
    Collapsed,
}

impl NavigationLayout {
    pub fn for_viewport(viewport: Viewport, mobile_breakpoint: u32) -> Self {
        if viewport.width < mobile_breakpoint {
            NavigationLayout::Collapsed
        } else {
            NavigationLayout::Direct
        }
    }

    pub fn requires_toggle(self) -> bool {
        matches!(self, NavigationLayout::Collapsed)
    }
}
