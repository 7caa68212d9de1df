//! # Viewport Profiles
//!
//! Named browser window sizes used for a comparison run. A profile is an
//! immutable value handed to the run; nothing here reads the host screen.
//! Callers that want the desktop size to follow the local display measure it
//! themselves and pass it to [`ViewportProfile::desktop_for_screen`].

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Device class a profile emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportKind {
    Desktop,
    Tablet,
    Mobile,
}

impl ViewportKind {
    pub fn name(&self) -> &'static str {
        match self {
            ViewportKind::Desktop => "desktop",
            ViewportKind::Tablet => "tablet",
            ViewportKind::Mobile => "mobile",
        }
    }

    /// User agent the browser session presents for this device class.
    pub fn user_agent(&self) -> &'static str {
        match self {
            ViewportKind::Desktop => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            }
            ViewportKind::Tablet => {
                "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1"
            }
            ViewportKind::Mobile => {
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1"
            }
        }
    }
}

impl std::fmt::Display for ViewportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Browser window size for one comparison run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportProfile {
    pub kind: ViewportKind,
    pub width: u32,
    pub height: u32,
}

impl ViewportProfile {
    pub const DESKTOP: ViewportProfile = ViewportProfile {
        kind: ViewportKind::Desktop,
        width: 1920,
        height: 1080,
    };

    pub const TABLET: ViewportProfile = ViewportProfile {
        kind: ViewportKind::Tablet,
        width: 768,
        height: 1024,
    };

    pub const MOBILE: ViewportProfile = ViewportProfile {
        kind: ViewportKind::Mobile,
        width: 375,
        height: 667,
    };

    /// Fixed preset for a device class.
    pub fn preset(kind: ViewportKind) -> Self {
        match kind {
            ViewportKind::Desktop => Self::DESKTOP,
            ViewportKind::Tablet => Self::TABLET,
            ViewportKind::Mobile => Self::MOBILE,
        }
    }

    /// Desktop profile derived from a measured screen: full width, half height.
    ///
    /// Falls back to the fixed desktop preset when the measurement is unusable.
    pub fn desktop_for_screen(screen_width: u32, screen_height: u32) -> Self {
        let height = screen_height / 2;
        if screen_width == 0 || height == 0 {
            log::warn!(
                "screen size {}x{} unusable, falling back to {}x{}",
                screen_width,
                screen_height,
                Self::DESKTOP.width,
                Self::DESKTOP.height
            );
            return Self::DESKTOP;
        }
        Self {
            kind: ViewportKind::Desktop,
            width: screen_width,
            height,
        }
    }

    /// Override the preset size, keeping the device class.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn user_agent(&self) -> &'static str {
        self.kind.user_agent()
    }
}

impl Default for ViewportProfile {
    fn default() -> Self {
        Self::DESKTOP
    }
}
