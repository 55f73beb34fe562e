//! Terminal color themes.
//!
//! The player picks `light`, `dark` or `default`; each maps to a small palette
//! used by [`crate::style`] when printing the transcript.

use std::fmt;
use std::str::FromStr;

use colored::Color;
use serde::{Deserialize, Serialize};

/// RGB color used in palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ThemeColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to `colored::Color` for use with the colored crate
    pub fn to_color(self) -> Color {
        Color::TrueColor {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Colors for the parts of the transcript that are not interpreter text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub command: ThemeColor,
    pub notice: ThemeColor,
    pub error: ThemeColor,
    pub section: ThemeColor,
    /// Interpreter text; `None` keeps the terminal's own foreground.
    pub text: Option<ThemeColor>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Light,
    Dark,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Default, Theme::Light, Theme::Dark];

    pub fn palette(self) -> Palette {
        match self {
            Theme::Default => Palette {
                command: ThemeColor::new(250, 200, 100),
                notice: ThemeColor::new(20, 220, 100),
                error: ThemeColor::new(230, 30, 30),
                section: ThemeColor::new(75, 80, 75),
                text: None,
            },
            Theme::Light => Palette {
                command: ThemeColor::new(150, 80, 0),
                notice: ThemeColor::new(0, 120, 60),
                error: ThemeColor::new(180, 0, 0),
                section: ThemeColor::new(140, 140, 140),
                text: Some(ThemeColor::new(30, 30, 30)),
            },
            Theme::Dark => Palette {
                command: ThemeColor::new(255, 220, 130),
                notice: ThemeColor::new(110, 220, 110),
                error: ThemeColor::new(255, 90, 90),
                section: ThemeColor::new(110, 110, 110),
                text: Some(ThemeColor::new(220, 220, 220)),
            },
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Default => "default",
            Theme::Light => "light",
            Theme::Dark => "dark",
        };
        f.write_str(name)
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Theme::Default),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}' (expected default, light or dark)")),
        }
    }
}
