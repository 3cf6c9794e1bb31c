//! Route-shape categories.
//!
//! Raw route labels from the participation table (`GO`, `SLANT`, `POST`, ...)
//! collapse into a closed set of shape families. Every per-shape column the
//! feature assembler emits is driven by [`RouteShape::ALL`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PipelineError, Result};

/// Shape family of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RouteShape {
    #[serde(rename = "straight")]
    Straight,
    #[serde(rename = "shortstraight")]
    ShortStraight,
    #[serde(rename = "early45angle")]
    Early45Angle,
    #[serde(rename = "late45angle")]
    Late45Angle,
    #[serde(rename = "90angle")]
    Angle90,
    #[serde(rename = "flat")]
    Flat,
    #[serde(rename = "screen")]
    Screen,
    #[serde(rename = "wheelangle")]
    WheelAngle,
}

impl RouteShape {
    /// All categories, in column order.
    pub const ALL: [RouteShape; 8] = [
        RouteShape::Straight,
        RouteShape::ShortStraight,
        RouteShape::Early45Angle,
        RouteShape::Late45Angle,
        RouteShape::Angle90,
        RouteShape::Flat,
        RouteShape::Screen,
        RouteShape::WheelAngle,
    ];

    /// Number of categories.
    pub const COUNT: usize = Self::ALL.len();

    /// Map a raw route label (case-insensitive) to its shape family.
    pub fn from_route_label(label: &str) -> Result<Self> {
        match label.trim().to_uppercase().as_str() {
            "GO" => Ok(RouteShape::Straight),
            "HITCH" => Ok(RouteShape::ShortStraight),
            "SLANT" | "CROSS" => Ok(RouteShape::Early45Angle),
            "POST" | "CORNER" => Ok(RouteShape::Late45Angle),
            "OUT" | "IN" => Ok(RouteShape::Angle90),
            "FLAT" => Ok(RouteShape::Flat),
            "SCREEN" => Ok(RouteShape::Screen),
            "ANGLE" | "WHEEL" => Ok(RouteShape::WheelAngle),
            _ => Err(PipelineError::UnknownRoute(label.to_string())),
        }
    }

    /// Column-friendly name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteShape::Straight => "straight",
            RouteShape::ShortStraight => "shortstraight",
            RouteShape::Early45Angle => "early45angle",
            RouteShape::Late45Angle => "late45angle",
            RouteShape::Angle90 => "90angle",
            RouteShape::Flat => "flat",
            RouteShape::Screen => "screen",
            RouteShape::WheelAngle => "wheelangle",
        }
    }

    /// Position of this category in [`RouteShape::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for RouteShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteShape {
    type Err = PipelineError;

    /// Parse a category name as written by [`RouteShape::as_str`].
    fn from_str(s: &str) -> Result<Self> {
        RouteShape::ALL
            .iter()
            .copied()
            .find(|shape| shape.as_str() == s)
            .ok_or_else(|| PipelineError::UnknownRoute(s.to_string()))
    }
}
