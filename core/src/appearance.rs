//! Deterministic colors and sizes for robot and object overlays.

use std::fmt;

/// Color assigned to an overlay element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MarkerColor {
    red: u8,
    green: u8,
    blue: u8,
}

impl MarkerColor {
    /// Saturated yellow used for detected people.
    pub const YELLOW: Self = Self::from_rgb(255, 255, 0);
    /// Orange used for detected cones.
    pub const ORANGE: Self = Self::from_rgb(255, 165, 0);

    /// Creates a color from byte RGB components.
    #[must_use]
    pub const fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Creates a color from hue in degrees and saturation/lightness percentages.
    #[must_use]
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let hue = hue.rem_euclid(360.0);
        let saturation = (saturation / 100.0).clamp(0.0, 1.0);
        let lightness = (lightness / 100.0).clamp(0.0, 1.0);

        let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let sector = hue / 60.0;
        let secondary = chroma * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
        let (red, green, blue) = match sector as u32 {
            0 => (chroma, secondary, 0.0),
            1 => (secondary, chroma, 0.0),
            2 => (0.0, chroma, secondary),
            3 => (0.0, secondary, chroma),
            4 => (secondary, 0.0, chroma),
            _ => (chroma, 0.0, secondary),
        };
        let base = lightness - chroma / 2.0;

        Self::from_rgb(
            channel(red + base),
            channel(green + base),
            channel(blue + base),
        )
    }

    /// Color shared by every overlay belonging to the robot.
    ///
    /// The hue steps by 137 degrees per identifier so neighbouring ids stay
    /// visually distinct.
    #[must_use]
    pub fn for_robot(robot: crate::RobotId) -> Self {
        let hue = (u64::from(robot.get()) * 137) % 360;
        Self::from_hsl(hue as f64, 100.0, 50.0)
    }

    /// Red component of the color.
    #[must_use]
    pub const fn red(&self) -> u8 {
        self.red
    }

    /// Green component of the color.
    #[must_use]
    pub const fn green(&self) -> u8 {
        self.green
    }

    /// Blue component of the color.
    #[must_use]
    pub const fn blue(&self) -> u8 {
        self.blue
    }
}

fn channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Category of a detected object derived from its free-form type tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A person detected near the fleet.
    Person,
    /// A traffic cone.
    Cone,
    /// Any other tag, kept verbatim.
    Other(String),
}

impl ObjectKind {
    /// Classifies the provided tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "person" => Self::Person,
            "cone" => Self::Cone,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Tag string originally reported by the feed.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Person => "person",
            Self::Cone => "cone",
            Self::Other(tag) => tag,
        }
    }

    /// Color and radius used to draw objects of this kind.
    #[must_use]
    pub fn appearance(&self) -> ObjectAppearance {
        match self {
            Self::Person => ObjectAppearance::new(MarkerColor::YELLOW, 12.0),
            Self::Cone => ObjectAppearance::new(MarkerColor::ORANGE, 10.0),
            Self::Other(tag) => {
                let hue = tag_hash(tag).unsigned_abs() % 360;
                ObjectAppearance::new(MarkerColor::from_hsl(f64::from(hue), 70.0, 50.0), 10.0)
            }
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 32-bit rolling hash over UTF-16 code units: `h = c + (h << 5) - h`.
fn tag_hash(tag: &str) -> i32 {
    tag.encode_utf16().fold(0i32, |hash, unit| {
        i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    })
}

/// Visual parameters of a detected object marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectAppearance {
    color: MarkerColor,
    radius: f64,
}

impl ObjectAppearance {
    /// Creates an appearance with the provided fill color and radius in pixels.
    #[must_use]
    pub const fn new(color: MarkerColor, radius: f64) -> Self {
        Self { color, radius }
    }

    /// Fill color of the marker.
    #[must_use]
    pub const fn color(&self) -> MarkerColor {
        self.color
    }

    /// Marker radius in pixels.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RobotId;

    #[test]
    fn robot_color_is_deterministic() {
        let first = MarkerColor::for_robot(RobotId::new(7));
        let second = MarkerColor::for_robot(RobotId::new(7));

        assert_eq!(first, second);
        assert_ne!(first, MarkerColor::for_robot(RobotId::new(8)));
    }

    #[test]
    fn robot_hue_steps_by_137_degrees() {
        assert_eq!(
            MarkerColor::for_robot(RobotId::new(0)),
            MarkerColor::from_rgb(255, 0, 0)
        );
        // 137 * 1 = 137 degrees lies in the green sector.
        let green_dominant = MarkerColor::for_robot(RobotId::new(1));
        assert!(green_dominant.green() > green_dominant.red());
        assert!(green_dominant.green() > green_dominant.blue());
    }

    #[test]
    fn hsl_primaries_convert_exactly() {
        assert_eq!(MarkerColor::from_hsl(0.0, 100.0, 50.0), MarkerColor::from_rgb(255, 0, 0));
        assert_eq!(MarkerColor::from_hsl(120.0, 100.0, 50.0), MarkerColor::from_rgb(0, 255, 0));
        assert_eq!(MarkerColor::from_hsl(240.0, 100.0, 50.0), MarkerColor::from_rgb(0, 0, 255));
        assert_eq!(MarkerColor::from_hsl(360.0, 100.0, 50.0), MarkerColor::from_rgb(255, 0, 0));
    }

    #[test]
    fn known_tags_use_fixed_appearance() {
        let person = ObjectKind::from_tag("person").appearance();
        assert_eq!(person.color(), MarkerColor::YELLOW);
        assert_eq!(person.radius(), 12.0);

        let cone = ObjectKind::from_tag("cone").appearance();
        assert_eq!(cone.color(), MarkerColor::ORANGE);
        assert_eq!(cone.radius(), 10.0);
    }

    #[test]
    fn unknown_tags_fall_back_to_hashed_hue() {
        let pallet = ObjectKind::from_tag("pallet");
        assert_eq!(pallet, ObjectKind::Other("pallet".to_owned()));
        assert_eq!(pallet.appearance(), ObjectKind::from_tag("pallet").appearance());
        assert_eq!(pallet.appearance().radius(), 10.0);
        assert_eq!(pallet.tag(), "pallet");
    }

    #[test]
    fn tag_hash_matches_reference_values() {
        assert_eq!(tag_hash(""), 0);
        assert_eq!(tag_hash("a"), 97);
        assert_eq!(tag_hash("ab"), 97 * 31 + 98);
    }
}
