//! Coordinate Reference System handling

mod tmerc;

pub use tmerc::{LocalProjection, UtmZone};

use geo::Coord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Coordinate reference of a feature set.
///
/// The core transforms WGS84 geographic degrees, local tangent-plane
/// projections and WGS84 / UTM grids (EPSG 326xx, 327xx). Any other EPSG
/// code is carried through as an opaque projected frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// WGS84 longitude/latitude in degrees (EPSG:4326)
    Geographic,
    /// Local transverse Mercator in meters
    Local(LocalProjection),
    /// Projected frame known only by its EPSG code
    Epsg(u32),
}

impl Crs {
    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Crs::Geographic
    }

    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        if code == 4326 {
            Crs::Geographic
        } else {
            Crs::Epsg(code)
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Geographic)
    }

    pub fn is_projected(&self) -> bool {
        !self.is_geographic()
    }

    /// The local projection, if this is a local tangent-plane frame
    pub fn local(&self) -> Option<&LocalProjection> {
        match self {
            Crs::Local(p) => Some(p),
            _ => None,
        }
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Geographic => Some(4326),
            Crs::Epsg(code) => Some(*code),
            Crs::Local(_) => None,
        }
    }

    /// The UTM zone of an EPSG 326xx/327xx frame
    pub fn utm_zone(&self) -> Option<UtmZone> {
        match self {
            Crs::Epsg(code) => UtmZone::from_epsg(*code),
            _ => None,
        }
    }

    /// Conversion between this frame and WGS84 degrees.
    ///
    /// # Errors
    /// [`Error::CrsMismatch`] for an EPSG frame the core has no transform for.
    pub fn transform(&self) -> Result<FrameTransform> {
        match self {
            Crs::Geographic => Ok(FrameTransform::Identity),
            Crs::Local(p) => Ok(FrameTransform::Local(*p)),
            Crs::Epsg(_) => self.utm_zone().map(FrameTransform::Utm).ok_or_else(|| {
                Error::CrsMismatch(self.identifier(), Crs::Geographic.identifier())
            }),
        }
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        self == other
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        match self {
            Crs::Geographic => "EPSG:4326".to_string(),
            Crs::Epsg(code) => format!("EPSG:{}", code),
            Crs::Local(p) => p.proj_string(),
        }
    }
}

/// Coordinate conversion between one frame and WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameTransform {
    Identity,
    Local(LocalProjection),
    Utm(UtmZone),
}

impl FrameTransform {
    /// WGS84 (lon, lat) into the frame
    pub fn from_geographic(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            FrameTransform::Identity => c,
            FrameTransform::Local(p) => p.forward(c),
            FrameTransform::Utm(z) => z.forward(c),
        }
    }

    /// Frame coordinates back to WGS84 (lon, lat)
    pub fn to_geographic(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            FrameTransform::Identity => c,
            FrameTransform::Local(p) => p.inverse(c),
            FrameTransform::Utm(z) => z.inverse(c),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl FromStr for Crs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let upper = s.to_ascii_uppercase();

        if upper.ends_with("CRS84") || upper.ends_with("CRS:84") {
            return Ok(Crs::Geographic);
        }
        if let Some(code) = upper
            .strip_prefix("EPSG:")
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG::"))
        {
            let code: u32 = code
                .parse()
                .map_err(|_| Error::Projection(format!("invalid EPSG code in '{}'", s)))?;
            return Ok(Crs::from_epsg(code));
        }
        if s.starts_with("+proj=") {
            return parse_proj(s);
        }

        Err(Error::Projection(format!("unrecognized CRS '{}'", s)))
    }
}

/// Parse a PROJ string describing a local tangent-plane frame.
fn parse_proj(s: &str) -> Result<Crs> {
    let mut proj = None;
    let mut lat_0 = 0.0;
    let mut lon_0 = 0.0;

    for token in s.split_whitespace() {
        let Some((key, value)) = token.trim_start_matches('+').split_once('=') else {
            continue;
        };
        let parse = |v: &str| {
            v.parse::<f64>()
                .map_err(|_| Error::Projection(format!("invalid value for {}: '{}'", key, v)))
        };
        match key {
            "proj" => proj = Some(value),
            "lat_0" => lat_0 = parse(value)?,
            "lon_0" => lon_0 = parse(value)?,
            "k" | "k_0" if parse(value)? != 1.0 => {
                return Err(Error::Projection(format!("unsupported scale factor in '{}'", s)));
            }
            "x_0" | "y_0" if parse(value)? != 0.0 => {
                return Err(Error::Projection(format!("unsupported false origin in '{}'", s)));
            }
            _ => {}
        }
    }

    match proj {
        Some("tmerc") => Ok(Crs::Local(LocalProjection::new(lon_0, lat_0)?)),
        Some("longlat") | Some("latlong") => Ok(Crs::Geographic),
        _ => Err(Error::Projection(format!("unsupported projection '{}'", s))),
    }
}

impl TryFrom<String> for Crs {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.identifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = Crs::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_crs_equivalence() {
        let a = Crs::from_epsg(4326);
        let b = Crs::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&Crs::Epsg(3857)));
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::Geographic);
        assert_eq!("epsg:3857".parse::<Crs>().unwrap(), Crs::Epsg(3857));
        assert_eq!(
            "urn:ogc:def:crs:OGC:1.3:CRS84".parse::<Crs>().unwrap(),
            Crs::Geographic
        );
        assert!("EPSG:abc".parse::<Crs>().is_err());
        assert!("WGS-ish".parse::<Crs>().is_err());
    }

    #[test]
    fn test_local_proj_string_round_trip() {
        let crs = Crs::Local(LocalProjection::new(2.1734, 41.3851).unwrap());
        let parsed: Crs = crs.identifier().parse().unwrap();
        assert_eq!(parsed, crs);
        assert!(parsed.is_projected());
        assert!(parsed.epsg().is_none());
    }

    #[test]
    fn test_rejects_non_local_tmerc() {
        let utm_like = "+proj=tmerc +lat_0=0 +lon_0=-3 +k=0.9996 +x_0=500000 +y_0=0";
        assert!(utm_like.parse::<Crs>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Crs::Epsg(25831)).unwrap();
        assert_eq!(json, "\"EPSG:25831\"");
        let back: Crs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Crs::Epsg(25831));
    }

    #[test]
    fn test_utm_frames_are_transformable() {
        let utm = Crs::from_epsg(32631);
        assert_eq!(utm.utm_zone().map(|z| z.zone()), Some(31));

        let t = utm.transform().unwrap();
        let c = Coord { x: 2.1734, y: 41.3851 };
        let back = t.to_geographic(t.from_geographic(c));
        assert!((back.x - c.x).abs() < 1e-9 && (back.y - c.y).abs() < 1e-9);

        assert_eq!(Crs::Geographic.transform().unwrap(), FrameTransform::Identity);
    }

    #[test]
    fn test_unknown_epsg_has_no_transform() {
        let crs = Crs::Epsg(25831);
        assert!(crs.utm_zone().is_none());
        assert!(matches!(crs.transform(), Err(Error::CrsMismatch(a, _)) if a == "EPSG:25831"));
    }
}
