use std::{f64::consts::PI, fmt::Display, str::FromStr};

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::errors::{PdsError, Result};

/// Web Mercator sphere radius.
const MERCATOR_RADIUS: f64 = 6_378_137.0;
/// Authalic sphere used by the MODLAND sinusoidal grid.
pub(crate) const SINUSOIDAL_RADIUS: f64 = 6_371_007.181;
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;
/// Points sampled per edge when transforming bounds.
const DENSIFY_PTS: usize = 21;

/// Coordinate reference systems the readers need to talk about.
///
/// Geographic, Web Mercator and the MODIS sinusoidal grid are converted
/// in-crate; any other EPSG code needs the `proj` feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    Wgs84,
    WebMercator,
    Sinusoidal,
    Epsg(u32),
}

impl Crs {
    pub fn epsg(code: u32) -> Self {
        match code {
            4326 => Self::Wgs84,
            3857 => Self::WebMercator,
            code => Self::Epsg(code),
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Wgs84)
    }

    /// Convert a coordinate of this CRS into longitude/latitude.
    pub fn to_geographic(&self, coord: Coord) -> Result<Coord> {
        match self {
            Self::Wgs84 => Ok(coord),
            Self::WebMercator => Ok(Coord {
                x: (coord.x / MERCATOR_RADIUS).to_degrees(),
                y: (2.0 * (coord.y / MERCATOR_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
            }),
            Self::Sinusoidal => {
                let lat = coord.y / SINUSOIDAL_RADIUS;
                let cos_lat = lat.cos();
                let lon = if cos_lat.abs() < f64::EPSILON {
                    0.0
                } else {
                    coord.x / (SINUSOIDAL_RADIUS * cos_lat)
                };
                Ok(Coord {
                    x: lon.to_degrees(),
                    y: lat.to_degrees(),
                })
            }
            Self::Epsg(_) => proj_convert(self, &Self::Wgs84, coord),
        }
    }

    /// Convert a longitude/latitude coordinate into this CRS.
    pub fn from_geographic(&self, coord: Coord) -> Result<Coord> {
        match self {
            Self::Wgs84 => Ok(coord),
            Self::WebMercator => {
                let lat = coord.y.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
                Ok(Coord {
                    x: MERCATOR_RADIUS * coord.x.to_radians(),
                    y: MERCATOR_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln(),
                })
            }
            Self::Sinusoidal => {
                let lat = coord.y.to_radians();
                Ok(Coord {
                    x: SINUSOIDAL_RADIUS * coord.x.to_radians() * lat.cos(),
                    y: SINUSOIDAL_RADIUS * lat,
                })
            }
            Self::Epsg(_) => proj_convert(&Self::Wgs84, self, coord),
        }
    }

    pub fn transform(&self, to: &Crs, coord: Coord) -> Result<Coord> {
        if self == to {
            return Ok(coord);
        }
        to.from_geographic(self.to_geographic(coord)?)
    }

    /// Transform a rectangle, densifying its edges so curved
    /// projections keep their extremes.
    pub fn transform_bounds(&self, to: &Crs, rect: &Rect) -> Result<Rect> {
        if self == to {
            return Ok(*rect);
        }
        let (min, max) = (rect.min(), rect.max());
        let step = |a: f64, b: f64, i: usize| a + (b - a) * i as f64 / (DENSIFY_PTS - 1) as f64;
        let mut edges = Vec::with_capacity(DENSIFY_PTS * 4);
        for i in 0..DENSIFY_PTS {
            let x = step(min.x, max.x, i);
            let y = step(min.y, max.y, i);
            edges.extend([
                Coord { x, y: min.y },
                Coord { x, y: max.y },
                Coord { x: min.x, y },
                Coord { x: max.x, y },
            ]);
        }
        let transformed = edges
            .into_iter()
            .map(|coord| self.transform(to, coord))
            .collect::<Result<Vec<_>>>()?;
        let (mut lo, mut hi) = (transformed[0], transformed[0]);
        for coord in &transformed[1..] {
            lo = Coord {
                x: lo.x.min(coord.x),
                y: lo.y.min(coord.y),
            };
            hi = Coord {
                x: hi.x.max(coord.x),
                y: hi.y.max(coord.y),
            };
        }
        Ok(Rect::new(lo, hi))
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wgs84 => write!(f, "EPSG:4326"),
            Self::WebMercator => write!(f, "EPSG:3857"),
            Self::Sinusoidal => write!(f, "SR-ORG:6842"),
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
        }
    }
}

impl FromStr for Crs {
    type Err = PdsError;

    /// Accepts `EPSG:n`, `epsg:n` and OGC URNs such as
    /// `urn:ogc:def:crs:EPSG:8.8.1:32719`.
    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("SR-ORG:6842") {
            return Ok(Self::Sinusoidal);
        }
        let upper = s.to_ascii_uppercase();
        if !upper.contains("EPSG") {
            return Err(PdsError::UnsupportedCrs(s.into()));
        }
        upper
            .rsplit(':')
            .next()
            .and_then(|code| code.parse::<u32>().ok())
            .map(Self::epsg)
            .ok_or_else(|| PdsError::UnsupportedCrs(s.into()))
    }
}

#[cfg(feature = "proj")]
fn proj_convert(from: &Crs, to: &Crs, coord: Coord) -> Result<Coord> {
    let proj = proj::Proj::new_known_crs(&from.to_string(), &to.to_string(), None)?;
    let (x, y) = proj.convert((coord.x, coord.y))?;
    Ok(Coord { x, y })
}

#[cfg(not(feature = "proj"))]
fn proj_convert(from: &Crs, _to: &Crs, _coord: Coord) -> Result<Coord> {
    Err(PdsError::UnsupportedCrs(from.to_string()))
}
