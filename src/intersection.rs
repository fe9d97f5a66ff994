use geo::{CoordNum, Rect};

use crate::errors::{PdsError, Result};

pub trait Intersection {
    type Output;
    fn intersection(&self, rhs: &Self) -> Result<Self::Output>;

    fn intersects(&self, rhs: &Self) -> bool {
        self.intersection(rhs).is_ok()
    }
}

impl<T: CoordNum> Intersection for Rect<T> {
    type Output = Rect<T>;
    fn intersection(&self, rhs: &Self) -> Result<Rect<T>> {
        let lhs_max = self.max();
        let rhs_min = rhs.min();
        if (lhs_max.x < rhs_min.x) | (lhs_max.y < rhs_min.y) {
            return Err(PdsError::OutsideBounds(
                "There is no intersection between geometries".into(),
            ));
        }

        let lhs_min = self.min();
        let rhs_max = rhs.max();
        if (lhs_min.x > rhs_max.x) | (lhs_min.y > rhs_max.y) {
            return Err(PdsError::OutsideBounds(
                "There is no intersection between geometries".into(),
            ));
        }

        let pick = |a: T, b: T, larger: bool| if (a > b) == larger { a } else { b };
        let min = geo::Coord {
            x: pick(lhs_min.x, rhs_min.x, true),
            y: pick(lhs_min.y, rhs_min.y, true),
        };
        let max = geo::Coord {
            x: pick(lhs_max.x, rhs_max.x, false),
            y: pick(lhs_max.y, rhs_max.y, false),
        };

        Ok(Self::new(min, max))
    }
}
