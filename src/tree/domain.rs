//! Bounding boxes of point sets and the cubic root domain of a tree.
use log::warn;

use crate::{
    constants::DOMAIN_PADDING,
    types::{real, Error, RealScalar, Result},
};

/// Axis aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox<T: RealScalar, const DIM: usize> {
    /// Lower corner.
    pub min: [T; DIM],
    /// Upper corner.
    pub max: [T; DIM],
}

impl<T: RealScalar, const DIM: usize> BoundingBox<T, DIM> {
    /// A degenerate bounding box containing a single point.
    pub fn from_point(point: &[T; DIM]) -> Self {
        Self {
            min: *point,
            max: *point,
        }
    }

    /// Compute the bounding box of several point sets.
    ///
    /// Fails if the point sets are all empty or contain non-finite coordinates.
    pub fn from_points<'a>(point_sets: impl IntoIterator<Item = &'a [[T; DIM]]>) -> Result<Self> {
        let mut bbox: Option<Self> = None;

        for point in point_sets.into_iter().flatten() {
            if point.iter().any(|x| !x.is_finite()) {
                return Err(Error::Configuration(format!(
                    "Non-finite particle coordinate {point:?}"
                )));
            }
            match bbox.as_mut() {
                Some(bbox) => bbox.extend(point),
                None => bbox = Some(Self::from_point(point)),
            }
        }

        bbox.ok_or_else(|| Error::Configuration("Cannot bound an empty set of points".to_string()))
    }

    /// Grow the box so that it contains `point`.
    pub fn extend(&mut self, point: &[T; DIM]) {
        for ((lo, hi), &x) in self.min.iter_mut().zip(self.max.iter_mut()).zip(point) {
            *lo = lo.min(x);
            *hi = hi.max(x);
        }
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        let mut result = *self;
        result.extend(&other.min);
        result.extend(&other.max);
        result
    }

    /// Check if a point lies inside the box, boundary included.
    pub fn contains(&self, point: &[T; DIM]) -> bool {
        point
            .iter()
            .zip(self.min.iter().zip(&self.max))
            .all(|(x, (lo, hi))| lo <= x && x <= hi)
    }

    /// Check if another box lies inside this box, boundary included.
    pub fn contains_box(&self, other: &Self) -> bool {
        self.contains(&other.min) && self.contains(&other.max)
    }

    /// Side lengths along each axis.
    pub fn diameter(&self) -> [T; DIM] {
        let mut diameter = [T::zero(); DIM];
        for (d, (lo, hi)) in diameter.iter_mut().zip(self.min.iter().zip(&self.max)) {
            *d = *hi - *lo;
        }
        diameter
    }
}

/// A cubic domain defined by the lower corner of the root box and its side length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain<T: RealScalar, const DIM: usize> {
    /// Lower corner of the root box.
    pub origin: [T; DIM],

    /// Side length of the root box.
    pub extent: T,
}

impl<T: RealScalar, const DIM: usize> Domain<T, DIM> {
    /// Construct a domain from a user specified origin and side length.
    pub fn new(origin: &[T; DIM], extent: T) -> Self {
        Self {
            origin: *origin,
            extent,
        }
    }

    /// Compute the cubic root domain enclosing a bounding box. The domain is padded such
    /// that no point lies on its boundary.
    pub fn from_bounding_box(bbox: &BoundingBox<T, DIM>) -> Self {
        let mut diameter = bbox
            .diameter()
            .iter()
            .fold(T::zero(), |acc, &d| acc.max(d));

        if diameter == T::zero() {
            warn!("All particles coincide, using a unit root box");
            diameter = T::one();
        }

        // Padding must also survive rounding at the magnitude of the coordinates
        let magnitude = bbox
            .min
            .iter()
            .chain(bbox.max.iter())
            .fold(T::zero(), |acc, x| acc.max(x.abs()));
        let padding = (diameter * real(DOMAIN_PADDING)).max(magnitude * T::epsilon() * real(64));

        let mut origin = bbox.min;
        for x in origin.iter_mut() {
            *x = *x - padding;
        }

        Self {
            origin,
            extent: diameter + padding + padding,
        }
    }

    /// Side length of a box at a given level.
    pub fn box_size(&self, level: usize) -> T {
        self.extent / real::<T, _>(1u64 << level)
    }

    /// Center of the box at `level` with integer coordinates `anchor`.
    pub fn box_center(&self, level: usize, anchor: &[u64; DIM]) -> [T; DIM] {
        let size = self.box_size(level);
        let half = real::<T, _>(0.5);
        let mut center = self.origin;
        for (x, &a) in center.iter_mut().zip(anchor) {
            *x = *x + (real::<T, _>(a) + half) * size;
        }
        center
    }

    /// Lower and upper corner of the box at `level` with integer coordinates `anchor`.
    ///
    /// Corners are computed from integer multiples of the box size, so that the shared faces of
    /// neighbouring boxes and the faces of a parent and its children coincide exactly.
    pub fn box_extent(&self, level: usize, anchor: &[u64; DIM]) -> ([T; DIM], [T; DIM]) {
        let size = self.box_size(level);
        let mut lower = self.origin;
        let mut upper = self.origin;
        for ((lo, hi), &a) in lower.iter_mut().zip(upper.iter_mut()).zip(anchor) {
            *lo = *lo + real::<T, _>(a) * size;
            *hi = *hi + real::<T, _>(a + 1) * size;
        }
        (lower, upper)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tools::make_uniform_particle_array;

    fn test_compute_bounds<const DIM: usize>(points: &[[f64; DIM]]) {
        let bbox = BoundingBox::from_points([points]).unwrap();
        let domain = Domain::from_bounding_box(&bbox);
        let (lower, upper) = domain.box_extent(0, &[0; DIM]);

        for point in points {
            assert!(bbox.contains(point));
            for d in 0..DIM {
                // Strictly inside the root box
                assert!(lower[d] < point[d] && point[d] < upper[d]);
            }
        }
    }

    #[test]
    fn test_bounds() {
        let npoints = 10000;

        // Points in the positive octant only
        let points = make_uniform_particle_array::<f64, 3>(npoints, None, None, 0);
        test_compute_bounds(&points);

        // Points in positive and negative octants
        let points = make_uniform_particle_array::<f64, 3>(npoints, Some(-1.), Some(1.), 1);
        test_compute_bounds(&points);

        // Points far away from the origin
        let points = make_uniform_particle_array::<f64, 2>(npoints, Some(1e8), Some(1e8 + 1.), 2);
        test_compute_bounds(&points);
    }

    #[test]
    fn test_rectangular_distribution_gives_cubic_domain() {
        let points = vec![[0.0, 0.0], [0.1, 0.0], [0.0, 500.0]];
        let bbox = BoundingBox::from_points([points.as_slice()]).unwrap();
        let domain = Domain::from_bounding_box(&bbox);

        assert!(domain.extent > 500.0);
        test_compute_bounds(&points);
    }

    #[test]
    fn test_coincident_points() {
        let points = vec![[1.0, 2.0, 3.0]; 5];
        let bbox = BoundingBox::from_points([points.as_slice()]).unwrap();
        let domain = Domain::from_bounding_box(&bbox);

        assert!(domain.extent >= 1.0);
        test_compute_bounds(&points);
    }

    #[test]
    fn test_union_of_point_sets() {
        let sources = vec![[0.0, 0.0]];
        let targets = vec![[2.0, -1.0]];
        let bbox = BoundingBox::from_points([sources.as_slice(), targets.as_slice()]).unwrap();

        assert_eq!(bbox.min, [0.0, -1.0]);
        assert_eq!(bbox.max, [2.0, 0.0]);
        assert_eq!(
            bbox,
            BoundingBox::from_point(&sources[0]).union(&BoundingBox::from_point(&targets[0]))
        );
    }

    #[test]
    fn test_empty_and_non_finite_points() {
        let empty: Vec<[f64; 2]> = vec![];
        assert!(matches!(
            BoundingBox::from_points([empty.as_slice()]),
            Err(Error::Configuration(_))
        ));

        let points = vec![[0.0, f64::NAN]];
        assert!(matches!(
            BoundingBox::from_points([points.as_slice()]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_children_nest_in_parent() {
        let domain = Domain::new(&[-0.3, 0.7], 1.3);
        let anchor = [5, 2];
        let level = 3;
        let (lower, upper) = domain.box_extent(level, &anchor);
        let center = domain.box_center(level, &anchor);

        for child in 0..4u64 {
            let child_anchor = [2 * anchor[0] + (child & 1), 2 * anchor[1] + ((child >> 1) & 1)];
            let (child_lower, child_upper) = domain.box_extent(level + 1, &child_anchor);
            for d in 0..2 {
                assert!(lower[d] <= child_lower[d] && child_upper[d] <= upper[d]);
                // Children split the parent exactly at its center
                if child_anchor[d] % 2 == 0 {
                    assert_eq!(child_upper[d], center[d]);
                } else {
                    assert_eq!(child_lower[d], center[d]);
                }
            }
        }
    }
}
