use crate::vector::Vec2;
use std::collections::HashMap;

/// Anything that can be bucketed by the hash grid.
pub trait Located {
    fn position(&self) -> Vec2;

    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    index: usize,
    position: Vec2,
}

/// Uniform hash grid over one homogeneous object slice.
///
/// Stores indices into the slice passed to [`SpatialIndex::rebuild`]; it is
/// rebuilt from scratch every tick. Radius queries are coarse: they return
/// whole buckets, so results can include objects slightly beyond the radius
/// and callers that need precision re-check the distance.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    buckets: HashMap<(i64, i64), Vec<Entry>>,
    len: usize,
}

impl SpatialIndex {
    pub const DEFAULT_CELL_SIZE: f64 = 10.0;

    pub fn new(cell_size: f64) -> Self {
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "spatial cell_size must be positive and finite"
        );
        Self {
            cell_size,
            buckets: HashMap::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn key(&self, position: Vec2) -> (i64, i64) {
        (
            (position.x / self.cell_size).floor() as i64,
            (position.y / self.cell_size).floor() as i64,
        )
    }

    /// Re-bucket `objects`, skipping disabled ones and non-finite positions.
    pub fn rebuild<T: Located>(&mut self, objects: &[T]) {
        self.buckets.clear();
        self.len = 0;
        for (index, object) in objects.iter().enumerate() {
            if !object.is_enabled() {
                continue;
            }
            let position = object.position();
            if !position.is_finite() {
                continue;
            }
            let key = self.key(position);
            self.buckets
                .entry(key)
                .or_default()
                .push(Entry { index, position });
            self.len += 1;
        }
    }

    /// Visit every entry in the buckets within `ceil(radius / cell_size)`
    /// cells (Chebyshev) of the query cell, in a fixed bucket order.
    pub fn for_each_near<F>(&self, position: Vec2, radius: f64, mut f: F)
    where
        F: FnMut(usize, Vec2),
    {
        if !position.is_finite() || self.len == 0 {
            return;
        }
        // saturates for huge or infinite radii
        let reach = if radius > 0.0 {
            (radius / self.cell_size).ceil() as u64
        } else {
            0
        };
        let span = u128::from(reach) * 2 + 1;
        let (qx, qy) = self.key(position);
        if span.saturating_mul(span) > self.buckets.len() as u128 {
            // Sparse grid: scanning occupied buckets is cheaper than probing keys.
            let mut keys: Vec<&(i64, i64)> = self
                .buckets
                .keys()
                .filter(|(kx, ky)| kx.abs_diff(qx) <= reach && ky.abs_diff(qy) <= reach)
                .collect();
            keys.sort_unstable();
            for key in keys {
                for entry in &self.buckets[key] {
                    f(entry.index, entry.position);
                }
            }
            return;
        }
        // span² fits the bucket count here, so reach is small
        let reach = reach as i64;
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let (Some(x), Some(y)) = (qx.checked_add(dx), qy.checked_add(dy)) else {
                    continue;
                };
                if let Some(bucket) = self.buckets.get(&(x, y)) {
                    for entry in bucket {
                        f(entry.index, entry.position);
                    }
                }
            }
        }
    }

    /// Indices of all objects in buckets covering `radius` around `position`.
    pub fn query_near(&self, position: Vec2, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_near(position, radius, |index, _| out.push(index));
        out
    }

    fn nearest_entry(&self, position: Vec2, max_distance: f64) -> Option<(Entry, f64)> {
        if !(max_distance >= 0.0) {
            return None;
        }
        let max_sq = max_distance * max_distance;
        let mut best: Option<(Entry, f64)> = None;
        self.for_each_near(position, max_distance, |index, p| {
            let d_sq = p.distance_squared(position);
            if d_sq > max_sq {
                return;
            }
            if best.map_or(true, |(_, b)| d_sq < b) {
                best = Some((Entry { index, position: p }, d_sq));
            }
        });
        best
    }

    /// Closest object within `max_distance`, as `(index, distance)`.
    ///
    /// Ties keep the first object encountered.
    pub fn nearest(&self, position: Vec2, max_distance: f64) -> Option<(usize, f64)> {
        self.nearest_entry(position, max_distance)
            .map(|(entry, d_sq)| (entry.index, d_sq.sqrt()))
    }

    /// Unit vector toward the closest object within `max_distance`.
    ///
    /// An object exactly at `position` yields the zero vector (already there).
    pub fn nearest_direction(&self, position: Vec2, max_distance: f64) -> Option<Vec2> {
        self.nearest_entry(position, max_distance)
            .map(|(entry, _)| (entry.position - position).normalized())
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CELL_SIZE)
    }
}
