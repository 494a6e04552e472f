//! Two-channel pheromone grid.
//!
//! Cells are stored column-major (`index = column * rows + row`) so that
//! decay and diffusion can hand each rayon worker whole columns through
//! `par_chunks_mut(rows)`.

use crate::config::{ParameterStore, Parameters};
use crate::vector::Vec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// 3x3 Gaussian kernel (sigma ~ 1), rows sum to 1 over the full block.
pub const GAUSSIAN_KERNEL: [[f64; 3]; 3] = [
    [0.077847, 0.123317, 0.077847],
    [0.123317, 0.195346, 0.123317],
    [0.077847, 0.123317, 0.077847],
];

/// Fixed scale applied to central-difference gradients.
pub const GRADIENT_BOOST: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Laid by returning agents; leads toward food.
    Food,
    /// Laid by searching agents; leads toward the nest.
    Home,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Food, Channel::Home];

    /// Multiplier applied to trail deposits on this channel.
    pub fn booster(self) -> f64 {
        match self {
            Channel::Food => 1.75,
            Channel::Home => 1.0,
        }
    }

    fn index(self) -> usize {
        match self {
            Channel::Food => 0,
            Channel::Home => 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DensityField {
    columns: usize,
    rows: usize,
    cell_size: f64,
    channels: [Vec<f64>; 2],
    scratch: Vec<f64>,
    params: ParameterStore,
}

impl DensityField {
    pub fn new(map_width: f64, map_height: f64, cell_size: f64, params: ParameterStore) -> Self {
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "cell_size must be positive and finite"
        );
        assert!(
            map_width.is_finite() && map_width > 0.0 && map_height.is_finite() && map_height > 0.0,
            "map size must be positive and finite"
        );
        let columns = (map_width / cell_size).ceil().max(1.0) as usize;
        let rows = (map_height / cell_size).ceil().max(1.0) as usize;
        let len = columns * rows;
        Self {
            columns,
            rows,
            cell_size,
            channels: [vec![0.0; len], vec![0.0; len]],
            scratch: vec![0.0; len],
            params,
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    /// Grid cell containing `position`, or `None` outside the grid or for
    /// non-finite/negative coordinates.
    pub fn cell_of(&self, position: Vec2) -> Option<(usize, usize)> {
        if !position.is_finite() || position.x < 0.0 || position.y < 0.0 {
            return None;
        }
        let cx = (position.x / self.cell_size) as usize;
        let cy = (position.y / self.cell_size) as usize;
        (cx < self.columns && cy < self.rows).then_some((cx, cy))
    }

    fn index(&self, cx: usize, cy: usize) -> usize {
        cx * self.rows + cy
    }

    /// Raw stored value of a cell.
    pub fn cell_value(&self, cx: usize, cy: usize, channel: Channel) -> Option<f64> {
        (cx < self.columns && cy < self.rows)
            .then(|| self.channels[channel.index()][self.index(cx, cy)])
    }

    /// Cell value with sub-threshold values reading as zero. Out of range reads zero.
    fn read(&self, cx: isize, cy: isize, channel: Channel, min_intensity: f64) -> f64 {
        if cx < 0 || cy < 0 || cx as usize >= self.columns || cy as usize >= self.rows {
            return 0.0;
        }
        let v = self.channels[channel.index()][self.index(cx as usize, cy as usize)];
        if v < min_intensity {
            0.0
        } else {
            v
        }
    }

    /// Add `amount` to the cell under `position`, saturating at the maximum
    /// intensity. Amounts at or below the minimum intensity and positions
    /// outside the grid are ignored.
    pub fn deposit(&mut self, position: Vec2, channel: Channel, amount: f64) {
        let params = self.params.snapshot();
        self.deposit_with(&params, position, channel, amount);
    }

    pub(crate) fn deposit_with(
        &mut self,
        params: &Parameters,
        position: Vec2,
        channel: Channel,
        amount: f64,
    ) {
        if !(amount > params.min_intensity) {
            return;
        }
        let Some((cx, cy)) = self.cell_of(position) else {
            return;
        };
        let idx = self.index(cx, cy);
        let cell = &mut self.channels[channel.index()][idx];
        *cell = (*cell + amount).min(params.max_intensity);
    }

    /// Local field value used by the directional sensors: the cell containing
    /// `position`. `_radius` is the sensor footprint and does not widen the read.
    pub fn sample_mean(&self, position: Vec2, channel: Channel, _radius: f64) -> f64 {
        let min_intensity = self.params.snapshot().min_intensity;
        self.sample_cell(position, channel, min_intensity)
    }

    pub(crate) fn sample_cell(&self, position: Vec2, channel: Channel, min_intensity: f64) -> f64 {
        match self.cell_of(position) {
            Some((cx, cy)) => self.read(cx as isize, cy as isize, channel, min_intensity),
            None => 0.0,
        }
    }

    /// Average over the in-grid cells whose centers lie within `radius` of
    /// the center of the cell under `position`.
    pub fn sample_disc_mean(&self, position: Vec2, channel: Channel, radius: f64) -> f64 {
        let Some((cx, cy)) = self.cell_of(position) else {
            return 0.0;
        };
        let min_intensity = self.params.snapshot().min_intensity;
        let reach = if radius.is_finite() && radius > 0.0 {
            (radius / self.cell_size).floor() as isize
        } else {
            0
        };
        let reach_sq = (radius / self.cell_size).powi(2);
        let mut sum = 0.0;
        let mut count = 0usize;
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if reach > 0 && ((dx * dx + dy * dy) as f64) > reach_sq {
                    continue;
                }
                let (nx, ny) = (cx as isize + dx, cy as isize + dy);
                if nx < 0 || ny < 0 || nx as usize >= self.columns || ny as usize >= self.rows {
                    continue;
                }
                sum += self.read(nx, ny, channel, min_intensity);
                count += 1;
            }
        }
        sum / count.max(1) as f64
    }

    /// Boosted central-difference gradient with an offset of `delta` cells.
    pub fn sample_gradient(&self, position: Vec2, channel: Channel, delta: usize) -> Vec2 {
        if delta == 0 {
            return Vec2::ZERO;
        }
        let Some((cx, cy)) = self.cell_of(position) else {
            return Vec2::ZERO;
        };
        let min_intensity = self.params.snapshot().min_intensity;
        let (cx, cy, d) = (cx as isize, cy as isize, delta as isize);
        let span = 2.0 * delta as f64;
        let gx = (self.read(cx + d, cy, channel, min_intensity)
            - self.read(cx - d, cy, channel, min_intensity))
            / span;
        let gy = (self.read(cx, cy + d, channel, min_intensity)
            - self.read(cx, cy - d, channel, min_intensity))
            / span;
        Vec2::new(gx, gy) * GRADIENT_BOOST
    }

    /// Advance both channels by `dt` seconds: decay, then diffusion.
    ///
    /// Negative or non-finite `dt` is ignored.
    pub fn tick(&mut self, dt: f64) {
        if !(dt.is_finite() && dt >= 0.0) {
            return;
        }
        let params = self.params.snapshot();
        self.decay_with(&params, dt);
        self.diffuse_with(&params, dt);
    }

    pub fn decay(&mut self, dt: f64) {
        if !(dt.is_finite() && dt >= 0.0) {
            return;
        }
        let params = self.params.snapshot();
        self.decay_with(&params, dt);
    }

    pub fn diffuse(&mut self, dt: f64) {
        if !(dt.is_finite() && dt >= 0.0) {
            return;
        }
        let params = self.params.snapshot();
        self.diffuse_with(&params, dt);
    }

    fn decay_with(&mut self, params: &Parameters, dt: f64) {
        let factor = params.evaporation_rate.powf(dt);
        let min_intensity = params.min_intensity;
        let rows = self.rows;
        for values in &mut self.channels {
            values.par_chunks_mut(rows).for_each(|column| {
                for v in column {
                    *v *= factor;
                    if *v < min_intensity {
                        *v = 0.0;
                    }
                }
            });
        }
    }

    fn diffuse_with(&mut self, params: &Parameters, dt: f64) {
        let k = (params.diffusion_rate * dt).clamp(0.0, 1.0);
        if k == 0.0 {
            return;
        }
        for channel in Channel::ALL {
            let source = &self.channels[channel.index()];
            diffuse_into(
                source,
                &mut self.scratch,
                self.columns,
                self.rows,
                k,
                params.min_intensity,
                params.max_intensity,
            );
            std::mem::swap(&mut self.channels[channel.index()], &mut self.scratch);
        }
    }

    pub fn clear(&mut self) {
        for values in &mut self.channels {
            values.fill(0.0);
        }
        self.scratch.fill(0.0);
    }

    pub fn total(&self, channel: Channel) -> f64 {
        self.channels[channel.index()].iter().sum()
    }

    /// Number of cells at or above the minimum intensity.
    pub fn active_cells(&self, channel: Channel) -> usize {
        let min_intensity = self.params.snapshot().min_intensity;
        self.channels[channel.index()]
            .iter()
            .filter(|&&v| v >= min_intensity)
            .count()
    }

    /// Mean intensity over active cells, 0 when none are active.
    pub fn average_intensity(&self, channel: Channel) -> f64 {
        let min_intensity = self.params.snapshot().min_intensity;
        let (sum, count) = self.channels[channel.index()]
            .iter()
            .filter(|&&v| v >= min_intensity)
            .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// One diffusion pass reading only `source` and writing only `target`.
///
/// A cell is blended when any cell of its 3x3 block is active, so mass also
/// flows into empty neighbours.
fn diffuse_into(
    source: &[f64],
    target: &mut [f64],
    columns: usize,
    rows: usize,
    k: f64,
    min_intensity: f64,
    max_intensity: f64,
) {
    target
        .par_chunks_mut(rows)
        .enumerate()
        .for_each(|(cx, column)| {
            for (cy, out) in column.iter_mut().enumerate() {
                let old = source[cx * rows + cy];
                let mut weighted = 0.0;
                let mut weight = 0.0;
                let mut active = false;
                for (i, kernel_row) in GAUSSIAN_KERNEL.iter().enumerate() {
                    let nx = cx as isize + i as isize - 1;
                    if nx < 0 || nx as usize >= columns {
                        continue;
                    }
                    for (j, &w) in kernel_row.iter().enumerate() {
                        let ny = cy as isize + j as isize - 1;
                        if ny < 0 || ny as usize >= rows {
                            continue;
                        }
                        let v = source[nx as usize * rows + ny as usize];
                        weighted += v * w;
                        weight += w;
                        active |= v >= min_intensity;
                    }
                }
                *out = if active && weight > 0.0 {
                    (old * (1.0 - k) + (weighted / weight) * k).clamp(0.0, max_intensity)
                } else {
                    old
                };
            }
        });
}
