//! Shared data model: grid dimensions, single frames and frame sequences,
//! plus the plain nested-array interchange format used to move grid data in
//! and out of the core.

use serde::{Deserialize, Serialize};

use crate::{Result, VoxelgramError};

/// Smallest supported extent per axis.
pub const MIN_AXIS: u32 = 1;
/// Largest supported extent per axis.
pub const MAX_AXIS: u32 = 32;

/// Interchange representation: `[time][depth][height][width]`, each leaf an
/// integer brightness in `[0, 255]`.
pub type NestedFrames = Vec<Vec<Vec<Vec<u8>>>>;

/// Dimensions of the display volume. Immutable for the lifetime of a frame
/// sequence; resizing the grid invalidates every sequence built against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Default for GridSize {
    fn default() -> Self {
        Self { x: 8, y: 8, z: 8 }
    }
}

impl GridSize {
    /// Builds a validated grid size. Each axis must lie in `[1, 32]`.
    pub fn new(x: u32, y: u32, z: u32) -> Result<Self> {
        let size = Self { x, y, z };
        size.validate()?;
        Ok(size)
    }

    /// Uniform cube with the given side length.
    pub fn cube(side: u32) -> Result<Self> {
        Self::new(side, side, side)
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |v: u32| (MIN_AXIS..=MAX_AXIS).contains(&v);
        if in_range(self.x) && in_range(self.y) && in_range(self.z) {
            Ok(())
        } else {
            Err(VoxelgramError::InvalidDimensions {
                x: self.x,
                y: self.y,
                z: self.z,
            })
        }
    }

    pub fn cell_count(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    /// Volume center in cell coordinates (`size / 2` per axis, matching the
    /// convention the procedural formulas were authored against).
    pub fn center(&self) -> (f32, f32, f32) {
        (
            self.x as f32 / 2.0,
            self.y as f32 / 2.0,
            self.z as f32 / 2.0,
        )
    }

    pub fn min_extent(&self) -> u32 {
        self.x.min(self.y).min(self.z)
    }
}

/// Clamps a raw brightness value into `[0, 255]` and floors it to an
/// integer. Non-finite inputs map to zero.
pub fn quantize(value: f32) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.clamp(0.0, 255.0).floor() as u8
}

/// One instantaneous brightness snapshot of the volume, stored densely in
/// `[z][y][x]` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    size: GridSize,
    cells: Vec<u8>,
}

impl Frame {
    /// Creates an all-dark frame.
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            cells: vec![0; size.cell_count()],
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    fn index(&self, x: u32, y: u32, z: u32) -> usize {
        ((z * self.size.y + y) * self.size.x + x) as usize
    }

    pub fn get(&self, x: u32, y: u32, z: u32) -> u8 {
        if x < self.size.x && y < self.size.y && z < self.size.z {
            self.cells[self.index(x, y, z)]
        } else {
            0
        }
    }

    /// Stores a raw value, clamping and flooring into `[0, 255]`.
    pub fn set(&mut self, x: u32, y: u32, z: u32, value: f32) {
        if x < self.size.x && y < self.size.y && z < self.size.z {
            let index = self.index(x, y, z);
            self.cells[index] = quantize(value);
        }
    }

    /// Adds brightness to a cell, saturating at 255. Coordinates outside the
    /// volume are silently dropped.
    pub fn deposit(&mut self, x: i64, y: i64, z: i64, amount: u8) {
        if let Some(index) = self.checked_index(x, y, z) {
            self.cells[index] = self.cells[index].saturating_add(amount);
        }
    }

    /// Raises a cell to at least `floor` brightness. Out-of-volume
    /// coordinates are silently dropped.
    pub fn lift(&mut self, x: i64, y: i64, z: i64, floor: u8) {
        if let Some(index) = self.checked_index(x, y, z) {
            self.cells[index] = self.cells[index].max(floor);
        }
    }

    fn checked_index(&self, x: i64, y: i64, z: i64) -> Option<usize> {
        if (0..self.size.x as i64).contains(&x)
            && (0..self.size.y as i64).contains(&y)
            && (0..self.size.z as i64).contains(&z)
        {
            Some(self.index(x as u32, y as u32, z as u32))
        } else {
            None
        }
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    fn to_nested(&self) -> Vec<Vec<Vec<u8>>> {
        (0..self.size.z)
            .map(|z| {
                (0..self.size.y)
                    .map(|y| (0..self.size.x).map(|x| self.get(x, y, z)).collect())
                    .collect()
            })
            .collect()
    }
}

/// An ordered, finite animation loop of frames sharing one grid size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence {
    size: GridSize,
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Creates an empty sequence for the given volume.
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            frames: Vec::new(),
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Appends a frame. The frame must match the sequence's grid size; a
    /// mismatched frame is a programming error in a generator.
    pub fn push(&mut self, frame: Frame) {
        debug_assert_eq!(frame.size(), self.size);
        self.frames.push(frame);
    }

    /// Converts the sequence into the `[time][depth][height][width]`
    /// interchange structure.
    pub fn to_nested(&self) -> NestedFrames {
        self.frames.iter().map(Frame::to_nested).collect()
    }

    /// Rebuilds a sequence from interchange data, validating that the three
    /// innermost levels are non-empty, rectangular and within the supported
    /// dimension range. Dimensions are derived from the first frame.
    pub fn from_nested(data: &NestedFrames) -> Result<Self> {
        let first = data
            .first()
            .ok_or_else(|| VoxelgramError::MalformedData("no frames".into()))?;
        let depth = first.len();
        let height = first.first().map(Vec::len).unwrap_or(0);
        let width = first
            .first()
            .and_then(|plane| plane.first())
            .map(Vec::len)
            .unwrap_or(0);
        if depth == 0 || height == 0 || width == 0 {
            return Err(VoxelgramError::MalformedData(
                "frames must be non-empty in all three axes".into(),
            ));
        }

        let size = GridSize::new(width as u32, height as u32, depth as u32)?;
        let mut sequence = Self::new(size);
        for (t, nested_frame) in data.iter().enumerate() {
            if nested_frame.len() != depth {
                return Err(VoxelgramError::MalformedData(format!(
                    "frame {t} has depth {} but expected {depth}",
                    nested_frame.len()
                )));
            }
            let mut frame = Frame::new(size);
            for (z, plane) in nested_frame.iter().enumerate() {
                if plane.len() != height {
                    return Err(VoxelgramError::MalformedData(format!(
                        "frame {t} slice {z} has height {} but expected {height}",
                        plane.len()
                    )));
                }
                for (y, row) in plane.iter().enumerate() {
                    if row.len() != width {
                        return Err(VoxelgramError::MalformedData(format!(
                            "frame {t} slice {z} row {y} has width {} but expected {width}",
                            row.len()
                        )));
                    }
                    for (x, &value) in row.iter().enumerate() {
                        frame.set(x as u32, y as u32, z as u32, f32::from(value));
                    }
                }
            }
            sequence.push(frame);
        }
        Ok(sequence)
    }

    /// Serialises the sequence to interchange JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_nested())?)
    }

    /// Parses interchange JSON back into a validated sequence.
    pub fn from_json(json: &str) -> Result<Self> {
        let data: NestedFrames = serde_json::from_str(json)?;
        Self::from_nested(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> GridSize {
        GridSize::new(2, 3, 4).unwrap()
    }

    #[test]
    fn rejects_out_of_range_dimensions() {
        assert!(GridSize::new(0, 8, 8).is_err());
        assert!(GridSize::new(8, 33, 8).is_err());
        assert!(GridSize::new(1, 1, 1).is_ok());
        assert!(GridSize::new(32, 32, 32).is_ok());
    }

    #[test]
    fn quantize_clamps_and_floors() {
        assert_eq!(quantize(-12.0), 0);
        assert_eq!(quantize(300.0), 255);
        assert_eq!(quantize(99.9), 99);
        assert_eq!(quantize(f32::NAN), 0);
        assert_eq!(quantize(f32::INFINITY), 0);
    }

    #[test]
    fn deposit_saturates_and_drops_out_of_bounds() {
        let mut frame = Frame::new(small());
        frame.deposit(1, 2, 3, 200);
        frame.deposit(1, 2, 3, 200);
        assert_eq!(frame.get(1, 2, 3), 255);

        // Outside the volume: silently ignored.
        frame.deposit(-1, 0, 0, 200);
        frame.deposit(2, 0, 0, 200);
        assert_eq!(frame.get(0, 0, 0), 0);
    }

    #[test]
    fn lift_only_raises() {
        let mut frame = Frame::new(small());
        frame.set(0, 0, 0, 120.0);
        frame.lift(0, 0, 0, 50);
        assert_eq!(frame.get(0, 0, 0), 120);
        frame.lift(1, 0, 0, 50);
        assert_eq!(frame.get(1, 0, 0), 50);
    }

    #[test]
    fn interchange_round_trip_is_identity() {
        let size = small();
        let mut sequence = FrameSequence::new(size);
        for t in 0..5u32 {
            let mut frame = Frame::new(size);
            for z in 0..size.z {
                for y in 0..size.y {
                    for x in 0..size.x {
                        frame.set(x, y, z, ((x + y * 3 + z * 7 + t * 11) % 256) as f32);
                    }
                }
            }
            sequence.push(frame);
        }

        let json = sequence.to_json().unwrap();
        let parsed = FrameSequence::from_json(&json).unwrap();
        assert_eq!(parsed, sequence);
    }

    #[test]
    fn from_nested_rejects_empty_and_ragged() {
        assert!(FrameSequence::from_nested(&vec![]).is_err());
        assert!(FrameSequence::from_nested(&vec![vec![]]).is_err());
        assert!(FrameSequence::from_nested(&vec![vec![vec![]]]).is_err());

        // Ragged row width.
        let ragged = vec![vec![vec![vec![0, 0], vec![0]]]];
        assert!(FrameSequence::from_nested(&ragged).is_err());

        // Second frame with a different depth.
        let mismatched = vec![
            vec![vec![vec![0]], vec![vec![0]]],
            vec![vec![vec![0]]],
        ];
        assert!(FrameSequence::from_nested(&mismatched).is_err());
    }

    #[test]
    fn from_nested_derives_dimensions_from_first_frame() {
        let data = vec![vec![vec![vec![7, 8, 9], vec![1, 2, 3]]; 4]];
        let sequence = FrameSequence::from_nested(&data).unwrap();
        let size = sequence.size();
        assert_eq!((size.x, size.y, size.z), (3, 2, 4));
        assert_eq!(sequence.frame(0).unwrap().get(2, 0, 0), 9);
    }
}
