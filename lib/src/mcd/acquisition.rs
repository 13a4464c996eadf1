use std::{collections::HashSet, fmt};

use nalgebra::Vector2;

use crate::{
    placement::{Orientation, Placement},
    Print,
};

/// Names of the channels that store the pixel coordinates of each spectrum
pub(crate) const COORDINATE_CHANNELS: [&str; 3] = ["X", "Y", "Z"];

/// ROI start coordinates above this value were recorded in nm rather than μm
const ROI_START_SCALE_THRESHOLD: f64 = 75000.0;

/// Channel recorded as part of an acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionChannel {
    pub(super) id: u16,
    pub(super) acquisition_id: u16,
    pub(super) order_number: i16,
    pub(super) name: String,
    pub(super) label: String,
}

impl AcquisitionChannel {
    /// Returns the channel ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the ID of the acquisition the channel belongs to
    pub fn acquisition_id(&self) -> u16 {
        self.acquisition_id
    }

    /// Position of the channel within each spectrum
    pub fn order_number(&self) -> i16 {
        self.order_number
    }

    /// Returns the name of the channel (usually the metal, e.g. Ir191)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the label given to the channel (usually the target, e.g. DNA1). Falls back to the
    /// name if no label was given.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True for the X, Y and Z coordinate channels
    pub fn is_coordinate(&self) -> bool {
        COORDINATE_CHANNELS.contains(&self.name.as_str())
    }
}

/// Region of the slide that was ablated, storing one spectrum per pixel
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub(super) id: u16,
    pub(super) description: String,
    pub(super) order_number: Option<i16>,
    pub(super) distance_between_shots: Vector2<f64>,
    pub(super) data_start_offset: Option<i64>,
    pub(super) data_end_offset: Option<i64>,
    pub(super) roi_start: Option<Vector2<f64>>,
    pub(super) roi_end: Option<Vector2<f64>>,
    pub(super) value_bytes: u8,
    pub(super) max_x: i32,
    pub(super) max_y: i32,
    pub(super) channels: Vec<AcquisitionChannel>,
}

impl Acquisition {
    /// Returns the acquisition ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the description given to the acquisition
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number indicating the order in which acquisitions were acquired
    pub fn order_number(&self) -> Option<i16> {
        self.order_number
    }

    /// Returns the width of the acquired region (in pixels)
    pub fn width(&self) -> usize {
        self.max_x.max(0) as usize
    }

    /// Returns the height of the acquired region (in pixels)
    pub fn height(&self) -> usize {
        self.max_y.max(0) as usize
    }

    /// Number of bytes used to store each value
    pub fn value_bytes(&self) -> u8 {
        self.value_bytes
    }

    /// Offsets of the spectrum data as (start, end), if both are present and the range is not empty
    pub fn data_offsets(&self) -> Option<(u64, u64)> {
        let start = self.data_start_offset?;
        let end = self.data_end_offset?;

        if start < 0 || end <= start {
            return None;
        }

        Some((start as u64, end as u64))
    }

    /// An acquisition is valid when it stores data and its channels are known
    pub fn is_valid(&self) -> bool {
        self.data_offsets().is_some() && !self.channels.is_empty()
    }

    /// Size of each spectrum in bytes
    pub fn spectrum_size(&self) -> usize {
        self.channels.len() * self.value_bytes as usize
    }

    /// Number of complete spectra stored
    pub fn num_spectra(&self) -> usize {
        match (self.data_offsets(), self.spectrum_size()) {
            (Some((start, end)), size) if size > 0 => (end - start) as usize / size,
            _ => 0,
        }
    }

    /// All channels, ordered by their position within each spectrum
    pub fn channels(&self) -> &[AcquisitionChannel] {
        &self.channels
    }

    /// Index of the channel with the given label within each spectrum
    pub fn channel_index(&self, label: &str) -> Option<usize> {
        self.channels
            .iter()
            .position(|channel| !channel.is_coordinate() && channel.label() == label)
    }

    pub(crate) fn coordinate_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|channel| channel.name() == name)
    }

    /// Channel labels in acquisition order, excluding the coordinate channels. Each label appears
    /// once.
    pub fn channel_labels(&self) -> Vec<String> {
        let mut seen = HashSet::new();

        self.channels
            .iter()
            .filter(|channel| !channel.is_coordinate())
            .map(|channel| channel.label())
            .filter(|label| seen.insert(*label))
            .map(String::from)
            .collect()
    }

    pub(super) fn sort_channels(&mut self) {
        self.channels.sort_by_key(|channel| channel.order_number);
    }

    pub(super) fn fix_roi_start_pos(&mut self) {
        // In version 2 of the schema, ROIStartXPosUm and ROIStartYPosUm can be 1000x what they should be
        if let Some(start) = self.roi_start.as_mut() {
            if start.x > ROI_START_SCALE_THRESHOLD {
                start.x /= 1000.0;
            }
            if start.y > ROI_START_SCALE_THRESHOLD {
                start.y /= 1000.0;
            }
        }
    }

    /// Start and end of the ablated region on the slide (μm)
    pub fn roi(&self) -> Option<(Vector2<f64>, Vector2<f64>)> {
        let start = self.roi_start?;
        let mut end = self.roi_end?;

        // Some files record the same start and end x position
        if start.x == end.x {
            end.x = start.x + self.max_x as f64 * self.distance_between_shots.x;
        }

        Some((start, end))
    }

    /// Physical placement of the acquisition and the mirroring needed for its channel planes
    pub fn placement(&self) -> Option<(Placement, Orientation)> {
        let (start, end) = self.roi()?;

        Placement::from_corners(&[start.x, end.x], &[start.y, end.y])
    }
}

#[rustfmt::skip]
impl Print for Acquisition {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        write!(writer, "{:indent$}", "", indent = indent)?;
        writeln!(writer, "{:-^1$}", "Acquisition", 48)?;

        writeln!(writer, "{:indent$}{: <22} | {}", "", "ID",          self.id,          indent = indent)?;
        writeln!(writer, "{:indent$}{: <22} | {}", "", "Description", self.description, indent = indent)?;
        writeln!(writer, "{:indent$}{: <22} | {} x {}", "", "Dimensions (pixels)", self.max_x, self.max_y, indent = indent)?;
        writeln!(writer, "{:indent$}{: <22} | {}", "", "Number of spectra", self.num_spectra(), indent = indent)?;

        write!(writer, "{:indent$}", "", indent = indent + 2)?;
        writeln!(writer, "{:-^1$}", "Channels", 25)?;
        for channel in self.channels.iter().filter(|channel| !channel.is_coordinate()) {
            writeln!(
                writer,
                "{:indent$}{: <2} | {: <10} | {: <10}",
                "",
                channel.order_number(),
                channel.name(),
                channel.label(),
                indent = indent + 2
            )?;
        }

        Ok(())
    }
}
