use std::fmt;

use image::ImageFormat;
use nalgebra::Vector2;

use crate::{
    placement::{edge_rotation, Orientation, Placement},
    Print,
};

/// Panorama type used for slide overview placeholders that carry no image
pub(crate) const DEFAULT_PANORAMA_TYPE: &str = "Default";

/// Location of the encoded panorama image within the .mcd file
#[derive(Debug, Clone, Copy)]
pub struct PanoramaImage {
    pub(super) start_offset: i64,
    pub(super) end_offset: i64,
    pub(super) format: Option<ImageFormat>,
}

impl PanoramaImage {
    /// Offsets of the record as (start, end)
    pub fn offsets(&self) -> (i64, i64) {
        (self.start_offset, self.end_offset)
    }

    /// Image format recorded in the metadata, if it was recognised
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }
}

/// Optical image of (part of) the slide, captured to select acquisition regions
#[derive(Debug, Clone)]
pub struct Panorama {
    pub(super) id: u16,
    pub(super) slide_id: Option<u16>,
    pub(super) description: String,
    pub(super) panorama_type: Option<String>,
    pub(super) pixel_width: Option<i64>,
    pub(super) pixel_height: Option<i64>,
    pub(super) corners: Option<[Vector2<f64>; 4]>,
    pub(super) image: Option<PanoramaImage>,
}

impl Panorama {
    /// Returns the panorama ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the ID of the slide the panorama was captured on
    pub fn slide_id(&self) -> Option<u16> {
        self.slide_id
    }

    /// Returns the description given to the panorama
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the panorama type (e.g. `Instrument`, `Imported`, `Default`)
    pub fn panorama_type(&self) -> Option<&str> {
        self.panorama_type.as_deref()
    }

    /// True for slide overview placeholders
    pub fn is_default(&self) -> bool {
        self.panorama_type() == Some(DEFAULT_PANORAMA_TYPE)
    }

    /// Returns the pixel (width, height) recorded in the metadata
    pub fn dimensions(&self) -> Option<(i64, i64)> {
        Some((self.pixel_width?, self.pixel_height?))
    }

    /// The four corners of the panorama on the slide (μm), in recorded order
    pub fn corners(&self) -> Option<&[Vector2<f64>; 4]> {
        self.corners.as_ref()
    }

    /// Location of the encoded image, if there is one
    pub fn image(&self) -> Option<&PanoramaImage> {
        self.image.as_ref()
    }

    /// Physical placement of the panorama and the mirroring needed for its pixel data
    ///
    /// The rotation is taken from the edge between the first two corners and folded onto the
    /// nearest axis. A panorama whose corners were recorded a quarter turn apart is therefore
    /// placed unrotated over the bounding box of its corners, and its pixels are not transposed.
    pub fn placement(&self) -> Option<(Placement, Orientation)> {
        let corners = self.corners()?;

        let xs: Vec<f64> = corners.iter().map(|corner| corner.x).collect();
        let ys: Vec<f64> = corners.iter().map(|corner| corner.y).collect();
        let (placement, orientation) = Placement::from_corners(&xs, &ys)?;

        Some((
            placement.with_rotation(edge_rotation(corners[0], corners[1])),
            orientation,
        ))
    }
}

#[rustfmt::skip]
impl Print for Panorama {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        write!(writer, "{:indent$}", "", indent = indent)?;
        writeln!(writer, "{:-^1$}", "Panorama", 42)?;

        writeln!(writer, "{:indent$}{: <16} | {}", "", "ID",          self.id,          indent = indent)?;
        writeln!(writer, "{:indent$}{: <16} | {}", "", "Description", self.description, indent = indent)?;
        writeln!(writer, "{:indent$}{: <16} | {}", "", "Type",        self.panorama_type().unwrap_or("-"), indent = indent)?;

        if let Some((width, height)) = self.dimensions() {
            writeln!(writer, "{:indent$}{: <16} | {} x {}", "", "Dimensions (px)", width, height, indent = indent)?;
        }
        if let Some((placement, _)) = self.placement() {
            writeln!(
                writer,
                "{:indent$}{: <16} | ({:.1}, {:.1}) {:.1} μm x {:.1} μm",
                "", "Placement", placement.x, placement.y, placement.width, placement.height,
                indent = indent
            )?;
        }

        Ok(())
    }
}
