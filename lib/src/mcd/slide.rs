use std::fmt;

use crate::Print;

/// Slide described in the .mcd metadata
#[derive(Debug, Clone)]
pub struct Slide {
    pub(super) id: u16,
    pub(super) description: String,
    pub(super) sw_version: Option<String>,
    pub(super) width_um: Option<f64>,
    pub(super) height_um: Option<f64>,
}

impl Slide {
    /// Returns the slide ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the description given to the slide
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the version of the software used to acquire the slide
    pub fn software_version(&self) -> Option<&str> {
        self.sw_version.as_deref()
    }

    /// Returns the physical (width, height) of the slide in μm, if recorded
    pub fn dimensions_um(&self) -> Option<(f64, f64)> {
        Some((self.width_um?, self.height_um?))
    }
}

#[rustfmt::skip]
impl Print for Slide {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        write!(writer, "{:indent$}", "", indent = indent)?;
        writeln!(writer, "{:-^1$}", "Slide", 42)?;

        writeln!(writer, "{:indent$}{: <16} | {}", "", "ID",          self.id,          indent = indent)?;
        writeln!(writer, "{:indent$}{: <16} | {}", "", "Description", self.description, indent = indent)?;

        if let Some(sw_version) = &self.sw_version {
            writeln!(writer, "{:indent$}{: <16} | {}", "", "Software version", sw_version, indent = indent)?;
        }
        if let Some((width, height)) = self.dimensions_um() {
            writeln!(writer, "{:indent$}{: <16} | {} μm x {} μm", "", "Dimensions", width, height, indent = indent)?;
        }

        Ok(())
    }
}
