#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]

//! This library opens imaging mass cytometry (IMC) data stored in the (*.mcd) container format and
//! in per-acquisition text exports (*.txt), and keeps the panoramas, acquisitions and channels of the
//! opened files in sync with the layers of an image viewer.
//!
//! The viewer itself is not part of this crate. It is reached through the [`ImageCanvas`] trait, and
//! any presentation code (tree views, channel tables, sliders) observes the controller through
//! [`ModelEvent`] notifications.
//!
//! # Example
//!
//! ```no_run
//! use imc_layers::{AcquisitionKey, ImcController, LayerStack};
//!
//! fn main() -> imc_layers::Result<()> {
//!     let mut controller = ImcController::new(LayerStack::new());
//!
//!     let file = controller.open_file("../test/20200612_FLU_1923.mcd")?;
//!     controller.load_acquisition(AcquisitionKey::new(file, 1))?;
//!     controller.show_channel("DNA1")?;
//!
//!     for layer in controller.canvas().layers() {
//!         println!("{}", layer.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Errors raised by the controller and the registries
pub mod error;
/// Readers for the supported file formats and the selection between them
pub mod format;
/// Decoder for the binary *.mcd container format
pub mod mcd;
/// Decoder for the tab-separated *.txt export format
pub mod txt;

mod canvas;
mod channels;
mod config;
mod controller;
mod events;
mod model;
mod placement;
mod registry;
mod tree;

#[cfg(test)]
pub(crate) mod testing;

pub use self::canvas::{
    ImageCanvas, LayerHandle, LayerProperty, LayerStack, LayerStyle, LayerTag, NewLayer,
    StackedLayer,
};
pub use self::channels::ChannelRegistry;
pub use self::config::ViewerConfig;
pub use self::controller::{CompletedRead, ImcController, Intent, PendingRead, ReadTarget};
pub use self::error::{ImcError, Result};
pub use self::events::{ModelEvent, Observers, SubscriptionId};
pub use self::format::{
    AcquisitionInfo, DecodedImage, FileFormat, FileReader, FormatRegistry, PanoramaInfo, Pixels,
};
pub use self::model::{
    AcquisitionKey, Blending, Channel, ChannelStyle, Color, FileAcquisition, FileId, FileIdentity,
    FilePanorama, ImcFile, Interpolation, PanoramaKey, ShownLayer,
};
pub use self::placement::{Orientation, Placement};
pub use self::registry::FileRegistry;
pub use self::tree::{GroupNode, NodeId, TreeField, TreeItem};

use std::fmt;

/// Print to `writer` trait
pub trait Print {
    /// Formats and prints to `writer`
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result;
}
