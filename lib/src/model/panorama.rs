use crate::{canvas::LayerHandle, format::PanoramaInfo, placement::Placement};

use super::FileId;

/// Addresses a panorama of an opened file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanoramaKey {
    /// The file containing the panorama
    pub file: FileId,
    /// Panorama ID within the file
    pub id: u16,
}

impl PanoramaKey {
    /// Key for panorama `id` of `file`
    pub fn new(file: FileId, id: u16) -> Self {
        PanoramaKey { file, id }
    }
}

/// Layer currently showing a panorama
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShownLayer {
    /// Handle returned by the canvas
    pub handle: LayerHandle,
    /// Where the layer was placed
    pub placement: Placement,
}

/// Panorama of an opened file
#[derive(Debug, Clone)]
pub struct FilePanorama {
    key: PanoramaKey,
    description: String,
    panorama_type: Option<String>,
    shown: Option<ShownLayer>,
}

impl FilePanorama {
    pub(crate) fn new(key: PanoramaKey, info: PanoramaInfo) -> Self {
        FilePanorama {
            key,
            description: info.description,
            panorama_type: info.panorama_type,
            shown: None,
        }
    }

    /// Key addressing the panorama
    pub fn key(&self) -> PanoramaKey {
        self.key
    }

    /// Description given to the panorama
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Type recorded for the panorama
    pub fn panorama_type(&self) -> Option<&str> {
        self.panorama_type.as_deref()
    }

    /// True while a layer shows the panorama
    pub fn is_shown(&self) -> bool {
        self.shown.is_some()
    }

    /// The layer showing the panorama
    pub fn shown_layer(&self) -> Option<&ShownLayer> {
        self.shown.as_ref()
    }

    pub(crate) fn set_shown(&mut self, layer: ShownLayer) {
        self.shown = Some(layer);
    }

    pub(crate) fn set_hidden(&mut self) -> Option<ShownLayer> {
        self.shown.take()
    }
}
