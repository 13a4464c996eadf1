use std::{fs::File, path::Path};

use ndarray::Array2;

use super::{
    has_extension, AcquisitionInfo, DecodedImage, FileFormat, FileReader, FormatError,
    PanoramaInfo, Pixels,
};
use crate::{
    mcd::{looks_like_mcd, McdError, McdFile},
    placement::Placement,
};

/// The *.mcd container format
#[derive(Debug, Clone, Copy, Default)]
pub struct McdFormat {
    include_default_panoramas: bool,
}

impl McdFormat {
    /// Create the format. Panoramas of type `Default` are only listed if
    /// `include_default_panoramas` is set.
    pub fn new(include_default_panoramas: bool) -> Self {
        McdFormat {
            include_default_panoramas,
        }
    }
}

impl FileFormat for McdFormat {
    fn name(&self) -> &'static str {
        "mcd"
    }

    fn accepts(&self, path: &Path) -> bool {
        path.is_file() && (has_extension(path, "mcd") || looks_like_mcd(path))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FileReader>, FormatError> {
        Ok(Box::new(McdReader {
            mcd: McdFile::from_path(path)?,
            include_default_panoramas: self.include_default_panoramas,
        }))
    }
}

struct McdReader {
    mcd: McdFile<File>,
    include_default_panoramas: bool,
}

impl FileReader for McdReader {
    fn panoramas(&mut self) -> Result<Vec<PanoramaInfo>, FormatError> {
        Ok(self
            .mcd
            .metadata()
            .panoramas()
            .iter()
            .filter(|panorama| self.include_default_panoramas || !panorama.is_default())
            .map(|panorama| PanoramaInfo {
                id: panorama.id(),
                description: panorama.description().to_string(),
                panorama_type: panorama.panorama_type().map(String::from),
            })
            .collect())
    }

    fn acquisitions(&mut self) -> Result<Vec<AcquisitionInfo>, FormatError> {
        Ok(self
            .mcd
            .metadata()
            .acquisitions()
            .iter()
            .filter(|acquisition| acquisition.is_valid())
            .map(|acquisition| AcquisitionInfo {
                id: acquisition.id(),
                description: acquisition.description().to_string(),
                channel_labels: acquisition.channel_labels(),
            })
            .collect())
    }

    fn read_panorama(&mut self, id: u16) -> Result<DecodedImage, FormatError> {
        let (placement, orientation) = self
            .mcd
            .metadata()
            .panorama(id)
            .ok_or(McdError::UnknownPanorama { id })?
            .placement()
            .ok_or(McdError::MissingElement {
                entity: "Panorama",
                element: "SlideX1PosUm",
            })?;

        let data = self.mcd.panorama_image(id)?;

        Ok(DecodedImage {
            placement,
            pixels: Pixels::Rgba(orientation.apply(data)),
        })
    }

    fn read_acquisition_channel(
        &mut self,
        id: u16,
        label: &str,
    ) -> Result<(Placement, Array2<f32>), FormatError> {
        let (placement, orientation) = self
            .mcd
            .metadata()
            .acquisition(id)
            .ok_or(McdError::UnknownAcquisition { id })?
            .placement()
            .ok_or(McdError::MissingElement {
                entity: "Acquisition",
                element: "ROIStartXPosUm",
            })?;

        let data = self.mcd.channel_plane(id, label)?;

        Ok((placement, orientation.apply(data)))
    }
}
