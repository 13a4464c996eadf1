use std::path::Path;

use ndarray::Array2;

use super::{
    has_extension, AcquisitionInfo, DecodedImage, FileFormat, FileReader, FormatError,
    PanoramaInfo,
};
use crate::{
    placement::Placement,
    txt::{looks_like_txt, TxtFile},
};

/// Tab-separated export of a single acquisition (*.txt)
#[derive(Debug, Clone, Copy, Default)]
pub struct TxtFormat;

impl FileFormat for TxtFormat {
    fn name(&self) -> &'static str {
        "txt"
    }

    fn accepts(&self, path: &Path) -> bool {
        has_extension(path, "txt") && looks_like_txt(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FileReader>, FormatError> {
        Ok(Box::new(TxtReader {
            txt: TxtFile::from_path(path)?,
        }))
    }
}

struct TxtReader {
    txt: TxtFile,
}

impl FileReader for TxtReader {
    fn panoramas(&mut self) -> Result<Vec<PanoramaInfo>, FormatError> {
        Ok(Vec::new())
    }

    fn acquisitions(&mut self) -> Result<Vec<AcquisitionInfo>, FormatError> {
        Ok(vec![AcquisitionInfo {
            id: self.txt.acquisition_id(),
            description: self.txt.description().to_string(),
            channel_labels: self.txt.channel_labels(),
        }])
    }

    fn read_panorama(&mut self, _id: u16) -> Result<DecodedImage, FormatError> {
        Err(FormatError::Unsupported("Reading panoramas"))
    }

    fn read_acquisition_channel(
        &mut self,
        id: u16,
        label: &str,
    ) -> Result<(Placement, Array2<f32>), FormatError> {
        if id != self.txt.acquisition_id() {
            return Err(FormatError::NotFound {
                kind: "acquisition",
                id,
            });
        }

        let data = self.txt.channel_plane(label)?;
        let (height, width) = data.dim();

        Ok((
            Placement::new(0.0, 0.0, width as f64, height as f64),
            data,
        ))
    }
}
