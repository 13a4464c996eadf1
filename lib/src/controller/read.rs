use std::{fmt, path::PathBuf, sync::Arc};

use log::debug;
use rayon::prelude::*;

use crate::{
    error::{ImcError, Result},
    format::{DecodedImage, FileFormat, FileReader, FormatError, Pixels},
    model::{AcquisitionKey, FileId, PanoramaKey},
};

/// State change requested by the user which needs pixel data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Show a panorama
    ShowPanorama(PanoramaKey),
    /// Load an acquisition (rendering every channel that is already shown)
    LoadAcquisition(AcquisitionKey),
    /// Show a channel for every loaded acquisition
    ShowChannel(String),
}

/// Image read from a file on behalf of an [`Intent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadTarget {
    /// Panorama image
    Panorama(PanoramaKey),
    /// Single channel of an acquisition
    AcquisitionChannel {
        /// The acquisition
        acquisition: AcquisitionKey,
        /// Label of the channel
        label: String,
    },
}

impl ReadTarget {
    /// The file read from
    pub fn file(&self) -> FileId {
        match self {
            ReadTarget::Panorama(key) => key.file,
            ReadTarget::AcquisitionChannel { acquisition, .. } => acquisition.file,
        }
    }

    fn read(&self, reader: &mut dyn FileReader) -> std::result::Result<DecodedImage, FormatError> {
        match self {
            ReadTarget::Panorama(key) => reader.read_panorama(key.id),
            ReadTarget::AcquisitionChannel { acquisition, label } => {
                let (placement, plane) = reader.read_acquisition_channel(acquisition.id, label)?;

                Ok(DecodedImage {
                    placement,
                    pixels: Pixels::Intensity(plane),
                })
            }
        }
    }
}

impl fmt::Display for ReadTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReadTarget::Panorama(key) => write!(f, "panorama {} of file {}", key.id, key.file),
            ReadTarget::AcquisitionChannel { acquisition, label } => write!(
                f,
                "channel {} of acquisition {} of file {}",
                label, acquisition.id, acquisition.file
            ),
        }
    }
}

/// Reads from one file, sharing a single reader
#[derive(Debug, Clone)]
pub(super) struct FileJob {
    pub(super) file: FileId,
    pub(super) path: PathBuf,
    pub(super) format: Arc<dyn FileFormat>,
    pub(super) targets: Vec<ReadTarget>,
}

impl FileJob {
    fn run(&self) -> Result<Vec<(ReadTarget, DecodedImage)>> {
        let mut reader = self.format.open(&self.path).map_err(|source| ImcError::Read {
            target: self.path.display().to_string(),
            source,
        })?;

        self.targets
            .iter()
            .map(|target| {
                debug!("Reading {} from {:?}", target, self.path);

                target
                    .read(reader.as_mut())
                    .map(|image| (target.clone(), image))
                    .map_err(|source| ImcError::Read {
                        target: target.to_string(),
                        source,
                    })
            })
            .collect()
    }
}

/// Reads planned for an [`Intent`], not yet executed. Can be sent to a worker thread.
#[derive(Debug, Clone)]
pub struct PendingRead {
    pub(super) intent: Intent,
    pub(super) jobs: Vec<FileJob>,
}

impl PendingRead {
    /// The intent the reads were planned for
    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    /// Everything that will be read, in commit order
    pub fn targets(&self) -> Vec<ReadTarget> {
        self.jobs
            .iter()
            .flat_map(|job| job.targets.iter().cloned())
            .collect()
    }

    /// Run the reads. Files are read in parallel, each with its own reader which is released
    /// before this returns.
    pub fn execute(self) -> CompletedRead {
        let planned = self.targets();

        let results: Vec<Result<Vec<(ReadTarget, DecodedImage)>>> =
            self.jobs.par_iter().map(FileJob::run).collect();

        let result = results
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .map(|images| images.into_iter().flatten().collect());

        CompletedRead {
            intent: self.intent,
            planned,
            result,
        }
    }
}

/// Outcome of [`PendingRead::execute`], to be handed back to the controller
#[derive(Debug)]
pub struct CompletedRead {
    pub(super) intent: Intent,
    pub(super) planned: Vec<ReadTarget>,
    pub(super) result: Result<Vec<(ReadTarget, DecodedImage)>>,
}

impl CompletedRead {
    /// The intent the reads were planned for
    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    /// True if every read succeeded
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
