mod mcd;
mod txt;

use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, warn};
use ndarray::{Array2, Array3};
use thiserror::Error;

pub use self::mcd::McdFormat;
pub use self::txt::TxtFormat;
use crate::{
    error::{ImcError, Result},
    placement::Placement,
    ViewerConfig,
};

/// Error raised by a [`FileReader`]
#[derive(Error, Debug)]
pub enum FormatError {
    /// Error raised by the .mcd decoder
    #[error(transparent)]
    Mcd(#[from] crate::mcd::McdError),
    /// Error raised by the .txt decoder
    #[error(transparent)]
    Txt(#[from] crate::txt::TxtError),
    /// An I/O error occurred
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The format cannot provide what was requested
    #[error("{0} is not supported by this format")]
    Unsupported(&'static str),
    /// No panorama or acquisition with the requested ID exists in the file
    #[error("No such {kind} in file: {id}")]
    NotFound {
        /// `panorama` or `acquisition`
        kind: &'static str,
        /// The requested ID
        id: u16,
    },
}

/// Panorama as listed by a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanoramaInfo {
    /// Panorama ID, unique within the file
    pub id: u16,
    /// Description given to the panorama
    pub description: String,
    /// Type of the panorama, if the format records one
    pub panorama_type: Option<String>,
}

/// Acquisition as listed by a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionInfo {
    /// Acquisition ID, unique within the file
    pub id: u16,
    /// Description given to the acquisition
    pub description: String,
    /// Labels of the channels, in acquisition order and without duplicates
    pub channel_labels: Vec<String>,
}

/// Decoded pixel data, oriented so that row 0 / column 0 are at the minimum physical coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    /// Single channel intensities, shape (height, width)
    Intensity(Array2<f32>),
    /// Colour image, shape (height, width, 4)
    Rgba(Array3<u8>),
}

impl Pixels {
    /// Returns (rows, columns)
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Pixels::Intensity(data) => data.dim(),
            Pixels::Rgba(data) => {
                let (rows, columns, _) = data.dim();
                (rows, columns)
            }
        }
    }

    /// Largest intensity, or 0 for an empty or colour image
    pub fn max_intensity(&self) -> f32 {
        match self {
            Pixels::Intensity(data) => data
                .iter()
                .copied()
                .filter(|value| value.is_finite())
                .fold(0.0, f32::max),
            Pixels::Rgba(_) => 0.0,
        }
    }
}

/// Pixel data together with where it belongs on the slide
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// Physical placement of the image
    pub placement: Placement,
    /// Oriented pixel data
    pub pixels: Pixels,
}

/// Access to a single opened file. The file is released when the reader is dropped.
pub trait FileReader {
    /// Panoramas stored in the file
    fn panoramas(&mut self) -> std::result::Result<Vec<PanoramaInfo>, FormatError>;

    /// Acquisitions stored in the file
    fn acquisitions(&mut self) -> std::result::Result<Vec<AcquisitionInfo>, FormatError>;

    /// Decode a panorama image
    fn read_panorama(&mut self, id: u16) -> std::result::Result<DecodedImage, FormatError>;

    /// Decode the image of a single channel of an acquisition
    fn read_acquisition_channel(
        &mut self,
        id: u16,
        label: &str,
    ) -> std::result::Result<(Placement, Array2<f32>), FormatError>;
}

/// A supported kind of file
pub trait FileFormat: Debug + Send + Sync {
    /// Short name used in configuration and log messages
    fn name(&self) -> &'static str;

    /// Cheap check whether this format can read the file at `path`
    fn accepts(&self, path: &Path) -> bool;

    /// Open the file for reading
    fn open(&self, path: &Path) -> std::result::Result<Box<dyn FileReader>, FormatError>;
}

/// Open `path` with `format`, run `f` and release the file again, also when `f` fails
pub fn with_reader<T>(
    format: &dyn FileFormat,
    path: &Path,
    f: impl FnOnce(&mut dyn FileReader) -> std::result::Result<T, FormatError>,
) -> std::result::Result<T, FormatError> {
    let mut reader = format.open(path)?;

    f(reader.as_mut())
}

/// Metadata of a file together with the format that decoded it
#[derive(Debug, Clone)]
pub struct DecodedFile {
    /// Format which accepted and decoded the file
    pub format: Arc<dyn FileFormat>,
    /// Panoramas listed by the format
    pub panoramas: Vec<PanoramaInfo>,
    /// Acquisitions listed by the format
    pub acquisitions: Vec<AcquisitionInfo>,
}

/// Supported formats, in priority order
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: Vec<Arc<dyn FileFormat>>,
}

impl FormatRegistry {
    /// Registry without any formats
    pub fn new() -> Self {
        FormatRegistry::default()
    }

    /// Registry holding the formats named in the configuration, in the configured order
    pub fn from_config(config: &ViewerConfig) -> Self {
        let mut registry = FormatRegistry::new();

        for name in &config.formats {
            match name.as_str() {
                "mcd" => registry.register(Arc::new(McdFormat::new(
                    config.include_default_panoramas,
                ))),
                "txt" => registry.register(Arc::new(TxtFormat)),
                unknown => warn!("Ignoring unknown format `{}`", unknown),
            }
        }

        registry
    }

    /// Add a format with lower priority than all formats registered so far
    pub fn register(&mut self, format: Arc<dyn FileFormat>) {
        self.formats.push(format);
    }

    /// Registered formats, highest priority first
    pub fn formats(&self) -> &[Arc<dyn FileFormat>] {
        &self.formats
    }

    /// Read the metadata of `path` with the first format that accepts and decodes it
    pub fn decode(&self, path: &Path) -> Result<DecodedFile> {
        let mut cause = None;

        for format in self.formats.iter().filter(|format| format.accepts(path)) {
            let decoded = with_reader(format.as_ref(), path, |reader| {
                Ok((reader.panoramas()?, reader.acquisitions()?))
            });

            match decoded {
                Ok((panoramas, acquisitions)) => {
                    debug!("{:?} decoded by {}", path, format.name());

                    return Ok(DecodedFile {
                        format: format.clone(),
                        panoramas,
                        acquisitions,
                    });
                }
                Err(source) => {
                    let error = ImcError::Decode {
                        format: format.name(),
                        path: PathBuf::from(path),
                        source,
                    };
                    warn!("{}", error);
                    cause = Some(Box::new(error));
                }
            }
        }

        Err(ImcError::UnsupportedFormat {
            path: PathBuf::from(path),
            cause,
        })
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_txt, McdFixture, MemoryFormat};

    #[test]
    fn priority_order_wins() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("slide.imc");

        let first = MemoryFormat::new("first");
        let second = MemoryFormat::new("second");
        first.insert(&path, Default::default());
        second.insert(&path, Default::default());

        let mut registry = FormatRegistry::new();
        registry.register(Arc::new(first.clone()));
        registry.register(Arc::new(second.clone()));

        let decoded = registry.decode(&path).unwrap();
        assert_eq!(decoded.format.name(), "first");
        assert_eq!(second.open_count(), 0);
    }

    #[test]
    fn decode_failure_tries_next_format() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("slide.imc");

        let broken = MemoryFormat::new("broken");
        broken.insert(&path, Default::default());
        broken.fail_open(true);
        let working = MemoryFormat::new("working");
        working.insert(&path, Default::default());

        let mut registry = FormatRegistry::new();
        registry.register(Arc::new(broken));
        registry.register(Arc::new(working));

        assert_eq!(registry.decode(&path).unwrap().format.name(), "working");
    }

    #[test]
    fn unsupported_and_undecodable() {
        let directory = tempfile::tempdir().unwrap();
        let text = directory.path().join("notes.md");
        std::fs::write(&text, "# notes").unwrap();

        let registry = FormatRegistry::from_config(&ViewerConfig::default());
        assert!(matches!(
            registry.decode(&text),
            Err(ImcError::UnsupportedFormat { cause: None, .. })
        ));

        // Accepted by extension, but no metadata
        let fake = directory.path().join("fake.mcd");
        std::fs::write(&fake, vec![0u8; 100]).unwrap();
        match registry.decode(&fake) {
            Err(ImcError::UnsupportedFormat {
                cause: Some(cause), ..
            }) => assert!(matches!(*cause, ImcError::Decode { format: "mcd", .. })),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn default_formats() {
        let directory = tempfile::tempdir().unwrap();
        let mcd = directory.path().join("slide.mcd");
        let txt = directory.path().join("slide_ROI_2.txt");
        McdFixture::default().write(&mcd).unwrap();
        write_txt(&txt, 2, 2, &["DNA1(Ir191Di)"]).unwrap();

        let registry = FormatRegistry::from_config(&ViewerConfig::default());
        let names: Vec<_> = registry.formats().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["mcd", "txt"]);

        assert_eq!(registry.decode(&mcd).unwrap().format.name(), "mcd");

        let decoded = registry.decode(&txt).unwrap();
        assert_eq!(decoded.format.name(), "txt");
        assert!(decoded.panoramas.is_empty());
        assert_eq!(decoded.acquisitions[0].id, 2);
        assert_eq!(decoded.acquisitions[0].channel_labels, vec!["DNA1"]);
    }

    #[test]
    fn max_intensity_ignores_nan() {
        let pixels = Pixels::Intensity(ndarray::arr2(&[[1.0, f32::NAN], [7.5, 2.0]]));

        assert_eq!(pixels.max_intensity(), 7.5);
        assert_eq!(pixels.dimensions(), (2, 2));
    }
}
