//! The *.mcd container stores spectra and optical images as binary records, followed by a UTF-16
//! encoded XML document (`<MCDSchema>`) describing where everything is.
//!
//! ```no_run
//! use imc_layers::mcd::McdFile;
//!
//! let mut mcd = McdFile::from_path("../test/20200612_FLU_1923.mcd")?;
//! let dna = mcd.channel_plane(1, "DNA1")?;
//! println!("{:?}", dna.dim());
//! # Ok::<(), imc_layers::mcd::McdError>(())
//! ```

mod acquisition;
mod error;
mod panorama;
mod parser;
mod slide;
mod xml_types;

use std::{
    fmt,
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use ndarray::{Array2, Array3};

pub use acquisition::{Acquisition, AcquisitionChannel};
pub use error::{McdError, Result};
pub use panorama::{Panorama, PanoramaImage};
pub use parser::{parse_metadata, McdParser, ParserState};
pub use slide::Slide;

use crate::Print;
use xml_types::PANORAMA_HEADER_SIZE;

const BUF_SIZE: usize = 4096;
const SCHEMA_START: &str = "<MCDSchema";
const SCHEMA_END: &str = "</MCDSchema>";

/// Largest acquisition width or height accepted (in pixels)
const MAX_DIMENSION: usize = u16::MAX as usize;
/// Largest number of pixels in a channel plane
const MAX_PLANE_PIXELS: usize = 1 << 28;

/// Pixel index stored in a coordinate channel, `None` if it is not a valid index
fn pixel_coordinate(value: f32) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value <= MAX_DIMENSION as f32 {
        Some(value as usize)
    } else {
        None
    }
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

/// Metadata of an .mcd file
#[derive(Debug, Clone)]
pub struct McdMetadata {
    xmlns: Option<String>,
    slides: Vec<Slide>,
    panoramas: Vec<Panorama>,
    acquisitions: Vec<Acquisition>,
}

impl McdMetadata {
    /// XML namespace of the schema, which identifies the schema version
    pub fn xmlns(&self) -> Option<&str> {
        self.xmlns.as_deref()
    }

    /// Slides in the order they appear in the file
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Panoramas in the order they appear in the file
    pub fn panoramas(&self) -> &[Panorama] {
        &self.panoramas
    }

    /// Acquisitions in the order they appear in the file
    pub fn acquisitions(&self) -> &[Acquisition] {
        &self.acquisitions
    }

    /// Returns the panorama with the given ID
    pub fn panorama(&self, id: u16) -> Option<&Panorama> {
        self.panoramas.iter().find(|panorama| panorama.id() == id)
    }

    /// Returns the acquisition with the given ID
    pub fn acquisition(&self, id: u16) -> Option<&Acquisition> {
        self.acquisitions
            .iter()
            .find(|acquisition| acquisition.id() == id)
    }
}

#[rustfmt::skip]
impl Print for McdMetadata {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        if let Some(xmlns) = self.xmlns() {
            writeln!(writer, "{:indent$}XML Namespace: {}", "", xmlns, indent = indent)?;
        }

        for slide in &self.slides {
            slide.print(writer, indent + 1)?;
        }
        for panorama in &self.panoramas {
            panorama.print(writer, indent + 1)?;
        }
        for acquisition in &self.acquisitions {
            acquisition.print(writer, indent + 1)?;
        }

        Ok(())
    }
}

impl fmt::Display for McdMetadata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.print(f, 0)
    }
}

/// Open .mcd file: the parsed metadata plus the reader used to access pixel data
#[derive(Debug)]
pub struct McdFile<R> {
    reader: BufReader<R>,
    metadata: McdMetadata,
}

impl McdFile<File> {
    /// Open and parse the .mcd file at `path`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<McdFile<File>> {
        McdFile::parse(File::open(path)?)
    }
}

impl<R: Read + Seek> McdFile<R> {
    /// Parse *.mcd format
    pub fn parse(reader: R) -> Result<Self> {
        let mut reader = BufReader::new(reader);
        let xml = locate_xml(&mut reader)?;
        let metadata = parse_metadata(&xml)?;

        Ok(McdFile { reader, metadata })
    }

    /// Returns the parsed metadata
    pub fn metadata(&self) -> &McdMetadata {
        &self.metadata
    }

    fn file_size(&mut self) -> Result<u64> {
        Ok(self.reader.seek(SeekFrom::End(0))?)
    }

    /// Returns the raw XML metadata stored in the .mcd file
    pub fn xml(&mut self) -> Result<String> {
        locate_xml(&mut self.reader)
    }

    /// Decode the panorama image as an RGBA array of shape (height, width, 4), in the order it
    /// is stored in the file
    pub fn panorama_image(&mut self, id: u16) -> Result<Array3<u8>> {
        let panorama = self
            .metadata
            .panorama(id)
            .ok_or(McdError::UnknownPanorama { id })?;
        let image = *panorama.image().ok_or(McdError::NoImage { id })?;

        let (start_offset, end_offset) = image.offsets();
        let file_size = self.file_size()?;
        let image_start = start_offset
            .checked_add(PANORAMA_HEADER_SIZE)
            .and_then(|start| u64::try_from(start).ok());
        let image_end = u64::try_from(end_offset).ok();

        let (image_start, image_end) = match (image_start, image_end) {
            (Some(start), Some(end)) if start < end && end <= file_size => (start, end),
            _ => {
                return Err(McdError::InvalidOffsets {
                    start: start_offset,
                    end: end_offset,
                    file_size,
                })
            }
        };
        let mut data = vec![0u8; (image_end - image_start) as usize];

        self.reader.seek(SeekFrom::Start(image_start))?;
        self.reader.read_exact(&mut data)?;

        let format = match image.format() {
            Some(format) => format,
            None => image::guess_format(&data)?,
        };
        let rgba = image::load_from_memory_with_format(&data, format)?.into_rgba8();
        let (width, height) = rgba.dimensions();

        debug!("Decoded panorama {} ({} x {})", id, width, height);

        Ok(Array3::from_shape_vec(
            (height as usize, width as usize, 4),
            rgba.into_raw(),
        )?)
    }

    /// Read the image of the channel with the given label as a (height, width) array, in the
    /// order it is stored in the file. Pixels of an incomplete acquisition that were never
    /// acquired are zero.
    pub fn channel_plane(&mut self, acquisition_id: u16, label: &str) -> Result<Array2<f32>> {
        let acquisition = self
            .metadata
            .acquisition(acquisition_id)
            .ok_or(McdError::UnknownAcquisition { id: acquisition_id })?;

        if acquisition.value_bytes() != 4 {
            return Err(McdError::UnsupportedValueBytes {
                value_bytes: acquisition.value_bytes(),
            });
        }

        let channel_index =
            acquisition
                .channel_index(label)
                .ok_or_else(|| McdError::UnknownChannel {
                    acquisition: acquisition_id,
                    label: label.to_string(),
                })?;
        let (start_offset, end_offset) = acquisition
            .data_offsets()
            .ok_or(McdError::InvalidAcquisition { id: acquisition_id })?;

        let file_size = self.reader.seek(SeekFrom::End(0))?;
        if end_offset > file_size {
            return Err(McdError::InvalidOffsets {
                start: start_offset as i64,
                end: end_offset as i64,
                file_size,
            });
        }

        let (width, height) = (acquisition.width(), acquisition.height());
        let pixels = width.checked_mul(height).unwrap_or(usize::MAX);
        if width == 0
            || height == 0
            || width > MAX_DIMENSION
            || height > MAX_DIMENSION
            || pixels > MAX_PLANE_PIXELS
        {
            return Err(McdError::InvalidAcquisition { id: acquisition_id });
        }

        let coordinates = acquisition
            .coordinate_index("X")
            .zip(acquisition.coordinate_index("Y"));
        let spectrum_size = acquisition.spectrum_size();
        let num_spectra = acquisition.num_spectra();

        let mut plane = Array2::<f32>::zeros((height, width));
        let mut spectrum = vec![0u8; spectrum_size];

        self.reader.seek(SeekFrom::Start(start_offset))?;

        for index in 0..num_spectra {
            self.reader.read_exact(&mut spectrum)?;

            let (x, y) = match coordinates {
                Some((x_index, y_index)) => match (
                    pixel_coordinate(LittleEndian::read_f32(&spectrum[x_index * 4..])),
                    pixel_coordinate(LittleEndian::read_f32(&spectrum[y_index * 4..])),
                ) {
                    (Some(x), Some(y)) => (x, y),
                    _ => continue,
                },
                None => (index % width, index / width),
            };

            if let Some(pixel) = plane.get_mut((y, x)) {
                *pixel = LittleEndian::read_f32(&spectrum[channel_index * 4..]);
            }
        }

        debug!(
            "Read {} spectra of acquisition {} for channel {}",
            num_spectra, acquisition_id, label
        );

        Ok(plane)
    }
}

/// Search backwards from the end of the file for the UTF-16 encoded `<MCDSchema` tag and decode
/// the XML document from there
pub(crate) fn locate_xml<R: Read + Seek>(reader: &mut R) -> Result<String> {
    let pattern = utf16le(SCHEMA_START);
    let file_size = reader.seek(SeekFrom::End(0))?;

    let mut chunk_end = file_size;
    let mut buf_u8 = Vec::with_capacity(BUF_SIZE + pattern.len());

    let xml_start = loop {
        if chunk_end == 0 {
            return Err(McdError::NoSchema);
        }

        let chunk_start = chunk_end.saturating_sub(BUF_SIZE as u64);
        // Overlap with the previous chunk so a tag spanning the boundary is found
        let read_end = (chunk_end + pattern.len() as u64 - 1).min(file_size);

        buf_u8.resize((read_end - chunk_start) as usize, 0);
        reader.seek(SeekFrom::Start(chunk_start))?;
        reader.read_exact(&mut buf_u8)?;

        if let Some(position) = buf_u8
            .windows(pattern.len())
            .rposition(|window| window == pattern.as_slice())
        {
            break chunk_start + position as u64;
        }

        chunk_end = chunk_start;
    };

    let mut buf_u8 = vec![0u8; (file_size - xml_start) as usize];
    reader.seek(SeekFrom::Start(xml_start))?;
    reader.read_exact(&mut buf_u8)?;

    let mut buf_u16 = vec![0u16; buf_u8.len() / 2];
    LittleEndian::read_u16_into(&buf_u8[..buf_u16.len() * 2], &mut buf_u16);

    let mut xml = String::from_utf16(&buf_u16)?;
    if let Some(end) = xml.find(SCHEMA_END) {
        xml.truncate(end + SCHEMA_END.len());
    }

    Ok(xml)
}

/// Lightweight check whether the end of the file contains the closing `</MCDSchema>` tag
pub fn looks_like_mcd<P: AsRef<Path>>(path: P) -> bool {
    let check = || -> std::io::Result<bool> {
        let mut file = File::open(path.as_ref())?;
        let file_size = file.seek(SeekFrom::End(0))?;
        let tail_size = file_size.min(BUF_SIZE as u64);

        let mut tail = vec![0u8; tail_size as usize];
        file.seek(SeekFrom::Start(file_size - tail_size))?;
        file.read_exact(&mut tail)?;

        let pattern = utf16le(SCHEMA_END);
        Ok(tail.windows(pattern.len()).any(|window| window == pattern))
    };

    check().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::placement::Placement;
    use crate::testing::{replace_in_xml, McdFixture, McdFixtureAcquisition, McdFixturePanorama};

    #[test]
    fn locate_xml_after_binary_data() {
        let mut data = vec![0xABu8; 10_000];
        data.extend(utf16le("<MCDSchema><Slide><ID>0</ID></Slide></MCDSchema>"));
        data.extend([0u8; 6]);

        let xml = locate_xml(&mut Cursor::new(data)).unwrap();
        assert_eq!(xml, "<MCDSchema><Slide><ID>0</ID></Slide></MCDSchema>");
    }

    #[test]
    fn locate_xml_across_chunk_boundary() {
        let xml = "<MCDSchema><Slide><ID>0</ID></Slide></MCDSchema>";
        let encoded = utf16le(xml);

        // Place the start tag so it straddles the first chunk read from the end
        let padding = BUF_SIZE - encoded.len() + 10;
        let mut data = vec![1u8; 5000];
        data.extend(&encoded);
        data.extend(vec![0u8; padding]);

        assert_eq!(locate_xml(&mut Cursor::new(data)).unwrap(), xml);
    }

    #[test]
    fn missing_schema() {
        let data = vec![0u8; 9000];

        assert!(matches!(
            locate_xml(&mut Cursor::new(data)),
            Err(McdError::NoSchema)
        ));
    }

    #[test]
    fn read_channel_plane_and_panorama() {
        let fixture = McdFixture {
            panoramas: vec![McdFixturePanorama::rgba(1, 4, 3, [0.0, 40.0], [0.0, 30.0])],
            acquisitions: vec![McdFixtureAcquisition::new(
                1,
                3,
                2,
                &["DNA1", "CD45"],
                [10.0, 13.0],
                [20.0, 22.0],
            )],
            ..Default::default()
        };
        let bytes = fixture.to_bytes();

        let mut mcd = McdFile::parse(Cursor::new(bytes)).unwrap();

        let plane = mcd.channel_plane(1, "CD45").unwrap();
        assert_eq!(plane.dim(), (2, 3));
        assert_eq!(plane, fixture.acquisitions[0].expected_plane(1));

        let image = mcd.panorama_image(1).unwrap();
        assert_eq!(image.dim(), (3, 4, 4));
        assert_eq!(image, fixture.panoramas[0].pixels);

        assert!(matches!(
            mcd.channel_plane(1, "CD3"),
            Err(McdError::UnknownChannel { .. })
        ));
        assert!(matches!(
            mcd.panorama_image(9),
            Err(McdError::UnknownPanorama { id: 9 })
        ));
    }

    #[test]
    fn panorama_recorded_a_quarter_turn_apart() {
        let fixture = McdFixture {
            panoramas: vec![McdFixturePanorama::rgba(1, 4, 3, [0.0, 400.0], [0.0, 300.0])],
            ..Default::default()
        };

        // Corners listed counter-clockwise, so the first edge runs along y
        let bytes = replace_in_xml(
            &fixture.to_bytes(),
            "<SlideX2PosUm>400</SlideX2PosUm><SlideY2PosUm>0</SlideY2PosUm>",
            "<SlideX2PosUm>0</SlideX2PosUm><SlideY2PosUm>300</SlideY2PosUm>",
        );
        let bytes = replace_in_xml(
            &bytes,
            "<SlideX4PosUm>0</SlideX4PosUm><SlideY4PosUm>300</SlideY4PosUm>",
            "<SlideX4PosUm>400</SlideX4PosUm><SlideY4PosUm>0</SlideY4PosUm>",
        );

        let mut mcd = McdFile::parse(Cursor::new(bytes)).unwrap();

        let (placement, orientation) = mcd.metadata().panorama(1).unwrap().placement().unwrap();
        assert_eq!(placement, Placement::new(0.0, 0.0, 400.0, 300.0));
        assert!(orientation.is_identity());

        // Pixels are kept as stored
        assert_eq!(mcd.panorama_image(1).unwrap(), fixture.panoramas[0].pixels);
    }

    fn single_acquisition() -> McdFixture {
        McdFixture {
            acquisitions: vec![McdFixtureAcquisition::new(
                1,
                3,
                2,
                &["DNA1"],
                [0.0, 3.0],
                [0.0, 2.0],
            )],
            ..Default::default()
        }
    }

    #[test]
    fn oversized_acquisition() {
        let bytes = single_acquisition().to_bytes();

        for (from, to) in [
            ("<MaxX>3</MaxX>", "<MaxX>2147483647</MaxX>"),
            ("<MaxY>2</MaxY>", "<MaxY>2147483647</MaxY>"),
            ("<MaxX>3</MaxX>", "<MaxX>0</MaxX>"),
        ] {
            let mut mcd = McdFile::parse(Cursor::new(replace_in_xml(&bytes, from, to))).unwrap();

            assert!(matches!(
                mcd.channel_plane(1, "DNA1"),
                Err(McdError::InvalidAcquisition { id: 1 })
            ));
        }
    }

    #[test]
    fn acquisition_data_beyond_end_of_file() {
        let fixture = single_acquisition();
        let bytes = fixture.to_bytes();
        let (_, end) = McdFile::parse(Cursor::new(bytes.clone()))
            .unwrap()
            .metadata()
            .acquisition(1)
            .unwrap()
            .data_offsets()
            .unwrap();

        let patched = replace_in_xml(
            &bytes,
            &format!("<DataEndOffset>{}</DataEndOffset>", end),
            "<DataEndOffset>9223372036854775807</DataEndOffset>",
        );
        let mut mcd = McdFile::parse(Cursor::new(patched)).unwrap();

        assert!(matches!(
            mcd.channel_plane(1, "DNA1"),
            Err(McdError::InvalidOffsets { .. })
        ));
    }

    #[test]
    fn invalid_coordinates_are_skipped() {
        let fixture = single_acquisition();
        let mut bytes = fixture.to_bytes();

        // X of the second spectrum (x = 1, y = 0), which starts after the first 4 values
        let offset = 16 + 4 * 4;
        bytes[offset..offset + 4].copy_from_slice(&f32::NAN.to_le_bytes());

        let mut mcd = McdFile::parse(Cursor::new(bytes)).unwrap();
        let plane = mcd.channel_plane(1, "DNA1").unwrap();

        let mut expected = fixture.acquisitions[0].expected_plane(0);
        expected[[0, 1]] = 0.0;
        assert_eq!(plane, expected);
    }

    #[test]
    fn panorama_image_outside_of_file() {
        let fixture = McdFixture {
            panoramas: vec![McdFixturePanorama::rgba(1, 4, 3, [0.0, 40.0], [0.0, 30.0])],
            ..Default::default()
        };
        let bytes = fixture.to_bytes();
        let (start, end) = McdFile::parse(Cursor::new(bytes.clone()))
            .unwrap()
            .metadata()
            .panorama(1)
            .unwrap()
            .image()
            .unwrap()
            .offsets();

        let beyond_end = replace_in_xml(
            &bytes,
            &format!("<ImageEndOffset>{}</ImageEndOffset>", end),
            "<ImageEndOffset>9223372036854775807</ImageEndOffset>",
        );
        let negative_start = replace_in_xml(
            &bytes,
            &format!("<ImageStartOffset>{}</ImageStartOffset>", start),
            "<ImageStartOffset>-1000</ImageStartOffset>",
        );

        for patched in [beyond_end, negative_start] {
            let mut mcd = McdFile::parse(Cursor::new(patched)).unwrap();

            assert!(matches!(
                mcd.panorama_image(1),
                Err(McdError::InvalidOffsets { .. })
            ));
        }
    }

    #[test]
    fn recognises_schema_tail() {
        let directory = tempfile::tempdir().unwrap();
        let mcd_path = directory.path().join("slide.mcd");
        let other_path = directory.path().join("notes.mcd");

        McdFixture::default().write(&mcd_path).unwrap();
        std::fs::write(&other_path, b"not an mcd file").unwrap();

        assert!(looks_like_mcd(&mcd_path));
        assert!(!looks_like_mcd(&other_path));
        assert!(!looks_like_mcd(directory.path().join("missing.mcd")));
    }
}
