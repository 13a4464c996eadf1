//! Fixtures shared by the unit tests: synthetic .mcd and .txt files, an in-memory format and a
//! canvas recording every call made to it.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    io::{self, Cursor, Write},
    path::{Path, PathBuf},
    rc::Rc,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use ndarray::{Array2, Array3, Axis};

use crate::{
    canvas::{ImageCanvas, LayerHandle, LayerProperty, LayerStack, LayerTag, NewLayer},
    format::{
        AcquisitionInfo, DecodedImage, FileFormat, FileReader, FormatError, PanoramaInfo, Pixels,
    },
    mcd::McdError,
    placement::Placement,
};

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

/// Replace the last occurrence of `from` in the UTF-16 metadata of an .mcd file
pub(crate) fn replace_in_xml(bytes: &[u8], from: &str, to: &str) -> Vec<u8> {
    let from = utf16le(from);
    let position = bytes
        .windows(from.len())
        .rposition(|window| window == from.as_slice())
        .expect("text present in metadata");

    let mut patched = bytes[..position].to_vec();
    patched.extend(utf16le(to));
    patched.extend(&bytes[position + from.len()..]);
    patched
}

/// Panorama written into an [`McdFixture`]
#[derive(Debug, Clone)]
pub(crate) struct McdFixturePanorama {
    pub(crate) id: u16,
    pub(crate) xs: [f64; 2],
    pub(crate) ys: [f64; 2],
    /// Pixels as stored in the file, (height, width, 4)
    pub(crate) pixels: Array3<u8>,
    placeholder: bool,
}

impl McdFixturePanorama {
    /// Panorama with a PNG image spanning `xs` x `ys`. The first values are the coordinates of
    /// the first corner.
    pub(crate) fn rgba(id: u16, width: usize, height: usize, xs: [f64; 2], ys: [f64; 2]) -> Self {
        let pixels = Array3::from_shape_fn((height, width, 4), |(y, x, c)| match c {
            3 => 255,
            _ => (x * 40 + y * 7 + c * 50 + id as usize) as u8,
        });

        McdFixturePanorama {
            id,
            xs,
            ys,
            pixels,
            placeholder: false,
        }
    }

    /// Panorama of type `Default` without an image
    pub(crate) fn placeholder(id: u16) -> Self {
        McdFixturePanorama {
            id,
            xs: [0.0, 0.0],
            ys: [0.0, 0.0],
            pixels: Array3::zeros((0, 0, 4)),
            placeholder: true,
        }
    }

    fn png(&self) -> Vec<u8> {
        let (height, width, _) = self.pixels.dim();
        let image = RgbaImage::from_raw(
            width as u32,
            height as u32,
            self.pixels.iter().copied().collect(),
        )
        .expect("pixel buffer matches dimensions");

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .expect("PNG encoding");

        png
    }
}

/// Acquisition written into an [`McdFixture`]
#[derive(Debug, Clone)]
pub(crate) struct McdFixtureAcquisition {
    pub(crate) id: u16,
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) labels: Vec<String>,
    pub(crate) xs: [f64; 2],
    pub(crate) ys: [f64; 2],
    has_data: bool,
}

impl McdFixtureAcquisition {
    /// Acquisition of `width` x `height` spectra with the given channels. `xs` and `ys` are the
    /// ROI start and end coordinates.
    pub(crate) fn new(
        id: u16,
        width: usize,
        height: usize,
        labels: &[&str],
        xs: [f64; 2],
        ys: [f64; 2],
    ) -> Self {
        McdFixtureAcquisition {
            id,
            width,
            height,
            labels: labels.iter().map(|label| label.to_string()).collect(),
            xs,
            ys,
            has_data: true,
        }
    }

    /// Acquisition without any stored spectra
    pub(crate) fn empty(id: u16, labels: &[&str]) -> Self {
        McdFixtureAcquisition {
            has_data: false,
            ..McdFixtureAcquisition::new(id, 2, 2, labels, [0.0, 2.0], [0.0, 2.0])
        }
    }

    fn value(&self, channel: usize, x: usize, y: usize) -> f32 {
        (self.id as usize * 1000 + channel * 100 + y * self.width + x) as f32
    }

    /// Plane of the channel at `channel` in the order it is stored in the file
    pub(crate) fn expected_plane(&self, channel: usize) -> Array2<f32> {
        Array2::from_shape_fn((self.height, self.width), |(y, x)| {
            self.value(channel, x, y)
        })
    }

    fn spectra(&self) -> Vec<u8> {
        let mut data = Vec::new();

        for y in 0..self.height {
            for x in 0..self.width {
                let mut spectrum = vec![x as f32, y as f32, 0.0];
                spectrum.extend((0..self.labels.len()).map(|channel| self.value(channel, x, y)));

                for value in spectrum {
                    data.extend(value.to_le_bytes());
                }
            }
        }

        data
    }
}

/// Synthetic .mcd file: acquisition data, then panorama images, then the XML metadata
#[derive(Debug, Clone, Default)]
pub(crate) struct McdFixture {
    pub(crate) panoramas: Vec<McdFixturePanorama>,
    pub(crate) acquisitions: Vec<McdFixtureAcquisition>,
}

impl McdFixture {
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; 16];
        let mut xml = String::from(
            r#"<MCDSchema xmlns="http://www.fluidigm.com/IMC/MCDSchema_V2_0.xsd"><Slide><ID>0</ID><Description>Slide</Description><SwVersion>7.0.8493.0</SwVersion><WidthUm>75000</WidthUm><HeightUm>25000</HeightUm></Slide>"#,
        );

        for panorama in &self.panoramas {
            let start = bytes.len();
            if !panorama.placeholder {
                bytes.extend([0u8; 161]);
                bytes.extend(panorama.png());
            }
            let end = bytes.len();

            let [xa, xb] = panorama.xs;
            let [ya, yb] = panorama.ys;
            let (height, width, _) = panorama.pixels.dim();

            xml.push_str(&format!(
                "<Panorama><ID>{id}</ID><SlideID>0</SlideID><Description>Panorama_{id:03}</Description>\
                 <SlideX1PosUm>{xa}</SlideX1PosUm><SlideY1PosUm>{ya}</SlideY1PosUm>\
                 <SlideX2PosUm>{xb}</SlideX2PosUm><SlideY2PosUm>{ya}</SlideY2PosUm>\
                 <SlideX3PosUm>{xb}</SlideX3PosUm><SlideY3PosUm>{yb}</SlideY3PosUm>\
                 <SlideX4PosUm>{xa}</SlideX4PosUm><SlideY4PosUm>{yb}</SlideY4PosUm>\
                 <ImageStartOffset>{start}</ImageStartOffset><ImageEndOffset>{end}</ImageEndOffset>\
                 <PixelWidth>{width}</PixelWidth><PixelHeight>{height}</PixelHeight>\
                 <ImageFormat>PNG</ImageFormat><Type>{kind}</Type></Panorama>",
                id = panorama.id,
                kind = if panorama.placeholder { "Default" } else { "Instrument" },
            ));
        }

        let mut channels = String::new();
        let mut channel_id = 0;

        for acquisition in &self.acquisitions {
            let start = bytes.len();
            if acquisition.has_data {
                bytes.extend(acquisition.spectra());
            }
            let end = bytes.len();

            let [start_x, end_x] = acquisition.xs;
            let [start_y, end_y] = acquisition.ys;

            xml.push_str(&format!(
                "<Acquisition><ID>{id}</ID><Description>ROI_{id:03}</Description><OrderNumber>{id}</OrderNumber>\
                 <AblationDistanceBetweenShotsX>1</AblationDistanceBetweenShotsX>\
                 <AblationDistanceBetweenShotsY>1</AblationDistanceBetweenShotsY>\
                 <DataStartOffset>{start}</DataStartOffset><DataEndOffset>{end}</DataEndOffset>\
                 <ROIStartXPosUm>{start_x}</ROIStartXPosUm><ROIStartYPosUm>{start_y}</ROIStartYPosUm>\
                 <ROIEndXPosUm>{end_x}</ROIEndXPosUm><ROIEndYPosUm>{end_y}</ROIEndYPosUm>\
                 <ValueBytes>4</ValueBytes><MaxX>{width}</MaxX><MaxY>{height}</MaxY></Acquisition>",
                id = acquisition.id,
                width = acquisition.width,
                height = acquisition.height,
            ));

            let names = ["X", "Y", "Z"]
                .iter()
                .map(|name| (name.to_string(), name.to_string()))
                .chain(
                    acquisition
                        .labels
                        .iter()
                        .enumerate()
                        .map(|(index, label)| (format!("Ch{}", 140 + index), label.clone())),
                );

            for (order, (name, label)) in names.enumerate() {
                channel_id += 1;
                channels.push_str(&format!(
                    "<AcquisitionChannel><ID>{channel_id}</ID><ChannelName>{name}</ChannelName>\
                     <OrderNumber>{order}</OrderNumber><AcquisitionID>{acquisition}</AcquisitionID>\
                     <ChannelLabel>{label}</ChannelLabel></AcquisitionChannel>",
                    acquisition = acquisition.id,
                ));
            }
        }

        xml.push_str(&channels);
        xml.push_str("</MCDSchema>");

        bytes.extend(utf16le(&xml));
        bytes
    }

    pub(crate) fn write(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }
}

/// Write a text export of `width` x `height` pixels. The value of channel `c` at pixel (x, y) is
/// `(c + 1) * 100 + y * width + x`.
pub(crate) fn write_txt(path: &Path, width: usize, height: usize, headers: &[&str]) -> io::Result<()> {
    let mut file = io::BufWriter::new(fs::File::create(path)?);

    write!(file, "Start_push\tEnd_push\tPushes_duration\tX\tY\tZ")?;
    for header in headers {
        write!(file, "\t{}", header)?;
    }
    writeln!(file)?;

    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            write!(file, "{}\t{}\t1\t{}\t{}\t0", index * 2, index * 2 + 1, x, y)?;
            for channel in 0..headers.len() {
                write!(file, "\t{}", (channel + 1) * 100 + index)?;
            }
            writeln!(file)?;
        }
    }

    file.flush()
}

/// File served by a [`MemoryFormat`]
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryFile {
    pub(crate) panoramas: Vec<(PanoramaInfo, DecodedImage)>,
    pub(crate) acquisitions: Vec<(AcquisitionInfo, Placement, Array3<f32>)>,
    pub(crate) fail_reads: bool,
}

impl MemoryFile {
    /// File with a single acquisition placed at the origin, one pixel per μm
    pub(crate) fn with_acquisition(id: u16, labels: &[&str], width: usize, height: usize) -> Self {
        MemoryFile::default().acquisition(
            id,
            labels,
            Placement::new(0.0, 0.0, width as f64, height as f64),
            width,
            height,
        )
    }

    /// Add an acquisition. Channel `c` holds `id * 100 + c * 10 + y * width + x`.
    pub(crate) fn acquisition(
        mut self,
        id: u16,
        labels: &[&str],
        placement: Placement,
        width: usize,
        height: usize,
    ) -> Self {
        let planes = Array3::from_shape_fn((labels.len(), height, width), |(c, y, x)| {
            (id as usize * 100 + c * 10 + y * width + x) as f32
        });

        self.acquisitions.push((
            AcquisitionInfo {
                id,
                description: format!("ROI {}", id),
                channel_labels: labels.iter().map(|label| label.to_string()).collect(),
            },
            placement,
            planes,
        ));
        self
    }

    /// Add a 2 x 2 RGBA panorama
    pub(crate) fn panorama(mut self, id: u16, placement: Placement) -> Self {
        self.panoramas.push((
            PanoramaInfo {
                id,
                description: format!("Panorama {}", id),
                panorama_type: Some("Instrument".to_string()),
            },
            DecodedImage {
                placement,
                pixels: Pixels::Rgba(Array3::from_elem((2, 2, 4), id as u8)),
            },
        ));
        self
    }
}

/// Format serving [`MemoryFile`]s registered under their path. Clones share their files.
#[derive(Debug, Clone)]
pub(crate) struct MemoryFormat {
    name: &'static str,
    files: Arc<Mutex<HashMap<PathBuf, MemoryFile>>>,
    opened: Arc<AtomicUsize>,
    fail_open: Arc<AtomicBool>,
}

impl MemoryFormat {
    pub(crate) fn new(name: &'static str) -> Self {
        MemoryFormat {
            name,
            files: Arc::new(Mutex::new(HashMap::new())),
            opened: Arc::new(AtomicUsize::new(0)),
            fail_open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn insert(&self, path: &Path, file: MemoryFile) {
        self.files.lock().unwrap().insert(path.to_path_buf(), file);
    }

    /// Create an empty file called `name` in `directory` and serve `file` for it. Returns the
    /// canonical path.
    pub(crate) fn create(&self, directory: &Path, name: &str, file: MemoryFile) -> PathBuf {
        let path = directory.join(name);
        fs::write(&path, b"").unwrap();
        let path = path.canonicalize().unwrap();

        self.insert(&path, file);
        path
    }

    /// Make every read from the file at `path` fail
    pub(crate) fn fail_reads(&self, path: &Path, fail: bool) {
        if let Some(file) = self.files.lock().unwrap().get_mut(path) {
            file.fail_reads = fail;
        }
    }

    /// Make every attempt to open a file fail
    pub(crate) fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Number of times a file was opened
    pub(crate) fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl FileFormat for MemoryFormat {
    fn name(&self) -> &'static str {
        self.name
    }

    fn accepts(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FileReader>, FormatError> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        if self.fail_open.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "cannot open").into());
        }

        let file = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;

        Ok(Box::new(MemoryReader { file }))
    }
}

struct MemoryReader {
    file: MemoryFile,
}

impl MemoryReader {
    fn check_reads(&self) -> Result<(), FormatError> {
        if self.file.fail_reads {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated").into());
        }

        Ok(())
    }
}

impl FileReader for MemoryReader {
    fn panoramas(&mut self) -> Result<Vec<PanoramaInfo>, FormatError> {
        Ok(self.file.panoramas.iter().map(|(info, _)| info.clone()).collect())
    }

    fn acquisitions(&mut self) -> Result<Vec<AcquisitionInfo>, FormatError> {
        Ok(self.file.acquisitions.iter().map(|(info, _, _)| info.clone()).collect())
    }

    fn read_panorama(&mut self, id: u16) -> Result<DecodedImage, FormatError> {
        self.check_reads()?;

        self.file
            .panoramas
            .iter()
            .find(|(info, _)| info.id == id)
            .map(|(_, image)| image.clone())
            .ok_or(FormatError::NotFound {
                kind: "panorama",
                id,
            })
    }

    fn read_acquisition_channel(
        &mut self,
        id: u16,
        label: &str,
    ) -> Result<(Placement, Array2<f32>), FormatError> {
        self.check_reads()?;

        let (info, placement, planes) = self
            .file
            .acquisitions
            .iter()
            .find(|(info, _, _)| info.id == id)
            .ok_or(FormatError::NotFound {
                kind: "acquisition",
                id,
            })?;
        let channel = info
            .channel_labels
            .iter()
            .position(|existing| existing == label)
            .ok_or_else(|| McdError::UnknownChannel {
                acquisition: id,
                label: label.to_string(),
            })?;

        Ok((*placement, planes.index_axis(Axis(0), channel).to_owned()))
    }
}

/// Canvas keeping its layers in a [`LayerStack`] and logging every call
#[derive(Debug, Default)]
pub(crate) struct RecordingCanvas {
    pub(crate) stack: LayerStack,
    /// "add <name>" and "remove <name>" entries, shareable with event observers
    pub(crate) journal: Rc<RefCell<Vec<String>>>,
    pub(crate) property_updates: Vec<(LayerHandle, LayerProperty)>,
}

impl RecordingCanvas {
    pub(crate) fn names(&self) -> Vec<&str> {
        self.stack.names()
    }
}

impl ImageCanvas for RecordingCanvas {
    fn add_image(&mut self, layer: NewLayer, z_index: usize) -> LayerHandle {
        self.journal.borrow_mut().push(format!("add {}", layer.name));
        self.stack.add_image(layer, z_index)
    }

    fn remove_image(&mut self, handle: LayerHandle) -> bool {
        if let Some(layer) = self.stack.layer(handle) {
            self.journal
                .borrow_mut()
                .push(format!("remove {}", layer.name));
        }
        self.stack.remove_image(handle)
    }

    fn move_image(&mut self, handle: LayerHandle, z_index: usize) {
        self.stack.move_image(handle, z_index)
    }

    fn set_layer_property(&mut self, handle: LayerHandle, property: &LayerProperty) {
        self.property_updates.push((handle, *property));
        self.stack.set_layer_property(handle, property)
    }

    fn layer_tags(&self) -> Vec<(LayerHandle, Option<LayerTag>)> {
        self.stack.layer_tags()
    }
}
