//! Per-acquisition text exports are tab-separated tables with one row per pixel. The `X` and `Y`
//! columns hold the pixel position, every column that isn't bookkeeping holds the intensities of
//! one channel and is headed `Label(Metal)`.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    result,
};

use csv::{ReaderBuilder, StringRecord};
use log::debug;
use ndarray::Array2;
use thiserror::Error;

/// A type alias for `Result<T, imc_layers::txt::TxtError>`.
pub type Result<T> = result::Result<T, TxtError>;

/// Columns which do not hold channel intensities
const BOOKKEEPING_COLUMNS: [&str; 6] = ["Start_push", "End_push", "Pushes_duration", "X", "Y", "Z"];

/// Largest pixel coordinate accepted in the `X` and `Y` columns
const MAX_COORDINATE: usize = u16::MAX as usize;

/// Describes what has gone wrong with reading a .txt export
#[derive(Error, Debug)]
pub enum TxtError {
    /// An I/O error occurred
    #[error("An I/O error occured")]
    Io {
        #[from]
        /// The original error that was raised.
        source: io::Error,
    },

    /// The table could not be read
    #[error("Failed to read table: {source}")]
    Csv {
        #[from]
        /// The original error that was raised.
        source: csv::Error,
    },

    /// The header does not contain the named coordinate column
    #[error("Missing {column} column")]
    MissingColumn {
        /// Name of the missing column
        column: &'static str,
    },

    /// A cell could not be parsed as a number
    #[error("Invalid value `{value}` in column {column} on line {line}")]
    InvalidValue {
        /// Header of the column
        column: String,
        /// 1-based line number (the header is line 1)
        line: u64,
        /// Content of the cell
        value: String,
    },

    /// No column has the requested label
    #[error("No channel labelled {label}")]
    UnknownChannel {
        /// The requested label
        label: String,
    },
}

/// Channel column of a text export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtChannel {
    column: usize,
    name: String,
    label: String,
}

impl TxtChannel {
    fn from_header(column: usize, header: &str) -> Self {
        let header = header.trim();

        match header.find('(') {
            Some(open) if header.ends_with(')') => {
                let label = header[..open].trim();
                let name = &header[open + 1..header.len() - 1];

                TxtChannel {
                    column,
                    name: name.to_string(),
                    label: if label.is_empty() { name } else { label }.to_string(),
                }
            }
            _ => TxtChannel {
                column,
                name: header.to_string(),
                label: header.to_string(),
            },
        }
    }

    /// The name of the channel (usually the metal, e.g. Ir191Di)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The label of the channel (usually the target, e.g. DNA1)
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Text export of a single acquisition. Only the header is read when opening; channel data is
/// read on request.
#[derive(Debug, Clone)]
pub struct TxtFile {
    path: PathBuf,
    acquisition_id: u16,
    description: String,
    x_column: usize,
    y_column: usize,
    channels: Vec<TxtChannel>,
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.delimiter(b'\t').has_headers(true).trim(csv::Trim::All);

    builder
}

fn column_index(headers: &StringRecord, column: &'static str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header.trim() == column)
        .ok_or(TxtError::MissingColumn { column })
}

impl TxtFile {
    /// Open the export at `path` and read its header
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<TxtFile> {
        let path = path.as_ref();
        let mut reader = reader_builder().from_path(path)?;
        let headers = reader.headers()?.clone();

        let x_column = column_index(&headers, "X")?;
        let y_column = column_index(&headers, "Y")?;

        let channels = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !BOOKKEEPING_COLUMNS.contains(&header.trim()))
            .map(|(column, header)| TxtChannel::from_header(column, header))
            .collect();

        let description = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(TxtFile {
            path: path.to_path_buf(),
            acquisition_id: acquisition_id_from_stem(&description),
            description,
            x_column,
            y_column,
            channels,
        })
    }

    /// ID of the acquisition, taken from the trailing number of the file name
    pub fn acquisition_id(&self) -> u16 {
        self.acquisition_id
    }

    /// File name without extension
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Channels in column order
    pub fn channels(&self) -> &[TxtChannel] {
        &self.channels
    }

    /// Channel labels in column order, each label appearing once
    pub fn channel_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            if !labels.iter().any(|label| label == channel.label()) {
                labels.push(channel.label().to_string());
            }
        }

        labels
    }

    /// Read the image of the channel with the given label. The shape is (max Y + 1, max X + 1);
    /// pixels missing from the table are zero.
    pub fn channel_plane(&self, label: &str) -> Result<Array2<f32>> {
        let channel = self
            .channels
            .iter()
            .find(|channel| channel.label() == label)
            .ok_or_else(|| TxtError::UnknownChannel {
                label: label.to_string(),
            })?;

        let mut reader = reader_builder().from_path(&self.path)?;
        let headers = reader.headers()?.clone();

        let mut pixels = Vec::new();
        let (mut width, mut height) = (0, 0);

        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|position| position.line()).unwrap_or(0);

            let x = parse_coordinate(&headers, &record, self.x_column, line)?;
            let y = parse_coordinate(&headers, &record, self.y_column, line)?;
            let value = parse_cell::<f32>(&headers, &record, channel.column, line)?;

            width = width.max(x + 1);
            height = height.max(y + 1);
            pixels.push((x, y, value));
        }

        let mut plane = Array2::zeros((height, width));
        for (x, y, value) in pixels {
            plane[[y, x]] = value;
        }

        debug!(
            "Read {} x {} plane for channel {} from {:?}",
            width, height, label, self.path
        );

        Ok(plane)
    }
}

fn parse_cell<T: std::str::FromStr>(
    headers: &StringRecord,
    record: &StringRecord,
    column: usize,
    line: u64,
) -> Result<T> {
    let value = record.get(column).unwrap_or("");

    value.parse().map_err(|_| TxtError::InvalidValue {
        column: headers.get(column).unwrap_or("").to_string(),
        line,
        value: value.to_string(),
    })
}

/// Pixel coordinate: a whole number in [0, `MAX_COORDINATE`]
fn parse_coordinate(
    headers: &StringRecord,
    record: &StringRecord,
    column: usize,
    line: u64,
) -> Result<usize> {
    let coordinate = parse_cell::<f64>(headers, record, column, line)?;

    if coordinate.fract() != 0.0 || !(0.0..=MAX_COORDINATE as f64).contains(&coordinate) {
        return Err(TxtError::InvalidValue {
            column: headers.get(column).unwrap_or("").to_string(),
            line,
            value: record.get(column).unwrap_or("").to_string(),
        });
    }

    Ok(coordinate as usize)
}

fn acquisition_id_from_stem(stem: &str) -> u16 {
    stem.rsplit('_')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(1)
}

/// Lightweight check whether the first line of the file is a tab-separated header with `X` and
/// `Y` columns
pub fn looks_like_txt<P: AsRef<Path>>(path: P) -> bool {
    let check = || -> io::Result<bool> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);
        let mut header = String::new();
        reader.read_line(&mut header)?;

        let columns: Vec<&str> = header.trim_end().split('\t').map(str::trim).collect();
        Ok(columns.contains(&"X") && columns.contains(&"Y"))
    };

    check().unwrap_or(false)
}
