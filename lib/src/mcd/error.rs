use std::{io, result, string::FromUtf16Error};

use thiserror::Error;

/// A type alias for `Result<T, imc_layers::mcd::McdError>`.
pub type Result<T> = result::Result<T, McdError>;

/// Describes what has gone wrong with reading an .mcd file
#[derive(Error, Debug)]
pub enum McdError {
    /// An I/O error occurred
    #[error("An I/O error occured")]
    Io {
        #[from]
        /// The original error that was raised.
        source: io::Error,
    },

    /// No `<MCDSchema>` block was found at the end of the file, so likely this is not a valid .mcd file.
    #[error("No MCDSchema found - is this a valid .mcd file?")]
    NoSchema,

    /// No slide present in the metadata, so likely this is not a valid .mcd file.
    #[error("No slide found in MCD file - is this a valid .mcd file?")]
    NoSlidePresent,

    /// An error occurred when converting XML to UTF-16
    #[error("An error occurred when converting XML to UTF-16")]
    Utf16 {
        #[from]
        /// The original error that was raised.
        source: FromUtf16Error,
    },

    /// An error occured when parsing the XML
    #[error("An error occured when parsing the XML: {source}")]
    InvalidXml {
        #[from]
        /// The original error that was raised.
        source: quick_xml::Error,
    },

    /// The text of an element could not be converted to the expected type
    #[error("Invalid value `{value}` for element {element}")]
    InvalidValue {
        /// Name of the element
        element: &'static str,
        /// Text content of the element
        value: String,
    },

    /// A required element was missing from an entity
    #[error("{entity} is missing required element {element}")]
    MissingElement {
        /// Name of the entity (e.g. Panorama)
        entity: &'static str,
        /// Name of the missing element
        element: &'static str,
    },

    /// An AcquisitionChannel refers to an acquisition which doesn't exist
    #[error("AcquisitionChannel refers to missing acquisition {acquisition}")]
    MissingAcquisition {
        /// The referenced acquisition ID
        acquisition: u16,
    },

    /// No panorama exists with the requested ID
    #[error("No such panorama: {id}")]
    UnknownPanorama {
        /// The requested ID
        id: u16,
    },

    /// No acquisition exists with the requested ID
    #[error("No such acquisition: {id}")]
    UnknownAcquisition {
        /// The requested ID
        id: u16,
    },

    /// The acquisition has no channel with the requested label
    #[error("Acquisition {acquisition} has no channel labelled {label}")]
    UnknownChannel {
        /// The acquisition ID
        acquisition: u16,
        /// The requested label
        label: String,
    },

    /// The panorama has no image stored in the file
    #[error("Panorama {id} has no image data")]
    NoImage {
        /// The panorama ID
        id: u16,
    },

    /// The acquisition can not be read (missing or inconsistent data offsets or dimensions)
    #[error("Acquisition {id} has no readable data")]
    InvalidAcquisition {
        /// The acquisition ID
        id: u16,
    },

    /// A data range in the metadata lies outside of the file
    #[error("Data range {start}..{end} is outside of the file ({file_size} bytes)")]
    InvalidOffsets {
        /// Start offset given in the metadata
        start: i64,
        /// End offset given in the metadata
        end: i64,
        /// Size of the file
        file_size: u64,
    },

    /// Only 4-byte floats are stored in known .mcd files
    #[error("Unsupported number of bytes per value: {value_bytes}")]
    UnsupportedValueBytes {
        /// Bytes per value specified in the file
        value_bytes: u8,
    },

    /// The embedded panorama image could not be decoded
    #[error("Failed to decode panorama image: {source}")]
    Image {
        #[from]
        /// The original error that was raised.
        source: image::ImageError,
    },

    /// Decoded data did not match the expected array shape
    #[error("Unexpected image shape: {source}")]
    Shape {
        #[from]
        /// The original error that was raised.
        source: ndarray::ShapeError,
    },
}
