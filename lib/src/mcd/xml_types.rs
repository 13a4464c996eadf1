use image::ImageFormat;
use nalgebra::Vector2;

use super::{
    acquisition::{Acquisition, AcquisitionChannel},
    error::{McdError, Result},
    panorama::{Panorama, PanoramaImage},
    slide::Slide,
};

/// Number of bytes preceding the encoded panorama image (a serialised C# Drawing header)
pub(crate) const PANORAMA_HEADER_SIZE: i64 = 161;

fn required<T>(value: Option<T>, entity: &'static str, element: &'static str) -> Result<T> {
    value.ok_or(McdError::MissingElement { entity, element })
}

#[derive(Debug, Default)]
pub(crate) struct SlideXML {
    pub(crate) id: Option<u16>,
    pub(crate) description: Option<String>,
    pub(crate) sw_version: Option<String>,
    pub(crate) width_um: Option<f64>,
    pub(crate) height_um: Option<f64>,
}

impl TryFrom<SlideXML> for Slide {
    type Error = McdError;

    fn try_from(slide: SlideXML) -> Result<Self> {
        Ok(Slide {
            id: required(slide.id, "Slide", "ID")?,
            description: slide.description.unwrap_or_default(),
            sw_version: slide.sw_version,
            width_um: slide.width_um,
            height_um: slide.height_um,
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct PanoramaXML {
    pub(crate) id: Option<u16>,
    pub(crate) slide_id: Option<u16>,
    pub(crate) description: Option<String>,
    pub(crate) slide_x1_pos_um: Option<f64>,
    pub(crate) slide_y1_pos_um: Option<f64>,
    pub(crate) slide_x2_pos_um: Option<f64>,
    pub(crate) slide_y2_pos_um: Option<f64>,
    pub(crate) slide_x3_pos_um: Option<f64>,
    pub(crate) slide_y3_pos_um: Option<f64>,
    pub(crate) slide_x4_pos_um: Option<f64>,
    pub(crate) slide_y4_pos_um: Option<f64>,
    pub(crate) image_start_offset: Option<i64>,
    pub(crate) image_end_offset: Option<i64>,
    pub(crate) pixel_width: Option<i64>,
    pub(crate) pixel_height: Option<i64>,
    pub(crate) image_format: Option<String>,
    pub(crate) panorama_type: Option<String>,
}

impl PanoramaXML {
    fn corners(&self) -> Option<[Vector2<f64>; 4]> {
        Some([
            Vector2::new(self.slide_x1_pos_um?, self.slide_y1_pos_um?),
            Vector2::new(self.slide_x2_pos_um?, self.slide_y2_pos_um?),
            Vector2::new(self.slide_x3_pos_um?, self.slide_y3_pos_um?),
            Vector2::new(self.slide_x4_pos_um?, self.slide_y4_pos_um?),
        ])
    }

    fn image(&self) -> Option<PanoramaImage> {
        let start_offset = self.image_start_offset?;
        let end_offset = self.image_end_offset?;

        if end_offset <= start_offset.checked_add(PANORAMA_HEADER_SIZE)? {
            return None;
        }

        let format = self
            .image_format
            .as_deref()
            .and_then(|format| ImageFormat::from_extension(format.to_ascii_lowercase()));

        Some(PanoramaImage {
            start_offset,
            end_offset,
            format,
        })
    }
}

impl TryFrom<PanoramaXML> for Panorama {
    type Error = McdError;

    fn try_from(panorama: PanoramaXML) -> Result<Self> {
        let corners = panorama.corners();
        let image = panorama.image();

        Ok(Panorama {
            id: required(panorama.id, "Panorama", "ID")?,
            slide_id: panorama.slide_id,
            description: panorama.description.unwrap_or_default(),
            panorama_type: panorama.panorama_type,
            pixel_width: panorama.pixel_width,
            pixel_height: panorama.pixel_height,
            corners,
            image,
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct AcquisitionXML {
    pub(crate) id: Option<u16>,
    pub(crate) description: Option<String>,
    pub(crate) order_number: Option<i16>,
    pub(crate) ablation_distance_between_shots_x: Option<f64>,
    pub(crate) ablation_distance_between_shots_y: Option<f64>,
    pub(crate) data_start_offset: Option<i64>,
    pub(crate) data_end_offset: Option<i64>,
    pub(crate) roi_start_x_pos_um: Option<f64>,
    pub(crate) roi_start_y_pos_um: Option<f64>,
    pub(crate) roi_end_x_pos_um: Option<f64>,
    pub(crate) roi_end_y_pos_um: Option<f64>,
    pub(crate) value_bytes: Option<u8>,
    pub(crate) max_x: Option<i32>,
    pub(crate) max_y: Option<i32>,
}

impl TryFrom<AcquisitionXML> for Acquisition {
    type Error = McdError;

    fn try_from(acquisition: AcquisitionXML) -> Result<Self> {
        let roi_start = match (
            acquisition.roi_start_x_pos_um,
            acquisition.roi_start_y_pos_um,
        ) {
            (Some(x), Some(y)) => Some(Vector2::new(x, y)),
            _ => None,
        };
        let roi_end = match (acquisition.roi_end_x_pos_um, acquisition.roi_end_y_pos_um) {
            (Some(x), Some(y)) => Some(Vector2::new(x, y)),
            _ => None,
        };

        Ok(Acquisition {
            id: required(acquisition.id, "Acquisition", "ID")?,
            description: acquisition.description.unwrap_or_default(),
            order_number: acquisition.order_number,
            distance_between_shots: Vector2::new(
                acquisition.ablation_distance_between_shots_x.unwrap_or(1.0),
                acquisition.ablation_distance_between_shots_y.unwrap_or(1.0),
            ),
            data_start_offset: acquisition.data_start_offset,
            data_end_offset: acquisition.data_end_offset,
            roi_start,
            roi_end,
            value_bytes: acquisition.value_bytes.unwrap_or(4),
            max_x: acquisition.max_x.unwrap_or(0),
            max_y: acquisition.max_y.unwrap_or(0),
            channels: Vec::new(),
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct AcquisitionChannelXML {
    pub(crate) id: Option<u16>,
    pub(crate) channel_name: Option<String>,
    pub(crate) order_number: Option<i16>,
    pub(crate) acquisition_id: Option<u16>,
    pub(crate) channel_label: Option<String>,
}

impl TryFrom<AcquisitionChannelXML> for AcquisitionChannel {
    type Error = McdError;

    fn try_from(channel: AcquisitionChannelXML) -> Result<Self> {
        let name = required(channel.channel_name, "AcquisitionChannel", "ChannelName")?;
        let label = match channel.channel_label {
            Some(label) if !label.trim().is_empty() => label,
            _ => name.clone(),
        };

        Ok(AcquisitionChannel {
            id: required(channel.id, "AcquisitionChannel", "ID")?,
            acquisition_id: required(
                channel.acquisition_id,
                "AcquisitionChannel",
                "AcquisitionID",
            )?,
            order_number: required(channel.order_number, "AcquisitionChannel", "OrderNumber")?,
            name,
            label,
        })
    }
}
