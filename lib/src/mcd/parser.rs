use std::{collections::HashMap, str::FromStr};

use log::{debug, warn};
use quick_xml::{events::Event, Reader};

use super::{
    acquisition::{Acquisition, AcquisitionChannel},
    error::{McdError, Result},
    panorama::Panorama,
    slide::Slide,
    xml_types::{AcquisitionChannelXML, AcquisitionXML, PanoramaXML, SlideXML},
    McdMetadata,
};

/// Which entity the parser is currently filling in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserState {
    /// No `<MCDSchema>` seen yet
    Start,
    /// Inside `<MCDSchema>`, between entities
    Processing,
    /// Inside a `<Slide>`
    ProcessingSlide,
    /// Inside a `<Panorama>`
    ProcessingPanorama,
    /// Inside an `<Acquisition>`
    ProcessingAcquisition,
    /// Inside an `<AcquisitionChannel>`
    ProcessingAcquisitionChannel,
    /// Inside an entity that is not needed (e.g. calibrations, ROI points)
    Skipping,
    /// `</MCDSchema>` reached
    Finished,
}

/// Element whose text content is expected next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Element {
    None,
    ID,
    SlideID,
    Description,
    SwVersion,
    WidthUm,
    HeightUm,
    SlideX1PosUm,
    SlideY1PosUm,
    SlideX2PosUm,
    SlideY2PosUm,
    SlideX3PosUm,
    SlideY3PosUm,
    SlideX4PosUm,
    SlideY4PosUm,
    ImageStartOffset,
    ImageEndOffset,
    PixelWidth,
    PixelHeight,
    ImageFormat,
    Type,
    OrderNumber,
    AblationDistanceBetweenShotsX,
    AblationDistanceBetweenShotsY,
    DataStartOffset,
    DataEndOffset,
    ROIStartXPosUm,
    ROIStartYPosUm,
    ROIEndXPosUm,
    ROIEndYPosUm,
    ValueBytes,
    MaxX,
    MaxY,
    ChannelName,
    ChannelLabel,
    AcquisitionID,
}

impl Element {
    fn from_tag(name: &[u8]) -> Self {
        match name {
            b"ID" => Element::ID,
            b"SlideID" => Element::SlideID,
            b"Description" => Element::Description,
            b"SwVersion" => Element::SwVersion,
            b"WidthUm" => Element::WidthUm,
            b"HeightUm" => Element::HeightUm,
            b"SlideX1PosUm" => Element::SlideX1PosUm,
            b"SlideY1PosUm" => Element::SlideY1PosUm,
            b"SlideX2PosUm" => Element::SlideX2PosUm,
            b"SlideY2PosUm" => Element::SlideY2PosUm,
            b"SlideX3PosUm" => Element::SlideX3PosUm,
            b"SlideY3PosUm" => Element::SlideY3PosUm,
            b"SlideX4PosUm" => Element::SlideX4PosUm,
            b"SlideY4PosUm" => Element::SlideY4PosUm,
            b"ImageStartOffset" => Element::ImageStartOffset,
            b"ImageEndOffset" => Element::ImageEndOffset,
            b"PixelWidth" => Element::PixelWidth,
            b"PixelHeight" => Element::PixelHeight,
            b"ImageFormat" => Element::ImageFormat,
            b"Type" => Element::Type,
            b"OrderNumber" => Element::OrderNumber,
            b"AblationDistanceBetweenShotsX" => Element::AblationDistanceBetweenShotsX,
            b"AblationDistanceBetweenShotsY" => Element::AblationDistanceBetweenShotsY,
            b"DataStartOffset" => Element::DataStartOffset,
            b"DataEndOffset" => Element::DataEndOffset,
            b"ROIStartXPosUm" => Element::ROIStartXPosUm,
            b"ROIStartYPosUm" => Element::ROIStartYPosUm,
            b"ROIEndXPosUm" => Element::ROIEndXPosUm,
            b"ROIEndYPosUm" => Element::ROIEndYPosUm,
            b"ValueBytes" => Element::ValueBytes,
            b"MaxX" => Element::MaxX,
            b"MaxY" => Element::MaxY,
            b"ChannelName" => Element::ChannelName,
            b"ChannelLabel" => Element::ChannelLabel,
            b"AcquisitionID" => Element::AcquisitionID,
            _ => Element::None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Element::None => "",
            Element::ID => "ID",
            Element::SlideID => "SlideID",
            Element::Description => "Description",
            Element::SwVersion => "SwVersion",
            Element::WidthUm => "WidthUm",
            Element::HeightUm => "HeightUm",
            Element::SlideX1PosUm => "SlideX1PosUm",
            Element::SlideY1PosUm => "SlideY1PosUm",
            Element::SlideX2PosUm => "SlideX2PosUm",
            Element::SlideY2PosUm => "SlideY2PosUm",
            Element::SlideX3PosUm => "SlideX3PosUm",
            Element::SlideY3PosUm => "SlideY3PosUm",
            Element::SlideX4PosUm => "SlideX4PosUm",
            Element::SlideY4PosUm => "SlideY4PosUm",
            Element::ImageStartOffset => "ImageStartOffset",
            Element::ImageEndOffset => "ImageEndOffset",
            Element::PixelWidth => "PixelWidth",
            Element::PixelHeight => "PixelHeight",
            Element::ImageFormat => "ImageFormat",
            Element::Type => "Type",
            Element::OrderNumber => "OrderNumber",
            Element::AblationDistanceBetweenShotsX => "AblationDistanceBetweenShotsX",
            Element::AblationDistanceBetweenShotsY => "AblationDistanceBetweenShotsY",
            Element::DataStartOffset => "DataStartOffset",
            Element::DataEndOffset => "DataEndOffset",
            Element::ROIStartXPosUm => "ROIStartXPosUm",
            Element::ROIStartYPosUm => "ROIStartYPosUm",
            Element::ROIEndXPosUm => "ROIEndXPosUm",
            Element::ROIEndYPosUm => "ROIEndYPosUm",
            Element::ValueBytes => "ValueBytes",
            Element::MaxX => "MaxX",
            Element::MaxY => "MaxY",
            Element::ChannelName => "ChannelName",
            Element::ChannelLabel => "ChannelLabel",
            Element::AcquisitionID => "AcquisitionID",
        }
    }

    fn parse<T: FromStr>(&self, text: &str) -> Result<T> {
        text.trim().parse().map_err(|_| McdError::InvalidValue {
            element: self.name(),
            value: text.to_string(),
        })
    }
}

/// Event driven parser for the `<MCDSchema>` metadata block
pub struct McdParser {
    state: ParserState,
    element: Element,
    skip_depth: usize,

    xmlns: Option<String>,
    slides: Vec<Slide>,
    panoramas: Vec<Panorama>,
    acquisitions: Vec<Acquisition>,
    acquisition_channels: Vec<AcquisitionChannel>,

    current_slide: Option<SlideXML>,
    current_panorama: Option<PanoramaXML>,
    current_acquisition: Option<AcquisitionXML>,
    current_acquisition_channel: Option<AcquisitionChannelXML>,
}

impl Default for McdParser {
    fn default() -> Self {
        McdParser::new()
    }
}

impl McdParser {
    /// Create a parser waiting for the `<MCDSchema>` start tag
    pub fn new() -> McdParser {
        McdParser {
            state: ParserState::Start,
            element: Element::None,
            skip_depth: 0,

            xmlns: None,
            slides: Vec::new(),
            panoramas: Vec::new(),
            acquisitions: Vec::new(),
            acquisition_channels: Vec::new(),

            current_slide: None,
            current_panorama: None,
            current_acquisition: None,
            current_acquisition_channel: None,
        }
    }

    /// Returns the current state of the parser
    pub fn current_state(&self) -> ParserState {
        self.state
    }

    /// Process the next XML event
    pub fn process(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Start(e) => {
                let name = e.local_name();

                if self.state == ParserState::Skipping {
                    self.skip_depth += 1;
                    return Ok(());
                }

                match name.as_ref() {
                    b"MCDSchema" => {
                        for attribute in e.attributes().flatten() {
                            if attribute.key.as_ref() == b"xmlns" {
                                self.xmlns = Some(attribute.unescape_value()?.into_owned());
                            }
                        }
                        self.state = ParserState::Processing
                    }
                    b"Slide" if self.state == ParserState::Processing => {
                        self.current_slide = Some(SlideXML::default());
                        self.state = ParserState::ProcessingSlide
                    }
                    b"Panorama" if self.state == ParserState::Processing => {
                        self.current_panorama = Some(PanoramaXML::default());
                        self.state = ParserState::ProcessingPanorama
                    }
                    b"Acquisition" if self.state == ParserState::Processing => {
                        self.current_acquisition = Some(AcquisitionXML::default());
                        self.state = ParserState::ProcessingAcquisition
                    }
                    b"AcquisitionChannel" if self.state == ParserState::Processing => {
                        self.current_acquisition_channel = Some(AcquisitionChannelXML::default());
                        self.state = ParserState::ProcessingAcquisitionChannel
                    }
                    _ if self.state == ParserState::Processing => {
                        // Calibrations, ROI points, fiducial marks, ...
                        self.state = ParserState::Skipping;
                        self.skip_depth = 1;
                    }
                    tag => self.element = Element::from_tag(tag),
                }
            }
            Event::End(e) => {
                let name = e.local_name();

                if self.state == ParserState::Skipping {
                    self.skip_depth -= 1;
                    if self.skip_depth == 0 {
                        self.state = ParserState::Processing;
                    }
                    return Ok(());
                }

                self.element = Element::None;

                match name.as_ref() {
                    b"Slide" => {
                        if let Some(slide) = self.current_slide.take() {
                            self.slides.push(slide.try_into()?);
                        }
                        self.state = ParserState::Processing
                    }
                    b"Panorama" => {
                        if let Some(panorama) = self.current_panorama.take() {
                            self.panoramas.push(panorama.try_into()?);
                        }
                        self.state = ParserState::Processing
                    }
                    b"Acquisition" => {
                        if let Some(acquisition) = self.current_acquisition.take() {
                            self.acquisitions.push(acquisition.try_into()?);
                        }
                        self.state = ParserState::Processing
                    }
                    b"AcquisitionChannel" => {
                        if let Some(channel) = self.current_acquisition_channel.take() {
                            self.acquisition_channels.push(channel.try_into()?);
                        }
                        self.state = ParserState::Processing
                    }
                    b"MCDSchema" => self.state = ParserState::Finished,
                    _ => {}
                }
            }
            Event::Text(e) => {
                if self.element == Element::None {
                    return Ok(());
                }

                let text = e.unescape()?;
                self.set_text(&text)?;
            }
            _ => {}
        }

        Ok(())
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        let element = self.element;

        match self.state {
            ParserState::ProcessingSlide => {
                if let Some(slide) = self.current_slide.as_mut() {
                    match element {
                        Element::ID => slide.id = Some(element.parse(text)?),
                        Element::Description => slide.description = Some(text.to_string()),
                        Element::SwVersion => slide.sw_version = Some(text.to_string()),
                        Element::WidthUm => slide.width_um = Some(element.parse(text)?),
                        Element::HeightUm => slide.height_um = Some(element.parse(text)?),
                        _ => {}
                    }
                }
            }
            ParserState::ProcessingPanorama => {
                if let Some(panorama) = self.current_panorama.as_mut() {
                    match element {
                        Element::ID => panorama.id = Some(element.parse(text)?),
                        Element::SlideID => panorama.slide_id = Some(element.parse(text)?),
                        Element::Description => panorama.description = Some(text.to_string()),
                        Element::SlideX1PosUm => panorama.slide_x1_pos_um = Some(element.parse(text)?),
                        Element::SlideY1PosUm => panorama.slide_y1_pos_um = Some(element.parse(text)?),
                        Element::SlideX2PosUm => panorama.slide_x2_pos_um = Some(element.parse(text)?),
                        Element::SlideY2PosUm => panorama.slide_y2_pos_um = Some(element.parse(text)?),
                        Element::SlideX3PosUm => panorama.slide_x3_pos_um = Some(element.parse(text)?),
                        Element::SlideY3PosUm => panorama.slide_y3_pos_um = Some(element.parse(text)?),
                        Element::SlideX4PosUm => panorama.slide_x4_pos_um = Some(element.parse(text)?),
                        Element::SlideY4PosUm => panorama.slide_y4_pos_um = Some(element.parse(text)?),
                        Element::ImageStartOffset => {
                            panorama.image_start_offset = Some(element.parse(text)?)
                        }
                        Element::ImageEndOffset => {
                            panorama.image_end_offset = Some(element.parse(text)?)
                        }
                        Element::PixelWidth => panorama.pixel_width = Some(element.parse(text)?),
                        Element::PixelHeight => panorama.pixel_height = Some(element.parse(text)?),
                        Element::ImageFormat => panorama.image_format = Some(text.to_string()),
                        Element::Type => panorama.panorama_type = Some(text.to_string()),
                        _ => {}
                    }
                }
            }
            ParserState::ProcessingAcquisition => {
                if let Some(acquisition) = self.current_acquisition.as_mut() {
                    match element {
                        Element::ID => acquisition.id = Some(element.parse(text)?),
                        Element::Description => acquisition.description = Some(text.to_string()),
                        Element::OrderNumber => acquisition.order_number = Some(element.parse(text)?),
                        Element::AblationDistanceBetweenShotsX => {
                            acquisition.ablation_distance_between_shots_x = Some(element.parse(text)?)
                        }
                        Element::AblationDistanceBetweenShotsY => {
                            acquisition.ablation_distance_between_shots_y = Some(element.parse(text)?)
                        }
                        Element::DataStartOffset => {
                            acquisition.data_start_offset = Some(element.parse(text)?)
                        }
                        Element::DataEndOffset => {
                            acquisition.data_end_offset = Some(element.parse(text)?)
                        }
                        Element::ROIStartXPosUm => {
                            acquisition.roi_start_x_pos_um = Some(element.parse(text)?)
                        }
                        Element::ROIStartYPosUm => {
                            acquisition.roi_start_y_pos_um = Some(element.parse(text)?)
                        }
                        Element::ROIEndXPosUm => {
                            acquisition.roi_end_x_pos_um = Some(element.parse(text)?)
                        }
                        Element::ROIEndYPosUm => {
                            acquisition.roi_end_y_pos_um = Some(element.parse(text)?)
                        }
                        Element::ValueBytes => acquisition.value_bytes = Some(element.parse(text)?),
                        Element::MaxX => acquisition.max_x = Some(element.parse(text)?),
                        Element::MaxY => acquisition.max_y = Some(element.parse(text)?),
                        _ => {}
                    }
                }
            }
            ParserState::ProcessingAcquisitionChannel => {
                if let Some(channel) = self.current_acquisition_channel.as_mut() {
                    match element {
                        Element::ID => channel.id = Some(element.parse(text)?),
                        Element::ChannelName => channel.channel_name = Some(text.to_string()),
                        Element::ChannelLabel => channel.channel_label = Some(text.to_string()),
                        Element::OrderNumber => channel.order_number = Some(element.parse(text)?),
                        Element::AcquisitionID => {
                            channel.acquisition_id = Some(element.parse(text)?)
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Attach the channels to their acquisitions and return the collected metadata
    pub fn finish(self) -> Result<McdMetadata> {
        if self.state != ParserState::Finished {
            warn!("MCDSchema ended unexpectedly (state {:?})", self.state);
        }

        if self.slides.is_empty() {
            return Err(McdError::NoSlidePresent);
        }

        let mut acquisitions: Vec<Acquisition> = self.acquisitions;
        let index: HashMap<u16, usize> = acquisitions
            .iter()
            .enumerate()
            .map(|(position, acquisition)| (acquisition.id(), position))
            .collect();

        for channel in self.acquisition_channels {
            let position =
                index
                    .get(&channel.acquisition_id())
                    .ok_or(McdError::MissingAcquisition {
                        acquisition: channel.acquisition_id(),
                    })?;

            acquisitions[*position].channels.push(channel);
        }

        for acquisition in acquisitions.iter_mut() {
            acquisition.sort_channels();
            acquisition.fix_roi_start_pos();
        }

        debug!(
            "Parsed {} slide(s), {} panorama(s), {} acquisition(s)",
            self.slides.len(),
            self.panoramas.len(),
            acquisitions.len()
        );

        Ok(McdMetadata {
            xmlns: self.xmlns,
            slides: self.slides,
            panoramas: self.panoramas,
            acquisitions,
        })
    }
}

/// Parse the `<MCDSchema>` XML document
pub fn parse_metadata(xml: &str) -> Result<McdMetadata> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut parser = McdParser::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            event => parser.process(event)?,
        }

        if parser.current_state() == ParserState::Finished {
            break;
        }
    }

    parser.finish()
}
