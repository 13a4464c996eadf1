use std::{fmt, ops::Range};

use log::{debug, warn};

use crate::{
    canvas::{ImageCanvas, LayerHandle, LayerProperty},
    error::{ImcError, Result},
    model::{AcquisitionKey, Blending, Channel, ChannelStyle, Color, Interpolation},
    Print,
};

/// Channels of all loaded acquisitions, deduplicated by label and kept in registration order
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

fn unknown(label: &str) -> ImcError {
    ImcError::UnknownEntity(format!("channel {}", label))
}

impl ChannelRegistry {
    /// No channels
    pub fn new() -> Self {
        ChannelRegistry::default()
    }

    /// All channels, in row order
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if no acquisition is loaded
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns the channel with the given label
    pub fn get(&self, label: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.label() == label)
    }

    pub(crate) fn get_mut(&mut self, label: &str) -> Option<&mut Channel> {
        self.channels
            .iter_mut()
            .find(|channel| channel.label() == label)
    }

    /// Row of the channel with the given label
    pub fn row(&self, label: &str) -> Option<usize> {
        self.channels
            .iter()
            .position(|channel| channel.label() == label)
    }

    /// Add `acquisition` to the channels with the given labels, creating the missing channels
    /// with `default_style`. Returns the rows of the new channels.
    pub fn register_acquisition_channels(
        &mut self,
        acquisition: AcquisitionKey,
        labels: &[String],
        default_style: &ChannelStyle,
    ) -> Range<usize> {
        let first_new = self.channels.len();

        for label in labels {
            match self.get_mut(label) {
                Some(channel) => {
                    if !channel.loaded_acquisitions.contains(&acquisition) {
                        channel.loaded_acquisitions.push(acquisition);
                    }
                }
                None => {
                    let mut channel = Channel::new(label, default_style.clone());
                    channel.loaded_acquisitions.push(acquisition);
                    self.channels.push(channel);
                }
            }
        }

        first_new..self.channels.len()
    }

    /// Remove `acquisition` from the channels with the given labels. The layer showing a channel
    /// for the acquisition is removed from the canvas first, and channels no longer contributed by
    /// any acquisition are dropped afterwards. Returns the row and label of every dropped channel,
    /// with rows valid at the time of removal.
    pub fn unregister_acquisition_channels(
        &mut self,
        acquisition: AcquisitionKey,
        labels: &[String],
        canvas: &mut dyn ImageCanvas,
    ) -> Vec<(usize, String)> {
        let mut removed = Vec::new();

        for label in labels {
            let row = match self.row(label) {
                Some(row) => row,
                None => continue,
            };
            let channel = &mut self.channels[row];

            if let Some(position) = channel
                .shown_layers
                .iter()
                .position(|(key, _)| *key == acquisition)
            {
                let (_, handle) = channel.shown_layers.remove(position);
                remove_layer(canvas, handle);
            }
            channel.loaded_acquisitions.retain(|key| *key != acquisition);

            if channel.loaded_acquisitions.is_empty() {
                for (_, handle) in channel.shown_layers.drain(..) {
                    remove_layer(canvas, handle);
                }

                debug!("Removing channel {}", label);
                self.channels.remove(row);
                removed.push((row, label.clone()));
            }
        }

        removed
    }

    /// Record that `handle` shows channel `label` of `acquisition`
    pub(crate) fn attach_layer(
        &mut self,
        label: &str,
        acquisition: AcquisitionKey,
        handle: LayerHandle,
    ) -> Result<()> {
        let channel = self.get_mut(label).ok_or_else(|| unknown(label))?;
        channel.shown_layers.push((acquisition, handle));

        Ok(())
    }

    pub(crate) fn set_shown(&mut self, label: &str, shown: bool) -> Result<()> {
        self.get_mut(label).ok_or_else(|| unknown(label))?.shown = shown;

        Ok(())
    }

    /// Remove every layer showing channel `label`. Returns the row of the channel.
    pub fn hide(&mut self, label: &str, canvas: &mut dyn ImageCanvas) -> Result<usize> {
        let row = self.row(label).ok_or_else(|| unknown(label))?;
        let channel = &mut self.channels[row];

        for (_, handle) in channel.shown_layers.drain(..) {
            remove_layer(canvas, handle);
        }
        channel.shown = false;

        Ok(row)
    }

    /// Store a style property of channel `label` and push it to every layer showing the channel.
    /// Returns the row of the channel.
    pub fn set_property(
        &mut self,
        label: &str,
        property: &LayerProperty,
        canvas: &mut dyn ImageCanvas,
    ) -> Result<usize> {
        let row = self.row(label).ok_or_else(|| unknown(label))?;
        let channel = &mut self.channels[row];

        channel.style.apply(property)?;

        for (_, handle) in &channel.shown_layers {
            canvas.set_layer_property(*handle, property);
        }

        Ok(row)
    }

    /// Set the opacity of channel `label`
    pub fn set_opacity(&mut self, label: &str, opacity: f32, canvas: &mut dyn ImageCanvas) -> Result<usize> {
        self.set_property(label, &LayerProperty::Opacity(opacity), canvas)
    }

    /// Set the gamma of channel `label`
    pub fn set_gamma(&mut self, label: &str, gamma: f32, canvas: &mut dyn ImageCanvas) -> Result<usize> {
        self.set_property(label, &LayerProperty::Gamma(gamma), canvas)
    }

    /// Set the colour of channel `label`
    pub fn set_color(&mut self, label: &str, color: Color, canvas: &mut dyn ImageCanvas) -> Result<usize> {
        self.set_property(label, &LayerProperty::Color(color), canvas)
    }

    /// Set the blending mode of channel `label`
    pub fn set_blending(&mut self, label: &str, blending: Blending, canvas: &mut dyn ImageCanvas) -> Result<usize> {
        self.set_property(label, &LayerProperty::Blending(blending), canvas)
    }

    /// Set the interpolation mode of channel `label`
    pub fn set_interpolation(
        &mut self,
        label: &str,
        interpolation: Interpolation,
        canvas: &mut dyn ImageCanvas,
    ) -> Result<usize> {
        self.set_property(label, &LayerProperty::Interpolation(interpolation), canvas)
    }

    /// Set the contrast limits of channel `label`
    pub fn set_contrast_limits(
        &mut self,
        label: &str,
        limits: (f32, f32),
        canvas: &mut dyn ImageCanvas,
    ) -> Result<usize> {
        self.set_property(label, &LayerProperty::ContrastLimits(limits.0, limits.1), canvas)
    }
}

fn remove_layer(canvas: &mut dyn ImageCanvas, handle: LayerHandle) {
    if !canvas.remove_image(handle) {
        warn!("{} was already removed from the canvas", handle);
    }
}

#[rustfmt::skip]
impl Print for ChannelRegistry {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        write!(writer, "{:indent$}", "", indent = indent)?;
        writeln!(writer, "{:-^1$}", "Channels", 48)?;

        writeln!(writer, "{:indent$}{: <16} | {: <5} | {: <12} | {: <7}", "", "Label", "Shown", "Acquisitions", "Opacity", indent = indent)?;

        for channel in &self.channels {
            writeln!(
                writer,
                "{:indent$}{: <16} | {: <5} | {: <12} | {: <7.2}",
                "",
                channel.label(),
                if channel.is_shown() { "yes" } else { "no" },
                channel.loaded_acquisitions().len(),
                channel.style().opacity,
                indent = indent
            )?;
        }

        Ok(())
    }
}
