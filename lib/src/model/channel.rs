use serde::{Deserialize, Serialize};

use crate::{
    canvas::{LayerHandle, LayerProperty},
    error::{ImcError, Result},
};

use super::AcquisitionKey;

/// RGBA colour, each component in [0, 1]
pub type Color = [f32; 4];

/// How a layer is composited with the layers below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Blending {
    /// Alpha blending, respecting depth
    Translucent,
    /// Alpha blending, ignoring depth
    TranslucentNoDepth,
    /// Intensities are added
    Additive,
    /// Covers everything below
    Opaque,
}

/// How a layer is resampled when zoomed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Nearest neighbour
    Nearest,
    /// Bilinear
    Bilinear,
    /// Bicubic
    Bicubic,
    /// Gaussian
    Gaussian,
    /// Lanczos
    Lanczos,
    /// Spline (36)
    Spline36,
}

/// Style shared by every layer rendering a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelStyle {
    /// Opacity in [0, 1]
    pub opacity: f32,
    /// Gamma correction, > 0
    pub gamma: f32,
    /// Colour assigned to the maximum intensity
    pub color: Color,
    /// Compositing mode
    pub blending: Blending,
    /// Resampling mode
    pub interpolation: Interpolation,
    /// Intensities mapped to the ends of the colour map. Established from the data when the
    /// channel is first shown.
    pub contrast_limits: Option<(f32, f32)>,
}

impl Default for ChannelStyle {
    fn default() -> Self {
        ChannelStyle {
            opacity: 1.0,
            gamma: 1.0,
            color: [1.0, 1.0, 1.0, 1.0],
            blending: Blending::Additive,
            interpolation: Interpolation::Nearest,
            contrast_limits: None,
        }
    }
}

fn invalid(property: &'static str, reason: impl Into<String>) -> ImcError {
    ImcError::InvalidProperty {
        property,
        reason: reason.into(),
    }
}

impl ChannelStyle {
    /// Check that `property` carries a valid value
    pub fn validate(property: &LayerProperty) -> Result<()> {
        match *property {
            LayerProperty::Opacity(opacity) if !(0.0..=1.0).contains(&opacity) => {
                Err(invalid("opacity", format!("{} is outside [0, 1]", opacity)))
            }
            LayerProperty::Gamma(gamma) if !(gamma.is_finite() && gamma > 0.0) => {
                Err(invalid("gamma", format!("{} is not positive", gamma)))
            }
            LayerProperty::Color(color)
                if color.iter().any(|component| !(0.0..=1.0).contains(component)) =>
            {
                Err(invalid("color", format!("{:?} has components outside [0, 1]", color)))
            }
            LayerProperty::ContrastLimits(low, high) if !(low.is_finite() && high.is_finite()) || low > high => {
                Err(invalid("contrast_limits", format!("({}, {}) is not a valid range", low, high)))
            }
            _ => Ok(()),
        }
    }

    /// Store the value of `property`
    pub fn apply(&mut self, property: &LayerProperty) -> Result<()> {
        ChannelStyle::validate(property)?;

        match *property {
            LayerProperty::Opacity(opacity) => self.opacity = opacity,
            LayerProperty::Gamma(gamma) => self.gamma = gamma,
            LayerProperty::Color(color) => self.color = color,
            LayerProperty::Blending(blending) => self.blending = blending,
            LayerProperty::Interpolation(interpolation) => self.interpolation = interpolation,
            LayerProperty::ContrastLimits(low, high) => self.contrast_limits = Some((low, high)),
        }

        Ok(())
    }

    /// Clamp values loaded from configuration into their valid ranges
    pub fn sanitize(mut self) -> Self {
        let default = ChannelStyle::default();

        self.opacity = if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            default.opacity
        };
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            self.gamma = default.gamma;
        }
        for component in self.color.iter_mut() {
            *component = if component.is_finite() {
                component.clamp(0.0, 1.0)
            } else {
                1.0
            };
        }
        if let Some(limits) = self.contrast_limits {
            if ChannelStyle::validate(&LayerProperty::ContrastLimits(limits.0, limits.1)).is_err() {
                self.contrast_limits = None;
            }
        }

        self
    }
}

/// Channel (by label) across all loaded acquisitions
#[derive(Debug, Clone)]
pub struct Channel {
    label: String,
    pub(crate) style: ChannelStyle,
    pub(crate) loaded_acquisitions: Vec<AcquisitionKey>,
    pub(crate) shown_layers: Vec<(AcquisitionKey, LayerHandle)>,
    pub(crate) shown: bool,
}

impl Channel {
    pub(crate) fn new(label: &str, style: ChannelStyle) -> Self {
        Channel {
            label: label.to_string(),
            style,
            loaded_acquisitions: Vec::new(),
            shown_layers: Vec::new(),
            shown: false,
        }
    }

    /// Label shared by all acquisitions contributing to the channel
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current style
    pub fn style(&self) -> &ChannelStyle {
        &self.style
    }

    /// Loaded acquisitions contributing to the channel, in load order
    pub fn loaded_acquisitions(&self) -> &[AcquisitionKey] {
        &self.loaded_acquisitions
    }

    /// True while the channel is shown for every loaded acquisition
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    /// Layer rendering the channel for each acquisition
    pub fn shown_layers(&self) -> &[(AcquisitionKey, LayerHandle)] {
        &self.shown_layers
    }

    /// Layer rendering the channel for `acquisition`
    pub fn layer_for(&self, acquisition: AcquisitionKey) -> Option<LayerHandle> {
        self.shown_layers
            .iter()
            .find(|(key, _)| *key == acquisition)
            .map(|(_, handle)| *handle)
    }

    /// Set the contrast limits if they have not been established yet, returning the limits in use
    pub(crate) fn establish_contrast_limits(&mut self, limits: (f32, f32)) -> (f32, f32) {
        *self.style.contrast_limits.get_or_insert(limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_validates() {
        let mut style = ChannelStyle::default();

        style.apply(&LayerProperty::Opacity(0.3)).unwrap();
        assert_eq!(style.opacity, 0.3);

        assert!(style.apply(&LayerProperty::Opacity(1.5)).is_err());
        assert!(style.apply(&LayerProperty::Gamma(0.0)).is_err());
        assert!(style
            .apply(&LayerProperty::ContrastLimits(10.0, 1.0))
            .is_err());
        assert_eq!(style.opacity, 0.3);
        assert_eq!(style.gamma, 1.0);

        style
            .apply(&LayerProperty::Blending(Blending::Translucent))
            .unwrap();
        assert_eq!(style.blending, Blending::Translucent);
    }

    #[test]
    fn sanitize_clamps() {
        let style = ChannelStyle {
            opacity: 3.0,
            gamma: -1.0,
            color: [2.0, 0.5, -1.0, 1.0],
            contrast_limits: Some((5.0, 1.0)),
            ..Default::default()
        }
        .sanitize();

        assert_eq!(style.opacity, 1.0);
        assert_eq!(style.gamma, 1.0);
        assert_eq!(style.color, [1.0, 0.5, 0.0, 1.0]);
        assert_eq!(style.contrast_limits, None);
    }

    #[test]
    fn contrast_limits_established_once() {
        let mut channel = Channel::new("DNA1", ChannelStyle::default());

        assert_eq!(channel.establish_contrast_limits((0.0, 50.0)), (0.0, 50.0));
        assert_eq!(channel.establish_contrast_limits((0.0, 80.0)), (0.0, 50.0));
    }

    #[test]
    fn style_from_json() {
        let style: ChannelStyle =
            serde_json::from_str(r#"{"opacity": 0.5, "blending": "translucent_no_depth"}"#)
                .unwrap();

        assert_eq!(style.opacity, 0.5);
        assert_eq!(style.blending, Blending::TranslucentNoDepth);
        assert_eq!(style.interpolation, Interpolation::Nearest);
    }
}
