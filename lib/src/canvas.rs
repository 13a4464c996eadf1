use std::fmt;

use log::{debug, warn};

use crate::{
    format::Pixels,
    model::{Blending, ChannelStyle, Color, Interpolation},
    placement::Placement,
    Print,
};

/// Opaque handle of a layer on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerHandle(u64);

impl LayerHandle {
    /// Wrap the canvas' own identifier
    pub fn new(raw: u64) -> Self {
        LayerHandle(raw)
    }

    /// The canvas' own identifier
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "layer {}", self.0)
    }
}

/// Marks the layers added by the controller, so the z-order can be kept among layers added by
/// others
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerTag {
    /// Layer showing a panorama
    Panorama,
    /// Layer showing one channel of an acquisition
    Acquisition,
}

/// Single style property of a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerProperty {
    /// Opacity in [0, 1]
    Opacity(f32),
    /// Gamma correction
    Gamma(f32),
    /// Colour assigned to the maximum intensity (the colour map runs from transparent black)
    Color(Color),
    /// Compositing mode
    Blending(Blending),
    /// Resampling mode
    Interpolation(Interpolation),
    /// Intensities mapped to the ends of the colour map
    ContrastLimits(f32, f32),
}

impl LayerProperty {
    /// Name of the property, as used by viewers
    pub fn name(&self) -> &'static str {
        match self {
            LayerProperty::Opacity(_) => "opacity",
            LayerProperty::Gamma(_) => "gamma",
            LayerProperty::Color(_) => "colormap",
            LayerProperty::Blending(_) => "blending",
            LayerProperty::Interpolation(_) => "interpolation",
            LayerProperty::ContrastLimits(..) => "contrast_limits",
        }
    }
}

/// Complete style of a new layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStyle {
    /// Opacity in [0, 1]
    pub opacity: f32,
    /// Gamma correction
    pub gamma: f32,
    /// Colour map end point; `None` keeps the colours of an RGBA image
    pub color: Option<Color>,
    /// Compositing mode
    pub blending: Blending,
    /// Resampling mode
    pub interpolation: Interpolation,
    /// Intensities mapped to the ends of the colour map
    pub contrast_limits: Option<(f32, f32)>,
    /// Range the contrast limits can be chosen from
    pub contrast_limits_range: Option<(f32, f32)>,
}

impl LayerStyle {
    /// Style of a panorama overlay
    pub fn panorama(opacity: f32) -> Self {
        LayerStyle {
            opacity,
            gamma: 1.0,
            color: None,
            blending: Blending::Translucent,
            interpolation: Interpolation::Nearest,
            contrast_limits: None,
            contrast_limits_range: None,
        }
    }

    /// Style of a channel layer whose data lies within `range`
    pub fn channel(style: &ChannelStyle, range: (f32, f32)) -> Self {
        LayerStyle {
            opacity: style.opacity,
            gamma: style.gamma,
            color: Some(style.color),
            blending: style.blending,
            interpolation: style.interpolation,
            contrast_limits: style.contrast_limits,
            contrast_limits_range: Some(range),
        }
    }

    /// Store the value of `property`
    pub fn apply(&mut self, property: &LayerProperty) {
        match *property {
            LayerProperty::Opacity(opacity) => self.opacity = opacity,
            LayerProperty::Gamma(gamma) => self.gamma = gamma,
            LayerProperty::Color(color) => self.color = Some(color),
            LayerProperty::Blending(blending) => self.blending = blending,
            LayerProperty::Interpolation(interpolation) => self.interpolation = interpolation,
            LayerProperty::ContrastLimits(low, high) => self.contrast_limits = Some((low, high)),
        }
    }
}

/// Everything needed to add an image layer
#[derive(Debug, Clone, PartialEq)]
pub struct NewLayer {
    /// Display name
    pub name: String,
    /// What the layer shows
    pub tag: LayerTag,
    /// Oriented pixel data
    pub pixels: Pixels,
    /// Physical placement
    pub placement: Placement,
    /// Initial style
    pub style: LayerStyle,
}

/// The image viewer the controller renders into. Z-indices count from the bottom of the layer
/// list (0) to its top (`layers().len()`).
pub trait ImageCanvas {
    /// Insert a new image layer at `z_index`
    fn add_image(&mut self, layer: NewLayer, z_index: usize) -> LayerHandle;

    /// Remove a layer. Returns false if it was already gone.
    fn remove_image(&mut self, handle: LayerHandle) -> bool;

    /// Move a layer to `z_index`
    fn move_image(&mut self, handle: LayerHandle, z_index: usize);

    /// Update a single style property of a layer
    fn set_layer_property(&mut self, handle: LayerHandle, property: &LayerProperty);

    /// All layers from bottom to top, with the tag they were added with (`None` for layers added
    /// by anyone else)
    fn layer_tags(&self) -> Vec<(LayerHandle, Option<LayerTag>)>;
}

/// Layer held by a [`LayerStack`]
#[derive(Debug, Clone, PartialEq)]
pub struct StackedLayer {
    /// Handle of the layer
    pub handle: LayerHandle,
    /// Display name
    pub name: String,
    /// Tag given when the layer was added
    pub tag: Option<LayerTag>,
    /// Pixel data, absent for layers added by others
    pub pixels: Option<Pixels>,
    /// Physical placement
    pub placement: Option<Placement>,
    /// Current style
    pub style: Option<LayerStyle>,
}

/// Headless canvas keeping layers in a list
#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    layers: Vec<StackedLayer>,
    next_handle: u64,
}

impl LayerStack {
    /// Empty stack
    pub fn new() -> Self {
        LayerStack::default()
    }

    fn next_handle(&mut self) -> LayerHandle {
        self.next_handle += 1;
        LayerHandle(self.next_handle)
    }

    /// Layers from bottom to top
    pub fn layers(&self) -> &[StackedLayer] {
        &self.layers
    }

    /// Layer names from bottom to top
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name.as_str()).collect()
    }

    /// Returns the layer with the given handle
    pub fn layer(&self, handle: LayerHandle) -> Option<&StackedLayer> {
        self.layers.iter().find(|layer| layer.handle == handle)
    }

    fn position(&self, handle: LayerHandle) -> Option<usize> {
        self.layers.iter().position(|layer| layer.handle == handle)
    }

    /// Add a layer the controller knows nothing about (e.g. annotations drawn by the user)
    pub fn push_foreign(&mut self, name: &str) -> LayerHandle {
        let handle = self.next_handle();
        self.layers.push(StackedLayer {
            handle,
            name: name.to_string(),
            tag: None,
            pixels: None,
            placement: None,
            style: None,
        });

        handle
    }
}

impl ImageCanvas for LayerStack {
    fn add_image(&mut self, layer: NewLayer, z_index: usize) -> LayerHandle {
        let handle = self.next_handle();
        let z_index = z_index.min(self.layers.len());

        debug!("Adding {} ({}) at z-index {}", layer.name, handle, z_index);

        self.layers.insert(
            z_index,
            StackedLayer {
                handle,
                name: layer.name,
                tag: Some(layer.tag),
                pixels: Some(layer.pixels),
                placement: Some(layer.placement),
                style: Some(layer.style),
            },
        );

        handle
    }

    fn remove_image(&mut self, handle: LayerHandle) -> bool {
        match self.position(handle) {
            Some(position) => {
                self.layers.remove(position);
                true
            }
            None => false,
        }
    }

    fn move_image(&mut self, handle: LayerHandle, z_index: usize) {
        match self.position(handle) {
            Some(position) => {
                let layer = self.layers.remove(position);
                let z_index = z_index.min(self.layers.len());
                self.layers.insert(z_index, layer);
            }
            None => warn!("Cannot move {}: not on the canvas", handle),
        }
    }

    fn set_layer_property(&mut self, handle: LayerHandle, property: &LayerProperty) {
        match self
            .layers
            .iter_mut()
            .find(|layer| layer.handle == handle)
            .and_then(|layer| layer.style.as_mut())
        {
            Some(style) => style.apply(property),
            None => warn!("Cannot set {} of {}", property.name(), handle),
        }
    }

    fn layer_tags(&self) -> Vec<(LayerHandle, Option<LayerTag>)> {
        self.layers
            .iter()
            .map(|layer| (layer.handle, layer.tag))
            .collect()
    }
}

#[rustfmt::skip]
impl Print for LayerStack {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        write!(writer, "{:indent$}", "", indent = indent)?;
        writeln!(writer, "{:-^1$}", "Layers (top first)", 48)?;

        for layer in self.layers.iter().rev() {
            let tag = match layer.tag {
                Some(LayerTag::Panorama) => "panorama",
                Some(LayerTag::Acquisition) => "acquisition",
                None => "-",
            };
            let (rows, columns) = layer.pixels.as_ref().map(Pixels::dimensions).unwrap_or((0, 0));

            writeln!(writer, "{:indent$}{: <32} | {: <11} | {} x {}", "", layer.name, tag, columns, rows, indent = indent)?;

            if let Some(placement) = &layer.placement {
                writeln!(
                    writer,
                    "{:indent$}{: <32} | ({:.1}, {:.1}) {:.1} μm x {:.1} μm",
                    "", "", placement.x, placement.y, placement.width, placement.height,
                    indent = indent
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn layer(name: &str, tag: LayerTag) -> NewLayer {
        NewLayer {
            name: name.to_string(),
            tag,
            pixels: Pixels::Intensity(Array2::zeros((2, 3))),
            placement: Placement::new(0.0, 0.0, 3.0, 2.0),
            style: LayerStyle::channel(&ChannelStyle::default(), (0.0, 1.0)),
        }
    }

    #[test]
    fn insert_move_and_remove() {
        let mut stack = LayerStack::new();
        let foreign = stack.push_foreign("Shapes");

        let a = stack.add_image(layer("A", LayerTag::Acquisition), 1);
        let p = stack.add_image(layer("P", LayerTag::Panorama), 0);
        assert_eq!(stack.names(), vec!["P", "Shapes", "A"]);

        stack.move_image(foreign, 0);
        assert_eq!(stack.names(), vec!["Shapes", "P", "A"]);

        assert!(stack.remove_image(p));
        assert!(!stack.remove_image(p));
        assert_eq!(
            stack.layer_tags(),
            vec![(foreign, None), (a, Some(LayerTag::Acquisition))]
        );
    }

    #[test]
    fn property_updates() {
        let mut stack = LayerStack::new();
        let handle = stack.add_image(layer("A", LayerTag::Acquisition), 0);

        stack.set_layer_property(handle, &LayerProperty::Opacity(0.25));
        stack.set_layer_property(handle, &LayerProperty::ContrastLimits(1.0, 5.0));

        let style = stack.layer(handle).unwrap().style.as_ref().unwrap();
        assert_eq!(style.opacity, 0.25);
        assert_eq!(style.contrast_limits, Some((1.0, 5.0)));
    }

    #[test]
    fn print_stack() {
        let mut stack = LayerStack::new();
        stack.add_image(layer("slide.mcd [A01 DNA1]", LayerTag::Acquisition), 0);

        let mut output = String::new();
        stack.print(&mut output, 0).unwrap();

        assert!(output.contains("slide.mcd [A01 DNA1]"));
        assert!(output.contains("acquisition"));
    }
}
