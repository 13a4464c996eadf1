use crate::canvas::{ImageCanvas, LayerHandle, LayerTag};

type Tagged = (LayerHandle, Option<LayerTag>);

fn is(tag: LayerTag) -> impl Fn(&Tagged) -> bool {
    move |(_, layer_tag): &Tagged| *layer_tag == Some(tag)
}

/// Z-index for a new panorama layer: above the topmost panorama, else below the bottommost
/// acquisition, else on top of everything
pub(super) fn next_panorama_index(layers: &[Tagged]) -> usize {
    if let Some(topmost) = layers.iter().rposition(is(LayerTag::Panorama)) {
        return topmost + 1;
    }

    layers
        .iter()
        .position(is(LayerTag::Acquisition))
        .unwrap_or(layers.len())
}

/// Z-index for a new acquisition layer: above the topmost acquisition, else on top of everything
pub(super) fn next_acquisition_index(layers: &[Tagged]) -> usize {
    layers
        .iter()
        .rposition(is(LayerTag::Acquisition))
        .map(|topmost| topmost + 1)
        .unwrap_or(layers.len())
}

/// Bottom to top order which keeps panoramas contiguous and directly below the acquisitions.
///
/// Untagged layers below the first tagged layer stay at the bottom, every other untagged layer
/// ends up above the acquisitions. Layers keep their relative order within each group.
pub(super) fn stacking_order(layers: &[Tagged]) -> Vec<LayerHandle> {
    let first_tagged = layers
        .iter()
        .position(|(_, tag)| tag.is_some())
        .unwrap_or(layers.len());

    let below = layers[..first_tagged].iter();
    let panoramas = layers
        .iter()
        .filter(|(_, tag)| *tag == Some(LayerTag::Panorama));
    let acquisitions = layers
        .iter()
        .filter(|(_, tag)| *tag == Some(LayerTag::Acquisition));
    let above = layers[first_tagged..].iter().filter(|(_, tag)| tag.is_none());

    below
        .chain(panoramas)
        .chain(acquisitions)
        .chain(above)
        .map(|(handle, _)| *handle)
        .collect()
}

/// Move layers on `canvas` until they are in stacking order. Returns the number of moves.
pub(super) fn restack(canvas: &mut dyn ImageCanvas) -> usize {
    let layers = canvas.layer_tags();
    let order = stacking_order(&layers);

    let mut current: Vec<LayerHandle> = layers.iter().map(|(handle, _)| *handle).collect();
    let mut moves = 0;

    for (z_index, handle) in order.into_iter().enumerate() {
        if current[z_index] == handle {
            continue;
        }

        if let Some(position) = current.iter().position(|layer| *layer == handle) {
            current.remove(position);
            current.insert(z_index, handle);
            canvas.move_image(handle, z_index);
            moves += 1;
        }
    }

    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        canvas::{LayerStack, LayerStyle, NewLayer},
        format::Pixels,
        placement::Placement,
    };

    const P: Option<LayerTag> = Some(LayerTag::Panorama);
    const A: Option<LayerTag> = Some(LayerTag::Acquisition);

    fn tagged(tags: &[Option<LayerTag>]) -> Vec<Tagged> {
        tags.iter()
            .enumerate()
            .map(|(index, tag)| (LayerHandle::new(index as u64), *tag))
            .collect()
    }

    fn new_layer(name: &str, tag: LayerTag) -> NewLayer {
        NewLayer {
            name: name.to_string(),
            tag,
            pixels: Pixels::Intensity(ndarray::Array2::zeros((1, 1))),
            placement: Placement::new(0.0, 0.0, 1.0, 1.0),
            style: LayerStyle::panorama(0.5),
        }
    }

    fn raw(order: Vec<LayerHandle>) -> Vec<u64> {
        order.into_iter().map(|handle| handle.raw()).collect()
    }

    #[test]
    fn panorama_index() {
        assert_eq!(next_panorama_index(&tagged(&[])), 0);
        assert_eq!(next_panorama_index(&tagged(&[None, None])), 2);
        assert_eq!(next_panorama_index(&tagged(&[None, A, A])), 1);
        assert_eq!(next_panorama_index(&tagged(&[P, A, None, P, A])), 4);
    }

    #[test]
    fn acquisition_index() {
        assert_eq!(next_acquisition_index(&tagged(&[None, P])), 2);
        assert_eq!(next_acquisition_index(&tagged(&[P, A, None])), 2);
        assert_eq!(next_acquisition_index(&tagged(&[A, A, P])), 2);
    }

    #[test]
    fn order_groups_layers() {
        let layers = tagged(&[None, A, P, None, A, P]);

        assert_eq!(raw(stacking_order(&layers)), vec![0, 2, 5, 1, 4, 3]);
    }

    #[test]
    fn restack_moves_layers() {
        let mut stack = LayerStack::new();
        let shapes = stack.push_foreign("Shapes");
        let acquisition = stack.add_image(new_layer("A", LayerTag::Acquisition), 1);
        let panorama = stack.add_image(new_layer("P", LayerTag::Panorama), 2);
        let points = stack.push_foreign("Points");

        // The host dropped the panorama on top of the acquisition
        assert_eq!(stack.names(), vec!["Shapes", "A", "P", "Points"]);
        assert_eq!(restack(&mut stack), 1);
        assert_eq!(stack.names(), vec!["Shapes", "P", "A", "Points"]);

        assert_eq!(restack(&mut stack), 0);
        assert_eq!(
            stack.layer_tags(),
            vec![(shapes, None), (panorama, P), (acquisition, A), (points, None)]
        );
    }
}
