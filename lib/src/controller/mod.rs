mod layers;
mod read;


use std::path::Path;

use log::{debug, info, warn};

pub use self::read::{CompletedRead, Intent, PendingRead, ReadTarget};
use self::read::FileJob;
use crate::{
    canvas::{ImageCanvas, LayerHandle, LayerProperty, LayerStyle, LayerTag, NewLayer},
    channels::ChannelRegistry,
    config::ViewerConfig,
    error::{ImcError, Result},
    events::{ModelEvent, Observers, SubscriptionId},
    format::{DecodedImage, FormatRegistry},
    model::{AcquisitionKey, FileId, FileIdentity, PanoramaKey, ShownLayer},
    registry::FileRegistry,
    tree::NodeId,
};

/// Keeps the open files, the channel registry and the layers of an [`ImageCanvas`] in sync.
///
/// Every operation leaves the registries either fully updated or untouched. Operations on
/// entities of files closed in the meantime do nothing and return `Ok`.
#[derive(Debug)]
pub struct ImcController<C: ImageCanvas> {
    canvas: C,
    config: ViewerConfig,
    formats: FormatRegistry,
    files: FileRegistry,
    channels: ChannelRegistry,
    selected_channels: Vec<String>,
    observers: Observers,
}

fn ignore_stale<T: Default>(result: Result<T>) -> Result<T> {
    match result {
        Err(error) if error.is_stale() => {
            debug!("Ignoring operation on a closed file");
            Ok(T::default())
        }
        result => result,
    }
}

impl<C: ImageCanvas> ImcController<C> {
    /// Controller rendering into `canvas`, using the default configuration
    pub fn new(canvas: C) -> Self {
        ImcController::with_config(canvas, ViewerConfig::default())
    }

    /// Controller rendering into `canvas`, with the formats enabled in `config`
    pub fn with_config(canvas: C, config: ViewerConfig) -> Self {
        let formats = FormatRegistry::from_config(&config);

        ImcController::with_formats(canvas, config, formats)
    }

    /// Controller rendering into `canvas`, reading files with `formats`
    pub fn with_formats(canvas: C, config: ViewerConfig, formats: FormatRegistry) -> Self {
        ImcController {
            canvas,
            config,
            formats,
            files: FileRegistry::new(),
            channels: ChannelRegistry::new(),
            selected_channels: Vec::new(),
            observers: Observers::new(),
        }
    }

    /// The canvas layers are rendered into
    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    /// Mutable access to the canvas, e.g. for the host to add its own layers
    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    /// Open files and the tree built from them
    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    /// Channels of the loaded acquisitions
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Configuration in use
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Call `callback` for every [`ModelEvent`]
    pub fn subscribe(&mut self, callback: Box<dyn FnMut(&ModelEvent)>) -> SubscriptionId {
        self.observers.subscribe(callback)
    }

    /// Stop notifying a subscriber
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn notify(&mut self, event: ModelEvent) {
        self.observers.notify(&event);
    }

    /// Open the file at `path`. Opening a file which is already open (under any spelling of its
    /// path) returns the ID of the open file.
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> Result<FileId> {
        let (path, identity) = FileIdentity::resolve(path.as_ref())?;

        if let Some(id) = self.files.find(&identity) {
            debug!("{:?} is already open as file {}", path, id);
            return Ok(id);
        }

        let decoded = self.formats.decode(&path)?;
        info!(
            "Opened {:?} ({} panoramas, {} acquisitions)",
            path,
            decoded.panoramas.len(),
            decoded.acquisitions.len()
        );

        let (file, row) = self.files.insert(path, identity, decoded);
        self.notify(ModelEvent::FileInserted { row, file });

        Ok(file)
    }

    /// Hide the panoramas and unload the acquisitions of a file, then close it
    pub fn close_file(&mut self, file: FileId) -> Result<()> {
        ignore_stale(self.try_close_file(file))
    }

    fn try_close_file(&mut self, id: FileId) -> Result<()> {
        let file = self.files.file(id)?;
        let shown: Vec<PanoramaKey> = file
            .panoramas()
            .iter()
            .filter(|panorama| panorama.is_shown())
            .map(|panorama| panorama.key())
            .collect();
        let loaded: Vec<AcquisitionKey> = file
            .acquisitions()
            .iter()
            .filter(|acquisition| acquisition.is_loaded())
            .map(|acquisition| acquisition.key())
            .collect();

        for key in shown {
            self.try_hide_panorama(key)?;
        }
        for key in loaded {
            self.try_unload_acquisition(key)?;
        }

        let path = self.files.file(id)?.path().to_path_buf();
        let row = self.files.remove(id)?;
        info!("Closed {:?}", path);

        self.notify(ModelEvent::FileRemoved { row, file: id });

        Ok(())
    }

    /// Show a panorama on the canvas
    pub fn show_panorama(&mut self, key: PanoramaKey) -> Result<()> {
        self.run(Intent::ShowPanorama(key))
    }

    /// Remove the layer showing a panorama
    pub fn hide_panorama(&mut self, key: PanoramaKey) -> Result<()> {
        ignore_stale(self.try_hide_panorama(key))
    }

    fn try_hide_panorama(&mut self, key: PanoramaKey) -> Result<()> {
        let hidden = self.files.panorama_mut(key)?.set_hidden();
        if let Some(layer) = hidden {
            remove_layer(&mut self.canvas, layer.handle);
            debug!("Panorama {} of file {} hidden", key.id, key.file);

            self.notify(ModelEvent::NodeChanged(NodeId::Panorama(key)));
        }

        Ok(())
    }

    /// Register the channels of an acquisition and render those that are shown
    pub fn load_acquisition(&mut self, key: AcquisitionKey) -> Result<()> {
        self.run(Intent::LoadAcquisition(key))
    }

    /// Remove the layers of an acquisition and unregister its channels
    pub fn unload_acquisition(&mut self, key: AcquisitionKey) -> Result<()> {
        ignore_stale(self.try_unload_acquisition(key))
    }

    fn try_unload_acquisition(&mut self, key: AcquisitionKey) -> Result<()> {
        let acquisition = self.files.acquisition(key)?;
        if !acquisition.is_loaded() {
            return Ok(());
        }
        let labels = acquisition.channel_labels().to_vec();

        let removed = self
            .channels
            .unregister_acquisition_channels(key, &labels, &mut self.canvas);
        self.files.acquisition_mut(key)?.set_loaded(false);
        debug!("Acquisition {} of file {} unloaded", key.id, key.file);

        let selection_before = self.selected_channels.len();
        for (row, label) in removed {
            self.selected_channels.retain(|selected| *selected != label);
            self.notify(ModelEvent::ChannelRemoved { row, label });
        }
        for label in &labels {
            if let Some(row) = self.channels.row(label) {
                self.notify(ModelEvent::ChannelChanged {
                    row,
                    label: label.clone(),
                });
            }
        }

        self.notify(ModelEvent::NodeChanged(NodeId::Acquisition(key)));
        if self.selected_channels.len() != selection_before {
            self.notify(ModelEvent::SelectionChanged);
        }

        Ok(())
    }

    /// Show a channel for every loaded acquisition
    pub fn show_channel(&mut self, label: &str) -> Result<()> {
        self.run(Intent::ShowChannel(label.to_string()))
    }

    /// Remove every layer showing a channel
    pub fn hide_channel(&mut self, label: &str) -> Result<()> {
        let row = self.channels.hide(label, &mut self.canvas)?;
        debug!("Channel {} hidden", label);

        self.notify(ModelEvent::ChannelChanged {
            row,
            label: label.to_string(),
        });

        Ok(())
    }

    /// Apply the check box of a tree row: panoramas are shown or hidden, acquisitions loaded or
    /// unloaded. Other rows are not checkable.
    pub fn toggle_checked(&mut self, node: NodeId) -> Result<()> {
        let checked = self.files.is_checked(node);

        match node {
            NodeId::Panorama(key) if checked => self.hide_panorama(key),
            NodeId::Panorama(key) => self.show_panorama(key),
            NodeId::Acquisition(key) if checked => self.unload_acquisition(key),
            NodeId::Acquisition(key) => self.load_acquisition(key),
            _ => Ok(()),
        }
    }

    /// Labels of the selected channels
    pub fn selected_channels(&self) -> &[String] {
        &self.selected_channels
    }

    /// Select channels, e.g. for editing their style together. Unknown labels are ignored.
    pub fn set_selected_channels<S: AsRef<str>>(&mut self, labels: &[S]) {
        let mut selected: Vec<String> = Vec::with_capacity(labels.len());

        for label in labels {
            let label = label.as_ref();
            if self.channels.get(label).is_none() {
                warn!("Cannot select unknown channel {}", label);
            } else if !selected.iter().any(|existing| existing == label) {
                selected.push(label.to_string());
            }
        }

        if selected != self.selected_channels {
            self.selected_channels = selected;
            self.notify(ModelEvent::SelectionChanged);
        }
    }

    /// Change a style property of a channel and of every layer showing it
    pub fn set_channel_property(&mut self, label: &str, property: LayerProperty) -> Result<()> {
        let row = self
            .channels
            .set_property(label, &property, &mut self.canvas)?;

        self.notify(ModelEvent::ChannelChanged {
            row,
            label: label.to_string(),
        });

        Ok(())
    }

    /// Move layers back into order after the host reordered them: layers added by others which
    /// were below all panoramas and acquisitions stay there, then come the panoramas, then the
    /// acquisitions, then all remaining layers. Returns the number of layers moved.
    pub fn restack(&mut self) -> usize {
        layers::restack(&mut self.canvas)
    }

    fn run(&mut self, intent: Intent) -> Result<()> {
        if let Some(pending) = self.prepare(intent)? {
            self.complete(pending.execute())?;
        }

        Ok(())
    }

    /// Plan the reads needed for `intent`. Returns `None` if there is nothing to do (e.g. the
    /// panorama is already shown or its file has been closed).
    ///
    /// The returned [`PendingRead`] may be executed on another thread; its result must be
    /// passed to [`ImcController::complete`].
    pub fn prepare(&self, intent: Intent) -> Result<Option<PendingRead>> {
        let targets = match ignore_stale(self.plan(&intent))? {
            Some(targets) => targets,
            None => return Ok(None),
        };

        let mut jobs: Vec<FileJob> = Vec::new();
        for target in targets {
            let id = target.file();

            match jobs.iter_mut().find(|job| job.file == id) {
                Some(job) => job.targets.push(target),
                None => {
                    let file = self.files.file(id)?;
                    jobs.push(FileJob {
                        file: id,
                        path: file.path().to_path_buf(),
                        format: file.format().clone(),
                        targets: vec![target],
                    });
                }
            }
        }

        Ok(Some(PendingRead { intent, jobs }))
    }

    /// Commit the result of a read. If the state changed since the read was prepared (the file
    /// was closed, the panorama shown by someone else, a channel loaded in the meantime, ...) the
    /// result is discarded and `false` returned. Read errors leave everything unchanged.
    pub fn complete(&mut self, completed: CompletedRead) -> Result<bool> {
        let CompletedRead {
            intent,
            planned,
            result,
        } = completed;

        match self.plan(&intent) {
            Ok(Some(targets)) if targets == planned => {}
            Ok(_) | Err(_) => {
                warn!("Discarding read for {:?}: state changed in the meantime", intent);
                return Ok(false);
            }
        }

        let images = result?;
        self.commit(intent, images)?;

        Ok(true)
    }

    fn plan(&self, intent: &Intent) -> Result<Option<Vec<ReadTarget>>> {
        match intent {
            Intent::ShowPanorama(key) => {
                if self.files.panorama(*key)?.is_shown() {
                    return Ok(None);
                }

                Ok(Some(vec![ReadTarget::Panorama(*key)]))
            }
            Intent::LoadAcquisition(key) => {
                let acquisition = self.files.acquisition(*key)?;
                if acquisition.is_loaded() {
                    return Ok(None);
                }

                Ok(Some(
                    acquisition
                        .channel_labels()
                        .iter()
                        .filter(|label| {
                            self.channels
                                .get(label)
                                .map(|channel| channel.is_shown())
                                .unwrap_or(false)
                        })
                        .map(|label| ReadTarget::AcquisitionChannel {
                            acquisition: *key,
                            label: label.clone(),
                        })
                        .collect(),
                ))
            }
            Intent::ShowChannel(label) => {
                let channel = self
                    .channels
                    .get(label)
                    .ok_or_else(|| ImcError::UnknownEntity(format!("channel {}", label)))?;
                if channel.is_shown() {
                    return Ok(None);
                }

                Ok(Some(
                    channel
                        .loaded_acquisitions()
                        .iter()
                        .map(|acquisition| ReadTarget::AcquisitionChannel {
                            acquisition: *acquisition,
                            label: label.clone(),
                        })
                        .collect(),
                ))
            }
        }
    }

    fn commit(&mut self, intent: Intent, images: Vec<(ReadTarget, DecodedImage)>) -> Result<()> {
        match intent {
            Intent::ShowPanorama(key) => {
                for (_, image) in images {
                    self.add_panorama_layer(key, image)?;
                }

                self.notify(ModelEvent::NodeChanged(NodeId::Panorama(key)));
            }
            Intent::LoadAcquisition(key) => {
                let labels = self.files.acquisition(key)?.channel_labels().to_vec();

                let created = self.channels.register_acquisition_channels(
                    key,
                    &labels,
                    &self.config.default_style,
                );
                self.files.acquisition_mut(key)?.set_loaded(true);
                debug!("Acquisition {} of file {} loaded", key.id, key.file);

                if !created.is_empty() {
                    self.notify(ModelEvent::ChannelsInserted {
                        first_row: created.start,
                        count: created.len(),
                    });
                }

                for (target, image) in images {
                    if let ReadTarget::AcquisitionChannel { acquisition, label } = target {
                        self.add_channel_layer(acquisition, &label, image)?;
                        self.notify_channel_changed(&label);
                    }
                }

                self.notify(ModelEvent::NodeChanged(NodeId::Acquisition(key)));
            }
            Intent::ShowChannel(label) => {
                for (target, image) in images {
                    if let ReadTarget::AcquisitionChannel { acquisition, .. } = target {
                        self.add_channel_layer(acquisition, &label, image)?;
                    }
                }

                self.channels.set_shown(&label, true)?;
                debug!("Channel {} shown", label);

                self.notify_channel_changed(&label);
            }
        }

        Ok(())
    }

    fn notify_channel_changed(&mut self, label: &str) {
        if let Some(row) = self.channels.row(label) {
            self.notify(ModelEvent::ChannelChanged {
                row,
                label: label.to_string(),
            });
        }
    }

    fn add_panorama_layer(&mut self, key: PanoramaKey, image: DecodedImage) -> Result<()> {
        let name = format!("{} [P{:02}]", self.files.file(key.file)?.name(), key.id);
        let z_index = layers::next_panorama_index(&self.canvas.layer_tags());
        debug!("Showing {} at z-index {}", name, z_index);

        let handle = self.canvas.add_image(
            NewLayer {
                name,
                tag: LayerTag::Panorama,
                pixels: image.pixels,
                placement: image.placement,
                style: LayerStyle::panorama(self.config.panorama_opacity),
            },
            z_index,
        );

        self.files.panorama_mut(key)?.set_shown(ShownLayer {
            handle,
            placement: image.placement,
        });

        Ok(())
    }

    fn add_channel_layer(
        &mut self,
        acquisition: AcquisitionKey,
        label: &str,
        image: DecodedImage,
    ) -> Result<()> {
        let name = format!(
            "{} [A{:02} {}]",
            self.files.file(acquisition.file)?.name(),
            acquisition.id,
            label
        );

        let max = image.pixels.max_intensity();
        let channel = self
            .channels
            .get_mut(label)
            .ok_or_else(|| ImcError::UnknownEntity(format!("channel {}", label)))?;
        channel.establish_contrast_limits((0.0, max));
        let style = LayerStyle::channel(channel.style(), (0.0, max));

        let z_index = layers::next_acquisition_index(&self.canvas.layer_tags());
        debug!("Showing {} at z-index {}", name, z_index);

        let handle = self.canvas.add_image(
            NewLayer {
                name,
                tag: LayerTag::Acquisition,
                pixels: image.pixels,
                placement: image.placement,
                style,
            },
            z_index,
        );

        self.channels.attach_layer(label, acquisition, handle)
    }
}

fn remove_layer<C: ImageCanvas>(canvas: &mut C, handle: LayerHandle) {
    if !canvas.remove_image(handle) {
        warn!("{} was already removed from the canvas", handle);
    }
}
