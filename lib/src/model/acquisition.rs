use crate::format::AcquisitionInfo;

use super::FileId;

/// Addresses an acquisition of an opened file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AcquisitionKey {
    /// The file containing the acquisition
    pub file: FileId,
    /// Acquisition ID within the file
    pub id: u16,
}

impl AcquisitionKey {
    /// Key for acquisition `id` of `file`
    pub fn new(file: FileId, id: u16) -> Self {
        AcquisitionKey { file, id }
    }
}

/// Acquisition of an opened file
#[derive(Debug, Clone)]
pub struct FileAcquisition {
    key: AcquisitionKey,
    description: String,
    channel_labels: Vec<String>,
    loaded: bool,
}

impl FileAcquisition {
    pub(crate) fn new(key: AcquisitionKey, info: AcquisitionInfo) -> Self {
        FileAcquisition {
            key,
            description: info.description,
            channel_labels: info.channel_labels,
            loaded: false,
        }
    }

    /// Key addressing the acquisition
    pub fn key(&self) -> AcquisitionKey {
        self.key
    }

    /// Description given to the acquisition
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Labels of the channels recorded in the acquisition
    pub fn channel_labels(&self) -> &[String] {
        &self.channel_labels
    }

    /// True while the channels of the acquisition are registered
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Channels this acquisition currently contributes to the channel registry
    pub fn loaded_channels(&self) -> &[String] {
        if self.loaded {
            &self.channel_labels
        } else {
            &[]
        }
    }

    pub(crate) fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }
}
