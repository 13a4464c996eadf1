use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::format::{DecodedFile, FileFormat};

use super::{AcquisitionKey, FileAcquisition, FilePanorama, PanoramaKey};

/// Index of an opened file. Stays valid (but refers to a closed file) after the file is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub(crate) usize);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a file on disk, independent of how its path was spelled
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileIdentity {
    /// Device and inode number
    #[cfg(unix)]
    Inode {
        /// Device ID
        device: u64,
        /// Inode number
        inode: u64,
    },
    /// Canonical path, where inodes are not available
    Path(PathBuf),
}

impl FileIdentity {
    /// Resolve `path` to its canonical form and identity
    pub fn resolve(path: &Path) -> io::Result<(PathBuf, FileIdentity)> {
        let canonical = path.canonicalize()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            let metadata = std::fs::metadata(&canonical)?;
            let identity = FileIdentity::Inode {
                device: metadata.dev(),
                inode: metadata.ino(),
            };

            Ok((canonical, identity))
        }

        #[cfg(not(unix))]
        {
            Ok((canonical.clone(), FileIdentity::Path(canonical)))
        }
    }
}

/// An opened file and the panoramas and acquisitions listed from it
#[derive(Debug)]
pub struct ImcFile {
    id: FileId,
    path: PathBuf,
    identity: FileIdentity,
    format: Arc<dyn FileFormat>,
    panoramas: Vec<FilePanorama>,
    acquisitions: Vec<FileAcquisition>,
    deleted: bool,
}

impl ImcFile {
    pub(crate) fn new(id: FileId, path: PathBuf, identity: FileIdentity, decoded: DecodedFile) -> Self {
        let panoramas = decoded
            .panoramas
            .into_iter()
            .map(|info| FilePanorama::new(PanoramaKey::new(id, info.id), info))
            .collect();
        let acquisitions = decoded
            .acquisitions
            .into_iter()
            .map(|info| FileAcquisition::new(AcquisitionKey::new(id, info.id), info))
            .collect();

        ImcFile {
            id,
            path,
            identity,
            format: decoded.format,
            panoramas,
            acquisitions,
            deleted: false,
        }
    }

    /// Returns the ID of the file
    pub fn id(&self) -> FileId {
        self.id
    }

    /// Canonical path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name, used in tree rows and layer names
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Identity of the file on disk
    pub fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    /// Format which reads the file
    pub fn format(&self) -> &Arc<dyn FileFormat> {
        &self.format
    }

    /// Panoramas in file order
    pub fn panoramas(&self) -> &[FilePanorama] {
        &self.panoramas
    }

    /// Acquisitions in file order
    pub fn acquisitions(&self) -> &[FileAcquisition] {
        &self.acquisitions
    }

    /// Returns the panorama with the given ID
    pub fn panorama(&self, id: u16) -> Option<&FilePanorama> {
        self.panoramas.iter().find(|panorama| panorama.key().id == id)
    }

    pub(crate) fn panorama_mut(&mut self, id: u16) -> Option<&mut FilePanorama> {
        self.panoramas
            .iter_mut()
            .find(|panorama| panorama.key().id == id)
    }

    /// Returns the acquisition with the given ID
    pub fn acquisition(&self, id: u16) -> Option<&FileAcquisition> {
        self.acquisitions
            .iter()
            .find(|acquisition| acquisition.key().id == id)
    }

    pub(crate) fn acquisition_mut(&mut self, id: u16) -> Option<&mut FileAcquisition> {
        self.acquisitions
            .iter_mut()
            .find(|acquisition| acquisition.key().id == id)
    }

    /// True once the file has been closed
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}
