use std::{fmt, path::PathBuf};

use crate::{
    error::{ImcError, Result},
    format::DecodedFile,
    model::{
        AcquisitionKey, FileAcquisition, FileId, FileIdentity, FilePanorama, ImcFile, PanoramaKey,
    },
    tree::{GroupNode, NodeId, TreeField, TreeItem},
    Print,
};

/// Opened files and the tree built from them.
///
/// Files are kept in an arena indexed by [`FileId`]. Closing a file leaves a tombstone in the
/// arena, so ids handed out before stay valid and resolve to an empty node.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: Vec<ImcFile>,
    open: Vec<FileId>,
}

impl FileRegistry {
    /// No open files
    pub fn new() -> Self {
        FileRegistry::default()
    }

    /// Open files, in row order
    pub fn files(&self) -> impl Iterator<Item = &ImcFile> + '_ {
        self.open.iter().filter_map(move |id| self.files.get(id.0))
    }

    /// Number of open files
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// True if no file is open
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Returns the open file with the given ID
    pub fn file(&self, id: FileId) -> Result<&ImcFile> {
        match self.files.get(id.0) {
            Some(file) if file.is_deleted() => Err(ImcError::StaleReference),
            Some(file) => Ok(file),
            None => Err(ImcError::UnknownEntity(format!("file {}", id))),
        }
    }

    pub(crate) fn file_mut(&mut self, id: FileId) -> Result<&mut ImcFile> {
        match self.files.get_mut(id.0) {
            Some(file) if file.is_deleted() => Err(ImcError::StaleReference),
            Some(file) => Ok(file),
            None => Err(ImcError::UnknownEntity(format!("file {}", id))),
        }
    }

    /// Row of an open file below the tree root
    pub fn row(&self, id: FileId) -> Option<usize> {
        self.open.iter().position(|open| *open == id)
    }

    /// Open file with the given identity
    pub fn find(&self, identity: &FileIdentity) -> Option<FileId> {
        self.files()
            .find(|file| file.identity() == identity)
            .map(|file| file.id())
    }

    /// Append a decoded file. Returns its ID and row.
    pub(crate) fn insert(
        &mut self,
        path: PathBuf,
        identity: FileIdentity,
        decoded: DecodedFile,
    ) -> (FileId, usize) {
        let id = FileId(self.files.len());
        self.files.push(ImcFile::new(id, path, identity, decoded));
        self.open.push(id);

        (id, self.open.len() - 1)
    }

    /// Tombstone a file and remove it from the open files. Returns the row it occupied.
    pub(crate) fn remove(&mut self, id: FileId) -> Result<usize> {
        let row = self.row(id).ok_or(ImcError::StaleReference)?;

        self.file_mut(id)?.mark_deleted();
        self.open.remove(row);

        Ok(row)
    }

    /// Returns the panorama addressed by `key`
    pub fn panorama(&self, key: PanoramaKey) -> Result<&FilePanorama> {
        self.file(key.file)?
            .panorama(key.id)
            .ok_or_else(|| ImcError::UnknownEntity(format!("panorama {}", key.id)))
    }

    pub(crate) fn panorama_mut(&mut self, key: PanoramaKey) -> Result<&mut FilePanorama> {
        self.file_mut(key.file)?
            .panorama_mut(key.id)
            .ok_or_else(|| ImcError::UnknownEntity(format!("panorama {}", key.id)))
    }

    /// Returns the acquisition addressed by `key`
    pub fn acquisition(&self, key: AcquisitionKey) -> Result<&FileAcquisition> {
        self.file(key.file)?
            .acquisition(key.id)
            .ok_or_else(|| ImcError::UnknownEntity(format!("acquisition {}", key.id)))
    }

    pub(crate) fn acquisition_mut(&mut self, key: AcquisitionKey) -> Result<&mut FileAcquisition> {
        self.file_mut(key.file)?
            .acquisition_mut(key.id)
            .ok_or_else(|| ImcError::UnknownEntity(format!("acquisition {}", key.id)))
    }

    fn is_live(&self, node: NodeId) -> bool {
        match node {
            NodeId::Root => true,
            NodeId::File(file) | NodeId::Panoramas(file) | NodeId::Acquisitions(file) => {
                self.file(file).is_ok()
            }
            NodeId::Panorama(key) => self.panorama(key).is_ok(),
            NodeId::Acquisition(key) => self.acquisition(key).is_ok(),
        }
    }

    /// Parent of `node`, `None` for the root and for nodes of closed files
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        if !self.is_live(node) {
            return None;
        }

        match node {
            NodeId::Root => None,
            NodeId::File(_) => Some(NodeId::Root),
            NodeId::Panoramas(file) | NodeId::Acquisitions(file) => Some(NodeId::File(file)),
            NodeId::Panorama(key) => Some(NodeId::Panoramas(key.file)),
            NodeId::Acquisition(key) => Some(NodeId::Acquisitions(key.file)),
        }
    }

    /// Children of `node` in row order. Nodes of closed files have no children.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        match node {
            NodeId::Root => self.open.iter().copied().map(NodeId::File).collect(),
            NodeId::File(file) if self.file(file).is_ok() => {
                vec![NodeId::Panoramas(file), NodeId::Acquisitions(file)]
            }
            NodeId::Panoramas(file) => match self.file(file) {
                Ok(file) => file
                    .panoramas()
                    .iter()
                    .map(|panorama| NodeId::Panorama(panorama.key()))
                    .collect(),
                Err(_) => Vec::new(),
            },
            NodeId::Acquisitions(file) => match self.file(file) {
                Ok(file) => file
                    .acquisitions()
                    .iter()
                    .map(|acquisition| NodeId::Acquisition(acquisition.key()))
                    .collect(),
                Err(_) => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Run `f` on the item behind `node`, if the node is live
    pub fn with_item<T>(&self, node: NodeId, f: impl FnOnce(&dyn TreeItem) -> T) -> Option<T> {
        match node {
            NodeId::Root => None,
            NodeId::File(file) => self.file(file).ok().map(|file| f(file)),
            NodeId::Panoramas(file) => self
                .file(file)
                .ok()
                .map(|_| f(&GroupNode::Panoramas(file))),
            NodeId::Acquisitions(file) => self
                .file(file)
                .ok()
                .map(|_| f(&GroupNode::Acquisitions(file))),
            NodeId::Panorama(key) => self.panorama(key).ok().map(|panorama| f(panorama)),
            NodeId::Acquisition(key) => self.acquisition(key).ok().map(|acquisition| f(acquisition)),
        }
    }

    /// Columns of the row of `node`, empty for nodes of closed files
    pub fn display_fields(&self, node: NodeId) -> Vec<TreeField> {
        self.with_item(node, |item| item.tree_fields())
            .unwrap_or_default()
    }

    /// Whether the row of `node` carries a check box
    pub fn is_checkable(&self, node: NodeId) -> bool {
        self.with_item(node, |item| item.is_checkable())
            .unwrap_or(false)
    }

    /// State of the check box of `node`
    pub fn is_checked(&self, node: NodeId) -> bool {
        self.with_item(node, |item| item.is_checked())
            .unwrap_or(false)
    }
}

fn print_fields(fields: Vec<TreeField>) -> String {
    fields
        .into_iter()
        .map(|field| match field {
            TreeField::Text(text) => text,
            TreeField::Check(true) => "[x]".to_string(),
            TreeField::Check(false) => "[ ]".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Print for FileRegistry {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        write!(writer, "{:indent$}", "", indent = indent)?;
        writeln!(writer, "{:-^1$}", "Files", 48)?;

        let mut stack: Vec<(NodeId, usize)> = self
            .children(NodeId::Root)
            .into_iter()
            .rev()
            .map(|node| (node, indent))
            .collect();

        while let Some((node, depth)) = stack.pop() {
            writeln!(
                writer,
                "{:depth$}{}",
                "",
                print_fields(self.display_fields(node)),
                depth = depth
            )?;

            for child in self.children(node).into_iter().rev() {
                stack.push((child, depth + 2));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        format::{AcquisitionInfo, PanoramaInfo},
        testing::MemoryFormat,
    };

    fn decoded() -> DecodedFile {
        DecodedFile {
            format: Arc::new(MemoryFormat::new("memory")),
            panoramas: vec![PanoramaInfo {
                id: 1,
                description: "Overview".to_string(),
                panorama_type: Some("Imported".to_string()),
            }],
            acquisitions: vec![AcquisitionInfo {
                id: 1,
                description: "ROI 1".to_string(),
                channel_labels: vec!["DNA1".to_string()],
            }],
        }
    }

    fn insert(registry: &mut FileRegistry, name: &str) -> FileId {
        let path = PathBuf::from(name);
        let (id, _) = registry.insert(path.clone(), FileIdentity::Path(path), decoded());
        id
    }

    #[test]
    fn tree_navigation() {
        let mut registry = FileRegistry::new();
        let file = insert(&mut registry, "a.mcd");
        let panorama = NodeId::Panorama(PanoramaKey::new(file, 1));

        assert_eq!(registry.children(NodeId::Root), vec![NodeId::File(file)]);
        assert_eq!(
            registry.children(NodeId::File(file)),
            vec![NodeId::Panoramas(file), NodeId::Acquisitions(file)]
        );
        assert_eq!(registry.children(NodeId::Panoramas(file)), vec![panorama]);
        assert_eq!(registry.parent(panorama), Some(NodeId::Panoramas(file)));
        assert_eq!(registry.parent(NodeId::File(file)), Some(NodeId::Root));

        assert!(registry.is_checkable(panorama));
        assert!(!registry.is_checked(panorama));
        assert!(!registry.is_checkable(NodeId::Acquisitions(file)));
        assert_eq!(
            registry.display_fields(NodeId::File(file)),
            vec![TreeField::Text("a.mcd".to_string())]
        );
    }

    #[test]
    fn removed_files_become_empty_nodes() {
        let mut registry = FileRegistry::new();
        let first = insert(&mut registry, "a.mcd");
        let second = insert(&mut registry, "b.mcd");

        assert_eq!(registry.remove(first).unwrap(), 0);
        assert_eq!(registry.row(second), Some(0));
        assert_eq!(registry.len(), 1);

        let acquisition = NodeId::Acquisition(AcquisitionKey::new(first, 1));
        assert!(registry.children(NodeId::File(first)).is_empty());
        assert!(registry.children(NodeId::Acquisitions(first)).is_empty());
        assert!(registry.display_fields(acquisition).is_empty());
        assert_eq!(registry.parent(acquisition), None);
        assert!(!registry.is_checked(acquisition));

        assert!(registry.file(first).unwrap_err().is_stale());
        assert!(registry.remove(first).unwrap_err().is_stale());
        assert!(matches!(
            registry.file(FileId(7)),
            Err(ImcError::UnknownEntity(_))
        ));
    }

    #[test]
    fn find_by_identity() {
        let mut registry = FileRegistry::new();
        let file = insert(&mut registry, "a.mcd");

        let identity = FileIdentity::Path(PathBuf::from("a.mcd"));
        assert_eq!(registry.find(&identity), Some(file));

        registry.remove(file).unwrap();
        assert_eq!(registry.find(&identity), None);
    }

    #[test]
    fn print_tree() {
        let mut registry = FileRegistry::new();
        insert(&mut registry, "a.mcd");

        let mut output = String::new();
        registry.print(&mut output, 0).unwrap();

        assert!(output.contains("a.mcd"));
        assert!(output.contains("    [ ] P01 Overview"));
        assert!(output.contains("    [ ] A01 ROI 1"));
    }
}
