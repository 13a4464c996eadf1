use std::fmt;

use crate::model::{AcquisitionKey, FileAcquisition, FileId, FilePanorama, ImcFile, PanoramaKey};

/// Address of a node in the tree of open files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// Invisible root, parent of every open file
    Root,
    /// An opened file
    File(FileId),
    /// Grouping node holding the panoramas of a file
    Panoramas(FileId),
    /// Grouping node holding the acquisitions of a file
    Acquisitions(FileId),
    /// A panorama
    Panorama(PanoramaKey),
    /// An acquisition
    Acquisition(AcquisitionKey),
}

impl NodeId {
    /// The file the node belongs to
    pub fn file(&self) -> Option<FileId> {
        match self {
            NodeId::Root => None,
            NodeId::File(file) | NodeId::Panoramas(file) | NodeId::Acquisitions(file) => {
                Some(*file)
            }
            NodeId::Panorama(key) => Some(key.file),
            NodeId::Acquisition(key) => Some(key.file),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NodeId::Root => write!(f, "root"),
            NodeId::File(file) => write!(f, "file {}", file),
            NodeId::Panoramas(file) => write!(f, "panoramas of file {}", file),
            NodeId::Acquisitions(file) => write!(f, "acquisitions of file {}", file),
            NodeId::Panorama(key) => write!(f, "panorama {} of file {}", key.id, key.file),
            NodeId::Acquisition(key) => write!(f, "acquisition {} of file {}", key.id, key.file),
        }
    }
}

/// Single column of a tree row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeField {
    /// Plain text
    Text(String),
    /// Check box
    Check(bool),
}

/// Something that can be shown as a row in a tree view
pub trait TreeItem {
    /// Columns of the row
    fn tree_fields(&self) -> Vec<TreeField>;

    /// Whether the row carries a check box the user can toggle
    fn is_checkable(&self) -> bool {
        false
    }

    /// State of the check box
    fn is_checked(&self) -> bool {
        false
    }
}

/// Header grouping the panoramas or the acquisitions of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupNode {
    /// "Panoramas" header
    Panoramas(FileId),
    /// "Acquisitions" header
    Acquisitions(FileId),
}

impl TreeItem for GroupNode {
    fn tree_fields(&self) -> Vec<TreeField> {
        let title = match self {
            GroupNode::Panoramas(_) => "Panoramas",
            GroupNode::Acquisitions(_) => "Acquisitions",
        };

        vec![TreeField::Text(title.to_string())]
    }
}

impl TreeItem for ImcFile {
    fn tree_fields(&self) -> Vec<TreeField> {
        vec![TreeField::Text(self.name())]
    }
}

impl TreeItem for FilePanorama {
    fn tree_fields(&self) -> Vec<TreeField> {
        vec![
            TreeField::Check(self.is_shown()),
            TreeField::Text(format!("P{:02}", self.key().id)),
            TreeField::Text(self.description().to_string()),
        ]
    }

    fn is_checkable(&self) -> bool {
        true
    }

    fn is_checked(&self) -> bool {
        self.is_shown()
    }
}

impl TreeItem for FileAcquisition {
    fn tree_fields(&self) -> Vec<TreeField> {
        vec![
            TreeField::Check(self.is_loaded()),
            TreeField::Text(format!("A{:02}", self.key().id)),
            TreeField::Text(self.description().to_string()),
        ]
    }

    fn is_checkable(&self) -> bool {
        true
    }

    fn is_checked(&self) -> bool {
        self.is_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::AcquisitionInfo;

    #[test]
    fn acquisition_row() {
        let key = AcquisitionKey::new(FileId(0), 3);
        let mut acquisition = FileAcquisition::new(
            key,
            AcquisitionInfo {
                id: 3,
                description: "Tonsil".to_string(),
                channel_labels: vec!["DNA1".to_string()],
            },
        );

        assert!(acquisition.is_checkable());
        assert!(!acquisition.is_checked());

        acquisition.set_loaded(true);
        assert_eq!(
            acquisition.tree_fields(),
            vec![
                TreeField::Check(true),
                TreeField::Text("A03".to_string()),
                TreeField::Text("Tonsil".to_string()),
            ]
        );
    }

    #[test]
    fn group_rows_are_not_checkable() {
        let group = GroupNode::Panoramas(FileId(1));

        assert!(!group.is_checkable());
        assert_eq!(group.tree_fields(), vec![TreeField::Text("Panoramas".to_string())]);
        assert_eq!(NodeId::Panoramas(FileId(1)).file(), Some(FileId(1)));
        assert_eq!(NodeId::Root.file(), None);
    }
}
