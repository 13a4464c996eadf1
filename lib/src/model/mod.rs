mod acquisition;
mod channel;
mod file;
mod panorama;

pub use self::acquisition::{AcquisitionKey, FileAcquisition};
pub use self::channel::{Blending, Channel, ChannelStyle, Color, Interpolation};
pub use self::file::{FileId, FileIdentity, ImcFile};
pub use self::panorama::{FilePanorama, PanoramaKey, ShownLayer};
