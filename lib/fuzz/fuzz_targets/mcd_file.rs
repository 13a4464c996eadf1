#![no_main]

use std::io::Cursor;

use imc_layers::mcd::McdFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut mcd = match McdFile::parse(Cursor::new(data)) {
        Ok(mcd) => mcd,
        Err(_) => return,
    };

    let metadata = mcd.metadata().clone();

    for panorama in metadata.panoramas() {
        let _ = mcd.panorama_image(panorama.id());
    }

    for acquisition in metadata.acquisitions() {
        for label in acquisition.channel_labels() {
            let _ = mcd.channel_plane(acquisition.id(), &label);
        }
    }
});
