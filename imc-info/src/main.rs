use std::path::PathBuf;

use clap::Parser;
use imc_layers::{
    AcquisitionKey, FileId, ImageCanvas, ImcController, LayerHandle, LayerProperty, LayerStack,
    LayerTag, NewLayer, PanoramaKey, Print, ViewerConfig,
};
use log::{error, info, LevelFilter};

/// imc-info opens IMC data sets (*.mcd files and *.txt exports), prints their panoramas,
/// acquisitions and channels, and the layers produced by showing them.
#[derive(Parser)]
#[clap(version = "0.1", author = "Alan Race <alan.race@uni-marburg.de>")]
struct Opts {
    /// Files to open
    #[clap(required = true)]
    files: Vec<PathBuf>,
    /// Viewer configuration (JSON)
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// A level of verbosity, and can be used multiple times
    #[clap(short, long, parse(from_occurrences))]
    verbose: usize,
    /// Load the acquisition with this ID from every file that has one
    #[clap(short, long)]
    load: Vec<u16>,
    /// Show a channel of the loaded acquisitions
    #[clap(short = 's', long)]
    show_channel: Vec<String>,
    /// Show the panorama with this ID from every file that has one
    #[clap(short = 'p', long)]
    show_panorama: Vec<u16>,
}

/// Canvas without a display, logging every change to its layers
#[derive(Debug, Default)]
struct HeadlessCanvas {
    stack: LayerStack,
}

impl ImageCanvas for HeadlessCanvas {
    fn add_image(&mut self, layer: NewLayer, z_index: usize) -> LayerHandle {
        let (rows, cols) = layer.pixels.dimensions();
        info!(
            "Adding {} ({} x {} pixels at {:?}) at z-index {}",
            layer.name, cols, rows, layer.placement, z_index
        );

        self.stack.add_image(layer, z_index)
    }

    fn remove_image(&mut self, handle: LayerHandle) -> bool {
        info!("Removing {}", handle);
        self.stack.remove_image(handle)
    }

    fn move_image(&mut self, handle: LayerHandle, z_index: usize) {
        info!("Moving {} to z-index {}", handle, z_index);
        self.stack.move_image(handle, z_index)
    }

    fn set_layer_property(&mut self, handle: LayerHandle, property: &LayerProperty) {
        info!("Setting {} of {} to {:?}", property.name(), handle, property);
        self.stack.set_layer_property(handle, property)
    }

    fn layer_tags(&self) -> Vec<(LayerHandle, Option<LayerTag>)> {
        self.stack.layer_tags()
    }
}

fn print(item: &impl Print) {
    let mut output = String::new();

    match item.print(&mut output, 0) {
        Ok(()) => print!("{}", output),
        Err(error) => error!("Failed to format output: {}", error),
    }
}

fn run(opts: Opts) -> imc_layers::Result<()> {
    let config = match &opts.config {
        Some(path) => ViewerConfig::from_path(path)?,
        None => ViewerConfig::default(),
    };

    let mut controller = ImcController::with_config(HeadlessCanvas::default(), config);

    let mut files: Vec<FileId> = Vec::with_capacity(opts.files.len());
    for path in &opts.files {
        files.push(controller.open_file(path)?);
    }

    for &file in &files {
        for &id in &opts.show_panorama {
            let key = PanoramaKey::new(file, id);
            if controller.files().panorama(key).is_ok() {
                controller.show_panorama(key)?;
            }
        }

        for &id in &opts.load {
            let key = AcquisitionKey::new(file, id);
            if controller.files().acquisition(key).is_ok() {
                controller.load_acquisition(key)?;
            }
        }
    }

    for label in &opts.show_channel {
        controller.show_channel(label)?;
    }

    print(controller.files());
    print(controller.channels());
    print(&controller.canvas().stack);

    Ok(())
}

fn main() {
    let opts: Opts = Opts::parse();

    let level = match opts.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    if let Err(error) = run(opts) {
        error!("{}", error);
        std::process::exit(1);
    }
}
