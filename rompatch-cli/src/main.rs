use clap::Parser;
use std::path::{Path, PathBuf};

use rompatch_core::{image::Image, run, scene, PatchSettings};

#[derive(Debug, Parser)]
#[command(name = "rompatch", version, about = "Apply randomizer placements to a decompressed game image")]
struct Args {
    #[arg(long)]
    input: PathBuf,

    #[arg(long, required_unless_present = "list_chests")]
    output: Option<PathBuf>,

    /// Placement document (JSON) produced by the solver.
    #[arg(long, required_unless_present = "list_chests")]
    placements: Option<PathBuf>,

    /// Byte patch files applied before the tables are written.
    #[arg(long = "patch", value_name = "JSON")]
    patch_files: Vec<PathBuf>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    correct_chest_sizes: bool,

    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Debug-only: print every chest found in the input image and exit.
    #[arg(long, hide = true)]
    list_chests: bool,
}

fn list_chests(input: &Path) -> rompatch_core::Result<()> {
    let image = Image::from_rom_bytes(std::fs::read(input)?)?;
    let chests = scene::get_chest_list(&image, &scene::SceneTable::default(), Default::default())?;
    for (address, chest) in &chests {
        let default = image.read_u16(*address)?;
        println!(
            "0x{:08X} scene={:3} flag=0x{:02X} default=0x{:04X}",
            address, chest.scene, chest.flag, default
        );
    }
    println!("{} chests", chests.len());
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.list_chests {
        if let Err(err) = list_chests(&args.input) {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
        return;
    }

    let (Some(output), Some(placements)) = (args.output, args.placements) else {
        eprintln!("Error: --output and --placements are required");
        std::process::exit(2);
    };

    let settings = PatchSettings {
        input_path: args.input,
        output_path: output,
        placements_path: placements,
        patch_files: args.patch_files,
        correct_chest_sizes: args.correct_chest_sizes,
        debug: args.debug,
    };

    log::debug!("settings: {settings:?}");

    if let Err(err) = run(settings) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
