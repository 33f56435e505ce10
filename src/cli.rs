use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::io::dbf::CharacterEncoding;

/// Shapefile editor and tile map server
#[derive(Parser, Debug)]
#[command(name = "shape-editor", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML configuration file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Database url, overriding the configuration (e.g. sqlite://editor.sqlite?mode=rwc)
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),

    /// Load base-map polygons from a shapefile with a NAME attribute
    SeedBasemap(SeedArgs),

    /// Import a zipped shapefile and print its id
    Import(ImportArgs),

    /// Export a shapefile as <name>.zip into a directory
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on, overriding the configuration
    #[arg(short, long)]
    pub listen: Option<String>,
}

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// The base map's .shp file (its .dbf must sit next to it)
    #[arg(value_hint = ValueHint::FilePath)]
    pub shp: PathBuf,

    /// Replace an existing base map (off by default)
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Zip archive holding the .shp, .shx, .dbf and .prj files
    #[arg(value_hint = ValueHint::FilePath)]
    pub archive: PathBuf,

    /// Character encoding of the attribute table
    #[arg(short, long, default_value_t = CharacterEncoding::Utf8)]
    pub encoding: CharacterEncoding,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Shapefile id, as printed by `import`
    pub id: i64,

    /// Output location (directory).
    #[arg(value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Overwrite if the archive already exists
    #[arg(long)]
    pub force: bool,
}
