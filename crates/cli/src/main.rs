use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use rnapuzzler_core::{Layout, PuzzlerOptions, RadiusSearch, RotationSign};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, clap::ValueEnum)]
enum Format {
    Json,
    Tsv,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SignArg {
    PathTurning,
    PathTurningBulgeAware,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SearchArg {
    Linear,
    Binary,
}

/// Overlap-free RNA secondary structure layout
#[derive(Parser)]
#[command(name = "rnapuzzler", version)]
struct Cli {
    /// Dot-bracket structure notation
    #[arg(short, long)]
    structure: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Distance between paired bases
    #[arg(long, default_value_t = 35.0)]
    paired: f64,

    /// Distance between consecutive backbone bases
    #[arg(long, default_value_t = 25.0)]
    unpaired: f64,

    /// Skip exterior line intersections
    #[arg(long)]
    no_exterior: bool,

    /// Skip sibling branch intersections
    #[arg(long)]
    no_siblings: bool,

    /// Skip loop/ancestor intersections
    #[arg(long)]
    no_ancestors: bool,

    /// Keep loops at their resolved size
    #[arg(long)]
    no_optimize: bool,

    /// Mirror colliding exterior branches below the exterior line
    #[arg(long)]
    allow_flipping: bool,

    /// Ceiling on configuration change attempts
    #[arg(long, default_value_t = 25000)]
    max_changes: u32,

    /// How the rotation direction of an ancestor fix is chosen
    #[arg(long, value_enum, default_value_t = SignArg::PathTurning)]
    rotation_sign: SignArg,

    /// How loop radii are shrunk during optimization
    #[arg(long, value_enum, default_value_t = SearchArg::Linear)]
    radius_search: SearchArg,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> PuzzlerOptions {
        PuzzlerOptions {
            paired: self.paired,
            unpaired: self.unpaired,
            check_exterior: !self.no_exterior,
            check_siblings: !self.no_siblings,
            check_ancestors: !self.no_ancestors,
            optimize: !self.no_optimize,
            allow_flipping: self.allow_flipping,
            max_changes: self.max_changes,
            rotation_sign: match self.rotation_sign {
                SignArg::PathTurning => RotationSign::PathTurning,
                SignArg::PathTurningBulgeAware => RotationSign::PathTurningBulgeAware,
            },
            radius_search: match self.radius_search {
                SearchArg::Linear => RadiusSearch::Linear,
                SearchArg::Binary => RadiusSearch::Binary,
            },
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn to_tsv(layout: &Layout) -> String {
    let mut out = String::new();
    for (i, p) in layout.coords.iter().enumerate() {
        let _ = writeln!(out, "{}\t{:.4}\t{:.4}", i + 1, p.x, p.y);
    }
    out
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = cli.options();
    debug!(?options, bases = cli.structure.trim().len(), "laying out structure");
    let layout = match rnapuzzler_core::layout_structure(&cli.structure, &options) {
        Ok(layout) => layout,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    debug!(changes = layout.changes_applied, "layout done");
    if layout.budget_exceeded {
        warn!(
            max_changes = options.max_changes,
            "change budget ran out, overlaps may remain"
        );
    }

    let output = match cli.format {
        Format::Json => match serde_json::to_string(&layout) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("error: failed to serialize layout: {e}");
                process::exit(1);
            }
        },
        Format::Tsv => to_tsv(&layout),
    };

    if let Some(path) = cli.output {
        if let Err(e) = std::fs::write(&path, &output) {
            eprintln!("error: failed to write {}: {e}", path.display());
            process::exit(1);
        }
    } else {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if let Err(e) = handle.write_all(output.as_bytes()) {
            eprintln!("error: write failed: {e}");
            process::exit(1);
        }
    }
}
