use clap::{Args, Parser, Subcommand};
use kumiawase_core::shape::fmt_f32;
use kumiawase_core::{
    assign_edges, build_outline, compute_board_layout, PuzzleConfig, PuzzleState,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt::Write as _;
use std::path::PathBuf;

mod bot;

const DEFAULT_SEED: u64 = 0x5EED_4B55;

#[derive(Parser)]
#[command(name = "kumiawase-cli", version, about = "Developer tools for the kumiawase engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Writes every piece silhouette of a cut as one SVG sheet.
    Outlines {
        #[command(flatten)]
        puzzle: PuzzleArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Headless solver that plays through the drag API.
    Bot {
        #[command(subcommand)]
        command: bot::BotCommand,
    },
    /// Parses a config file and prints it with every value clamped.
    Config { path: PathBuf },
}

#[derive(Args, Clone, Debug)]
pub(crate) struct PuzzleArgs {
    /// `PuzzleConfig` JSON file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    rows: Option<u32>,
    #[arg(long)]
    cols: Option<u32>,
    #[arg(long)]
    board_width: Option<f32>,
    #[arg(long)]
    board_height: Option<f32>,
    #[arg(long, env = "KUMIAWASE_SEED")]
    seed: Option<u64>,
}

impl PuzzleArgs {
    pub(crate) fn load(&self) -> Result<PuzzleConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => PuzzleConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => PuzzleConfig::default(),
        };
        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(cols) = self.cols {
            config.cols = cols;
        }
        if let Some(width) = self.board_width {
            config.board_width = width;
        }
        if let Some(height) = self.board_height {
            config.board_height = height;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config.clamped())
    }
}

pub(crate) fn build_puzzle(config: &PuzzleConfig, rng: &mut ChaCha8Rng) -> PuzzleState {
    let edges = assign_edges(config.rows, config.cols, rng);
    let layout = compute_board_layout(
        config.board_width,
        config.board_height,
        config.scatter_margin,
        0.0,
        0.0,
    );
    PuzzleState::new(config.rows, config.cols, layout, &edges)
}

pub(crate) fn seeded_rng(config: &PuzzleConfig) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(config.seed.unwrap_or(DEFAULT_SEED))
}

fn outline_sheet(state: &PuzzleState, config: &PuzzleConfig) -> String {
    let cell_w = state.piece_width * 1.6;
    let cell_h = state.piece_height * 1.6;
    let pad_x = state.piece_width * 0.3;
    let pad_y = state.piece_height * 0.3;
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">"#,
        fmt_f32(cell_w * state.cols as f32),
        fmt_f32(cell_h * state.rows as f32)
    );
    for piece in &state.pieces {
        let outline = build_outline(
            state.piece_width,
            state.piece_height,
            piece.edges,
            &config.shape,
        );
        let x = piece.col as f32 * cell_w + pad_x;
        let y = piece.row as f32 * cell_h + pad_y;
        let _ = write!(
            out,
            r##"<g transform="translate({} {})"><path d="{}" fill="#efe9dc" stroke="#5b5346"/><text x="4" y="14" font-size="12">{}</text></g>"##,
            fmt_f32(x),
            fmt_f32(y),
            outline.to_svg_path(),
            piece.label()
        );
    }
    out.push_str("</svg>\n");
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Outlines { puzzle, out } => {
            let config = puzzle.load()?;
            let mut rng = seeded_rng(&config);
            let state = build_puzzle(&config, &mut rng);
            let svg = outline_sheet(&state, &config);
            match out {
                Some(path) => {
                    std::fs::write(&path, svg)?;
                    println!("wrote {} pieces to {}", state.total(), path.display());
                }
                None => print!("{svg}"),
            }
        }
        Commands::Bot { command } => bot::run(command)?,
        Commands::Config { path } => {
            let config = PuzzleConfig::from_json(&std::fs::read_to_string(&path)?)?;
            println!("key: {}", config.progress_key());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
