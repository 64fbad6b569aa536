use super::*;
use kumiawase_core::game::lerp;
use kumiawase_core::{
    capture_progress, encode_text, is_complete, progress, DragMachine, PieceId, SnapTolerances,
    ViewRect,
};
use rand::Rng;
use serde::Serialize;

const POINTER_ID: i32 = 1;
const DRAG_STEPS: usize = 6;
const FRAME_MS: f64 = 16.0;

#[derive(clap::Subcommand)]
pub(super) enum BotCommand {
    /// Scatters a puzzle and solves it one group at a time.
    Run {
        #[command(flatten)]
        puzzle: PuzzleArgs,
        /// Largest per-axis miss when dropping a group near its target.
        #[arg(long, default_value_t = 6.0)]
        jitter_px: f32,
        #[arg(long, default_value_t = 10_000)]
        max_moves: usize,
        /// Capture a text progress record after this many moves.
        #[arg(long)]
        checkpoint: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug)]
pub(super) struct BotRunConfig {
    pub jitter_px: f32,
    pub max_moves: usize,
    pub checkpoint: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SolveReport {
    pub pieces: usize,
    pub moves: usize,
    pub merges: usize,
    pub board_snaps: usize,
    pub groups: usize,
    pub progress: f32,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
}

pub(super) fn run(command: BotCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        BotCommand::Run {
            puzzle,
            jitter_px,
            max_moves,
            checkpoint,
            json,
        } => {
            let config = puzzle.load()?;
            let tolerances = config.tolerances();
            let run = BotRunConfig {
                jitter_px,
                max_moves,
                checkpoint,
            };
            validate_bot_config(&run, &tolerances)?;
            let mut rng = seeded_rng(&config);
            let mut state = build_puzzle(&config, &mut rng);
            state.reset_layout(&mut rng);
            let report = solve(
                &mut state,
                &mut rng,
                &tolerances,
                &run,
                &config.progress_key(),
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "pieces {} moves {} merges {} board snaps {} complete {}",
                    report.pieces, report.moves, report.merges, report.board_snaps, report.complete
                );
            }
            if !report.complete {
                return Err(format!("stopped after {} moves", report.moves).into());
            }
        }
    }
    Ok(())
}

fn validate_bot_config(
    config: &BotRunConfig,
    tolerances: &SnapTolerances,
) -> Result<(), Box<dyn std::error::Error>> {
    if !config.jitter_px.is_finite() || config.jitter_px < 0.0 {
        return Err("jitter_px must be a non-negative number".into());
    }
    // Worst case is a diagonal miss on both axes.
    if config.jitter_px * std::f32::consts::SQRT_2 >= tolerances.board_px {
        return Err(format!(
            "jitter_px {} can miss the board snap tolerance {}",
            config.jitter_px, tolerances.board_px
        )
        .into());
    }
    if config.max_moves == 0 {
        return Err("max_moves must be at least 1".into());
    }
    Ok(())
}

/// Lowest-id piece whose group is still loose.
fn choose_anchor(state: &PuzzleState) -> Option<PieceId> {
    state
        .pieces
        .iter()
        .filter(|piece| !state.group_is_snapped(piece.group))
        .map(|piece| piece.id)
        .min()
}

/// Plays at scale 1 with the whole stage visible. Each move grabs the anchor's group and
/// drops it near its solved spot, moving the pointer in a few coalesced steps.
pub(super) fn solve<R: Rng + ?Sized>(
    state: &mut PuzzleState,
    rng: &mut R,
    tolerances: &SnapTolerances,
    config: &BotRunConfig,
    key: &str,
) -> Result<SolveReport, Box<dyn std::error::Error>> {
    let visible = ViewRect {
        min_x: 0.0,
        min_y: 0.0,
        width: state.layout.stage_width,
        height: state.layout.stage_height,
    };
    let mut drag = DragMachine::new(0.0);
    let mut report = SolveReport {
        pieces: state.total(),
        ..SolveReport::default()
    };
    let mut now_ms = 0.0;
    while report.moves < config.max_moves && !is_complete(state, tolerances.solved_epsilon) {
        let Some(anchor) = choose_anchor(state) else {
            break;
        };
        let piece = &state.pieces[anchor];
        let label = piece.label();
        let grab = (
            piece.pos.0 + state.piece_width * 0.5,
            piece.pos.1 + state.piece_height * 0.5,
        );
        let jitter = config.jitter_px;
        let miss = (
            rng.random_range(-jitter..=jitter),
            rng.random_range(-jitter..=jitter),
        );
        let target = (
            grab.0 + piece.correct.0 + miss.0 - piece.pos.0,
            grab.1 + piece.correct.1 + miss.1 - piece.pos.1,
        );

        if !drag.pointer_down(state, anchor, POINTER_ID, grab) {
            return Err(format!("piece {label} could not be picked up").into());
        }
        for step in 1..=DRAG_STEPS {
            let t = step as f32 / DRAG_STEPS as f32;
            drag.pointer_move(
                POINTER_ID,
                (lerp(grab.0, target.0, t), lerp(grab.1, target.1, t)),
            );
            drag.animation_frame(&visible);
            now_ms += FRAME_MS;
        }
        let outcome = drag
            .pointer_up(state, POINTER_ID, &visible, 1.0, tolerances, now_ms)
            .ok_or_else(|| format!("release of {label} was not handled"))?;
        report.moves += 1;
        report.merges += outcome.merges;
        if outcome.board_snapped {
            report.board_snaps += 1;
        }
        if config.checkpoint == Some(report.moves) {
            let record = capture_progress(state, key, (now_ms) as u64, 0);
            report.checkpoint = Some(encode_text(&record)?);
        }
    }
    report.complete = is_complete(state, tolerances.solved_epsilon);
    report.progress = progress(state);
    report.groups = state.group_ids().len();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kumiawase_core::{decode_text, restore_progress, ProgressRecord};

    fn scattered(rows: u32, cols: u32, seed: u64) -> (PuzzleConfig, PuzzleState, ChaCha8Rng) {
        let config = PuzzleConfig {
            rows,
            cols,
            seed: Some(seed),
            ..PuzzleConfig::default()
        };
        let mut rng = seeded_rng(&config);
        let mut state = build_puzzle(&config, &mut rng);
        state.reset_layout(&mut rng);
        (config, state, rng)
    }

    #[test]
    fn bot_solves_a_scattered_puzzle() {
        let (config, mut state, mut rng) = scattered(4, 6, 3);
        let run = BotRunConfig {
            jitter_px: 8.0,
            max_moves: 100,
            checkpoint: None,
        };
        let report = solve(&mut state, &mut rng, &config.tolerances(), &run, "k")
            .expect("bot runs");
        assert!(report.complete);
        assert_eq!(report.groups, 1);
        assert_eq!(report.progress, 1.0);
        assert!(report.moves <= 24);
        assert!(state.pieces.iter().all(|piece| piece.snapped));
    }

    #[test]
    fn checkpoint_restores_into_a_fresh_cut() {
        let (config, mut state, mut rng) = scattered(3, 3, 9);
        let run = BotRunConfig {
            jitter_px: 4.0,
            max_moves: 4,
            checkpoint: Some(4),
        };
        let key = config.progress_key();
        let report =
            solve(&mut state, &mut rng, &config.tolerances(), &run, &key).expect("bot runs");
        let text = report.checkpoint.expect("checkpoint captured");
        let record: ProgressRecord = decode_text(&text).expect("checkpoint decodes");

        let mut fresh_rng = seeded_rng(&config);
        let mut fresh = build_puzzle(&config, &mut fresh_rng);
        restore_progress(&mut fresh, &record, &key).expect("record applies");
        for (a, b) in state.pieces.iter().zip(&fresh.pieces) {
            assert!((a.pos.0 - b.pos.0).abs() < 1.0e-3);
            assert!((a.pos.1 - b.pos.1).abs() < 1.0e-3);
            assert_eq!(a.snapped, b.snapped);
        }
    }

    #[test]
    fn oversized_jitter_is_rejected() {
        let run = BotRunConfig {
            jitter_px: 30.0,
            max_moves: 10,
            checkpoint: None,
        };
        assert!(validate_bot_config(&run, &SnapTolerances::default()).is_err());
    }
}
