use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tube_sort_solver::engine::Puzzle;
use tube_sort_solver::solver::{replay, solve, SearchLimits, Solution, SolveError, Strategy};
use tube_sort_solver::utils::load_puzzle;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Search strategy: `bfs` (fewest moves) or `dfs` (less memory)
    #[clap(short, long, default_value = "bfs")]
    strategy: Strategy,

    /// Tube capacity; overrides the file and skips inference
    #[clap(short, long)]
    capacity: Option<usize>,

    /// Stop after expanding this many states (0 for no limit)
    #[clap(long, default_value_t = 2_000_000)]
    max_states: usize,

    /// Stop after this many seconds (0 or `inf` for no limit)
    #[clap(long, default_value_t = 60.0)]
    max_seconds: f64,

    /// Depth ceiling for the depth-first strategy
    #[clap(long, default_value_t = 512)]
    max_depth: usize,

    /// Print the result as a JSON document instead of text
    #[clap(long)]
    json: bool,

    /// Fail with exit code 3 unless the solution replays to a sorted puzzle
    #[clap(long)]
    verify: bool,

    /// Path to the puzzle file (text, or JSON if it ends in `.json`)
    puzzle_file: PathBuf,
}

impl Args {
    fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_expanded_states: (self.max_states > 0).then_some(self.max_states),
            max_elapsed: seconds_limit(self.max_seconds),
            max_depth: self.max_depth,
        }
    }
}

/// Converts `--max-seconds` into a time bound. Zero, negative, NaN and values too
/// large for a `Duration` all mean no bound.
fn seconds_limit(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}

/// Replays `solution` to get the state it ends in. Illegal moves are always an
/// error; with `verify`, so is a final state that is not sorted.
fn final_state(puzzle: &Puzzle, solution: &Solution, verify: bool) -> Result<Puzzle, String> {
    let state = replay(puzzle, &solution.moves)
        .map_err(|e| format!("Solver produced an illegal move sequence: {}", e))?;
    if verify && !state.is_solved() {
        return Err("Solver's move sequence does not end in a solved state".to_string());
    }
    Ok(state)
}

fn print_failure(err: &SolveError, json_output: bool) {
    if json_output {
        let document = match err {
            SolveError::Exhausted { states_expanded } => json!({
                "status": "exhausted",
                "states_expanded": states_expanded,
            }),
            SolveError::LimitExceeded { limit, states_expanded } => json!({
                "status": "limit_exceeded",
                "limit": limit.to_string(),
                "states_expanded": states_expanded,
            }),
        };
        println!("{}", document);
    } else {
        println!("No solution found: {}\n", err);
        if let SolveError::LimitExceeded { .. } = err {
            println!("Retry with a larger --max-states or --max-seconds.");
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let puzzle: Puzzle = match load_puzzle(&args.puzzle_file, args.capacity) {
        Ok(puzzle) => puzzle,
        Err(e) => {
            eprintln!("Failed to load puzzle from {}: {}", args.puzzle_file.display(), e);
            process::exit(1);
        }
    };

    if !args.json {
        println!("Loaded puzzle from {}\n", args.puzzle_file.display());
        println!("Initial state (capacity {}):\n{}\n", puzzle.capacity(), puzzle);
        println!("Searching with {} strategy...\n", args.strategy);
    }

    let solution = match solve(&puzzle, args.strategy, &args.limits()) {
        Ok(solution) => solution,
        Err(e) => {
            print_failure(&e, args.json);
            process::exit(2);
        }
    };

    let end_state = match final_state(&puzzle, &solution, args.verify) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(3);
        }
    };

    if args.json {
        let document = json!({
            "status": "solved",
            "solution": solution,
        });
        println!("{}", document);
        return;
    }

    println!("Solution found:\n");
    println!("Moves ({}):", solution.moves.len());
    if solution.moves.is_empty() {
        println!("  No moves needed, the puzzle is already sorted.");
    } else {
        for (i, mv) in solution.moves.iter().enumerate() {
            println!("  Move {}: {}", i + 1, mv);
        }
    }
    println!(
        "States expanded: {}, time: {:.3}s\n",
        solution.states_expanded,
        solution.elapsed.as_secs_f64()
    );
    println!("Final state:\n{}\n", end_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tube_sort_solver::engine::Move;
    use tube_sort_solver::utils::puzzle_from_str_array;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["tube_solver"];
        argv.extend_from_slice(extra);
        argv.push("puzzle.txt");
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_limits() {
        assert_eq!(parse(&[]).limits(), SearchLimits::default());
    }

    #[test]
    fn test_zero_means_no_limit() {
        let limits = parse(&["--max-states", "0", "--max-seconds", "0"]).limits();
        assert_eq!(limits.max_expanded_states, None);
        assert_eq!(limits.max_elapsed, None);
    }

    #[test]
    fn test_unrepresentable_seconds_mean_no_limit() {
        for value in ["inf", "1e30", "NaN"] {
            assert_eq!(parse(&["--max-seconds", value]).limits().max_elapsed, None, "{value}");
        }
        assert_eq!(
            parse(&["--max-seconds", "1.5"]).limits().max_elapsed,
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_strategy_flag() {
        assert_eq!(parse(&[]).strategy, Strategy::BreadthFirst);
        assert_eq!(parse(&["--strategy", "dfs"]).strategy, Strategy::DepthFirst);
        assert_eq!(parse(&["-s", "depth-first"]).strategy, Strategy::DepthFirst);
        assert!(Args::try_parse_from(["tube_solver", "--strategy", "astar", "p.txt"]).is_err());
    }

    #[test]
    fn test_final_state_verification() {
        let puzzle = puzzle_from_str_array(&["RB", "BR", "."], Some(2)).unwrap();
        let partial = Solution {
            moves: vec![Move::new(0, 2)],
            strategy: Strategy::BreadthFirst,
            states_expanded: 0,
            elapsed: Duration::ZERO,
        };
        assert!(final_state(&puzzle, &partial, false).is_ok());
        assert!(final_state(&puzzle, &partial, true).is_err());

        let illegal = Solution {
            moves: vec![Move::new(2, 0)],
            ..partial
        };
        assert!(final_state(&puzzle, &illegal, false).is_err());
    }
}
