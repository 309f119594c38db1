use clap::Parser;
use std::collections::BTreeMap;
use tube_sort_solver::engine::Puzzle;
use tube_sort_solver::solver::{solve, SearchLimits, SolveError, Strategy};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Compares the search strategies on seeded random levels", long_about = None)]
struct Args {
    /// Number of random levels to solve
    #[clap(long, default_value_t = 20)]
    levels: u64,

    /// Seed of the first level; level `i` uses `start_seed + i`
    #[clap(long, default_value_t = 0)]
    start_seed: u64,

    /// Colors per level
    #[clap(long, default_value_t = 4)]
    colors: usize,

    /// Empty tubes per level
    #[clap(long, default_value_t = 2)]
    empty: usize,

    /// Tube capacity
    #[clap(long, default_value_t = 4)]
    capacity: usize,

    /// Expansion limit per search
    #[clap(long, default_value_t = 500_000)]
    max_states: usize,
}

const STRATEGIES: [Strategy; 2] = [Strategy::BreadthFirst, Strategy::DepthFirst];

#[derive(Default)]
struct Tally {
    solved: usize,
    total_moves: usize,
    total_expanded: usize,
    exhausted: usize,
    limited: usize,
}

impl Tally {
    /// One summary line; failure counts are reported even when nothing was solved.
    fn summary(&self) -> String {
        let failures = format!("exhausted {}, limit hit {}", self.exhausted, self.limited);
        if self.solved == 0 {
            return format!("no levels solved, {}", failures);
        }
        let solved = self.solved as f64;
        format!(
            "solved {:>3}, avg moves {:>7.2}, avg expanded {:>10.1}, {}",
            self.solved,
            self.total_moves as f64 / solved,
            self.total_expanded as f64 / solved,
            failures
        )
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let limits = SearchLimits {
        max_expanded_states: Some(args.max_states),
        ..SearchLimits::default()
    };

    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();

    println!(
        "Evaluating {} levels ({} colors, {} empty, capacity {})...",
        args.levels, args.colors, args.empty, args.capacity
    );

    for level in 0..args.levels {
        let seed = args.start_seed + level;
        let puzzle = match Puzzle::new_random_with_seed(args.colors, args.empty, args.capacity, seed) {
            Ok(puzzle) => puzzle,
            Err(e) => {
                eprintln!("Cannot generate levels: {}", e);
                std::process::exit(1);
            }
        };

        println!("\nLevel {} (Seed: {})", level, seed);

        for strategy in STRATEGIES {
            let tally = tallies.entry(strategy.to_string()).or_default();
            match solve(&puzzle, strategy, &limits) {
                Ok(solution) => {
                    println!(
                        "  Strategy: {:<14} Moves: {:<5} Expanded: {:<8} Time: {:.3}s",
                        strategy,
                        solution.moves.len(),
                        solution.states_expanded,
                        solution.elapsed.as_secs_f64()
                    );
                    tally.solved += 1;
                    tally.total_moves += solution.moves.len();
                    tally.total_expanded += solution.states_expanded;
                }
                Err(e) => {
                    println!("  Strategy: {:<14} {}", strategy, e);
                    match e {
                        SolveError::Exhausted { .. } => tally.exhausted += 1,
                        SolveError::LimitExceeded { .. } => tally.limited += 1,
                    }
                }
            }
        }
    }

    println!("\n--- Evaluation Complete ---");
    println!("Levels evaluated: {}", args.levels);
    println!("\n--- Averages over solved levels ---");
    for (name, tally) in &tallies {
        println!("Strategy {:<14}: {}", name, tally.summary());
    }
}
