use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tube_sort_solver::engine::{Game, Move, Puzzle, DEFAULT_CAPACITY};
use tube_sort_solver::solver::{solve, SearchLimits, Strategy};
use tube_sort_solver::utils::load_puzzle;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Seed for the random level (ignored when a puzzle file is given)
    #[clap(long, default_value_t = 514514)]
    seed: u64,

    /// Number of colors in the random level
    #[clap(long, default_value_t = 5)]
    colors: usize,

    /// Number of empty tubes in the random level
    #[clap(long, default_value_t = 2)]
    empty: usize,

    /// Tube capacity
    #[clap(short, long)]
    capacity: Option<usize>,

    /// Play this puzzle file instead of a random level
    puzzle_file: Option<PathBuf>,
}

fn initial_puzzle(args: &Args) -> Result<Puzzle, String> {
    match &args.puzzle_file {
        Some(path) => load_puzzle(path, args.capacity).map_err(|e| e.to_string()),
        None => Puzzle::new_random_with_seed(
            args.colors,
            args.empty,
            args.capacity.unwrap_or(DEFAULT_CAPACITY),
            args.seed,
        )
        .map_err(|e| e.to_string()),
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut game = match initial_puzzle(&args) {
        Ok(puzzle) => Game::new(puzzle),
        Err(e) => {
            eprintln!("Could not set up the puzzle: {}", e);
            std::process::exit(1);
        }
    };
    let mut highlight = None;
    println!("Welcome to Tube Sort!");

    loop {
        println!("---------------------");
        println!("Steps: {}", game.steps());
        println!("{}", game.puzzle().to_string_with_highlight(highlight.take()));

        if game.is_solved() {
            println!();
            println!("---------------------");
            println!("🎉 SORTED! 🎉");
            println!("Total Steps: {}", game.steps());
            println!("---------------------");
            break;
        }

        print!("Enter your move (from to), 'h' for a hint, 'u' to undo, 'p' to print, 'q' to quit: ");
        io::stdout().flush().ok();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => break, // end of input
            Ok(_) => {}
            Err(_) => {
                println!("Error reading input. Please try again.");
                continue;
            }
        }

        match input.trim() {
            "" => continue,
            "q" => {
                println!("Thanks for playing!");
                break;
            }
            "u" => {
                if game.undo_last_move() {
                    println!("Move undone.");
                } else {
                    println!("Nothing to undo.");
                }
            }
            "p" => print!("{}", game.puzzle().to_plain_string()),
            "h" => match solve(game.puzzle(), Strategy::BreadthFirst, &SearchLimits::default()) {
                Ok(solution) => match solution.moves.first() {
                    Some(mv) => {
                        println!("Hint: pour {} ({} moves left)", mv, solution.moves.len());
                        highlight = Some(mv.from);
                    }
                    None => println!("Already sorted."),
                },
                Err(e) => println!("No hint available: {}", e),
            },
            command => {
                let parts: Vec<&str> = command.split_whitespace().collect();
                let parsed = match parts.as_slice() {
                    [from, to] => from.parse::<usize>().ok().zip(to.parse::<usize>().ok()),
                    _ => None,
                };
                match parsed {
                    Some(pair) => match game.process_move(Move::from(pair)) {
                        Ok(poured) => println!("Poured {} unit(s).", poured),
                        Err(e) => println!("Invalid move: {}.", e),
                    },
                    None => println!("Invalid input format. Use 'from to', 'h', 'u', 'p' or 'q'."),
                }
            }
        }
    }
}
