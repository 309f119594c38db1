//! # Tube Sort Solver Library
//!
//! This library provides the state model for the "tube color sort" puzzle and two
//! search strategies that find a sequence of pours sorting every tube into a
//! single color (or leaving it empty).
//!
//! It is used by three binaries:
//! - `tube_solver`: Loads a puzzle file and prints (or emits as JSON) a move list.
//! - `tube_player`: Interactive play in the terminal, with undo and solver hints.
//! - `strategy_evaluator`: Runs both strategies over seeded random levels and
//!   compares solution lengths and search effort.
//!
//! ## Modules
//! - `engine`: Colors, tubes, moves, the `Puzzle` state with its legality rules,
//!   goal test and canonical key, and the `Game` session with undo.
//! - `solver`: Breadth-first and depth-first search, search limits and `replay`.
//! - `utils`: Parsing puzzles from text or JSON.

pub mod engine;
pub mod solver;
pub mod utils;

pub use crate::engine::{Color, Game, Move, MoveError, Puzzle, PuzzleError};
pub use crate::solver::{solve, LimitKind, SearchLimits, Solution, SolveError, Strategy};
