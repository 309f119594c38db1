//! End-to-end scenarios for the public solver API, including an exhaustive
//! check that breadth-first solutions are as short as possible.

use std::collections::HashMap;
use tube_sort_solver::engine::{Move, Puzzle, StateKey};
use tube_sort_solver::solver::{replay, solve, SearchLimits, SolveError, Strategy};
use tube_sort_solver::utils::{parse_puzzle_json, puzzle_from_str_array};

const BOTH: [Strategy; 2] = [Strategy::BreadthFirst, Strategy::DepthFirst];

fn puzzle(rows: &[&str], capacity: usize) -> Puzzle {
    puzzle_from_str_array(rows, Some(capacity)).unwrap()
}

/// True if some sequence of at most `budget` legal moves sorts `state`.
/// `failed` remembers the largest budget already shown to be insufficient per state.
fn solvable_within(state: &Puzzle, budget: usize, failed: &mut HashMap<StateKey, usize>) -> bool {
    if state.is_solved() {
        return true;
    }
    if budget == 0 {
        return false;
    }
    let key = state.canonical_key();
    if failed.get(&key).map_or(false, |&b| b >= budget) {
        return false;
    }
    for (_, next) in state.successors() {
        if solvable_within(&next, budget - 1, failed) {
            return true;
        }
    }
    failed.insert(key, budget);
    false
}

fn assert_bfs_minimal(p: &Puzzle) -> Option<usize> {
    let solution = solve(p, Strategy::BreadthFirst, &SearchLimits::default()).ok()?;
    let length = solution.moves.len();
    assert!(replay(p, &solution.moves).unwrap().is_solved());
    if length > 0 {
        assert!(
            !solvable_within(p, length - 1, &mut HashMap::new()),
            "a solution shorter than {} moves exists for\n{}",
            length,
            p.to_plain_string()
        );
    }
    Some(length)
}

#[test]
fn test_scenario_already_solved_pair() {
    let p = puzzle(&["RR", "."], 2);
    for strategy in BOTH {
        assert!(solve(&p, strategy, &SearchLimits::default()).unwrap().moves.is_empty());
    }
}

#[test]
fn test_scenario_two_tubes_no_spare() {
    let p = puzzle(&["RB", "."], 2);
    for strategy in BOTH {
        assert!(matches!(
            solve(&p, strategy, &SearchLimits::default()),
            Err(SolveError::Exhausted { .. })
        ));
    }
}

#[test]
fn test_scenario_three_tubes() {
    let p = puzzle(&["RB", "BR", "."], 2);
    let expected = vec![Move::new(0, 2), Move::new(1, 0), Move::new(1, 2)];
    for strategy in BOTH {
        let solution = solve(&p, strategy, &SearchLimits::default()).unwrap();
        assert_eq!(solution.moves, expected);
    }
    assert_eq!(assert_bfs_minimal(&p), Some(3));
}

#[test]
fn test_scenario_single_full_tube() {
    let p = puzzle(&["YYYY"], 4);
    for strategy in BOTH {
        assert!(solve(&p, strategy, &SearchLimits::default()).unwrap().moves.is_empty());
    }
}

#[test]
fn test_scenario_count_not_multiple_of_capacity() {
    let p = puzzle(&["RRRB", "BBBR", "R", ".", "."], 4);
    for strategy in BOTH {
        assert_eq!(
            solve(&p, strategy, &SearchLimits::default()).unwrap_err(),
            SolveError::Exhausted { states_expanded: 0 }
        );
    }
}

#[test]
fn test_bfs_minimal_on_small_random_levels() {
    let mut checked = 0;
    for seed in 0..6 {
        let p = Puzzle::new_random_with_seed(3, 2, 3, seed).unwrap();
        if assert_bfs_minimal(&p).is_some() {
            checked += 1;
        }
    }
    assert!(checked > 0, "no fixture was solvable");
}

#[test]
fn test_dfs_solutions_replay_to_sorted() {
    for seed in 0..5 {
        let p = Puzzle::new_random_with_seed(4, 2, 4, seed).unwrap();
        if let Ok(solution) = solve(&p, Strategy::DepthFirst, &SearchLimits::default()) {
            let end = replay(&p, &solution.moves).unwrap();
            assert!(end.is_solved());
            assert_eq!(end.color_counts(), p.color_counts());
        }
    }
}

#[test]
fn test_json_input_end_to_end() {
    let json = r#"{"capacity": 2, "tubes": [["red", "blue"], ["blue", "red"], []]}"#;
    let p = parse_puzzle_json(json, None).unwrap();
    let solution = solve(&p, Strategy::BreadthFirst, &SearchLimits::default()).unwrap();
    assert_eq!(solution.moves.len(), 3);
}
