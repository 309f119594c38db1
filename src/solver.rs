//! Search over puzzle states.
//!
//! `solve` dispatches to breadth-first (`solve_bfs`) or depth-first (`solve_dfs`)
//! search, both bounded by `SearchLimits`. `replay` checks a move list against a
//! starting puzzle.

use crate::engine::{Move, MoveError, Puzzle, StateKey};
use log::{debug, info, trace};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::iter;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often (in expanded states) the search logs its progress.
const PROGRESS_INTERVAL: usize = 100_000;

/// Search strategy used by `solve`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Breadth-first search. Returns a solution with the fewest possible moves.
    #[default]
    #[value(name = "bfs", alias = "breadth-first")]
    BreadthFirst,
    /// Depth-first search with memoized dead ends. Uses less memory, but the
    /// solution it returns may be longer than necessary.
    #[value(name = "dfs", alias = "depth-first")]
    DepthFirst,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfs" | "breadth-first" => Ok(Strategy::BreadthFirst),
            "dfs" | "depth-first" => Ok(Strategy::DepthFirst),
            other => Err(format!("unknown strategy '{}', expected 'bfs' or 'dfs'", other)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::BreadthFirst => write!(f, "breadth-first"),
            Strategy::DepthFirst => write!(f, "depth-first"),
        }
    }
}

/// Resource bounds for a single search, checked before every state expansion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    /// Stop after expanding this many states. `None` means no bound.
    pub max_expanded_states: Option<usize>,
    /// Stop once this much wall-clock time has passed. `None` means no bound.
    pub max_elapsed: Option<Duration>,
    /// Deepest move count the depth-first strategy explores. Ignored by breadth-first.
    pub max_depth: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_expanded_states: Some(2_000_000),
            max_elapsed: Some(Duration::from_secs(60)),
            max_depth: 512,
        }
    }
}

impl SearchLimits {
    /// No state or time bound. Termination then rests on the visited set and `max_depth`.
    pub fn unbounded() -> Self {
        SearchLimits {
            max_expanded_states: None,
            max_elapsed: None,
            ..SearchLimits::default()
        }
    }
}

/// The resource bound that stopped a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitKind {
    ExpandedStates(usize),
    Elapsed(Duration),
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::ExpandedStates(n) => write!(f, "limit of {} expanded states", n),
            LimitKind::Elapsed(d) => write!(f, "time limit of {:?}", d),
        }
    }
}

/// Why a search returned without a solution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    /// Every reachable state (within the depth ceiling, for depth-first) was explored.
    /// Either the puzzle has no solution or the ceiling was too low; this value alone
    /// does not tell the two apart.
    #[error("no solution found after expanding {states_expanded} states")]
    Exhausted { states_expanded: usize },

    /// A configured bound tripped first. Retrying with relaxed limits may succeed.
    #[error("search stopped by the {limit} after expanding {states_expanded} states")]
    LimitExceeded {
        limit: LimitKind,
        states_expanded: usize,
    },
}

/// A move sequence that sorts the puzzle, plus search statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Solution {
    /// Moves to apply in order, starting from the initial state.
    pub moves: Vec<Move>,
    pub strategy: Strategy,
    /// Number of states whose successors were generated.
    pub states_expanded: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// A move in a replayed sequence was illegal at the point it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("move {step} ({mv}) is illegal: {source}")]
pub struct ReplayError {
    /// Zero-based position of the failing move in the sequence.
    pub step: usize,
    pub mv: Move,
    #[source]
    pub source: MoveError,
}

/// Applies `moves` in order, checking legality at every step.
///
/// # Returns
/// * `Ok(Puzzle)` with the final state.
/// * `Err(ReplayError)` identifying the first illegal move.
pub fn replay(initial: &Puzzle, moves: &[Move]) -> Result<Puzzle, ReplayError> {
    let mut state = initial.clone();
    for (step, &mv) in moves.iter().enumerate() {
        state
            .pour(mv)
            .map_err(|source| ReplayError { step, mv, source })?;
    }
    Ok(state)
}

/// Tracks the expansion count and elapsed time against `SearchLimits`.
struct Budget<'a> {
    limits: &'a SearchLimits,
    started: Instant,
    expanded: usize,
}

impl<'a> Budget<'a> {
    fn new(limits: &'a SearchLimits) -> Self {
        Budget {
            limits,
            started: Instant::now(),
            expanded: 0,
        }
    }

    /// Called at the top of every expansion step. Fails once a limit is reached.
    fn begin_expansion(&mut self) -> Result<(), SolveError> {
        if let Some(max) = self.limits.max_expanded_states {
            if self.expanded >= max {
                return Err(self.limit_exceeded(LimitKind::ExpandedStates(max)));
            }
        }
        if let Some(max) = self.limits.max_elapsed {
            if self.started.elapsed() >= max {
                return Err(self.limit_exceeded(LimitKind::Elapsed(max)));
            }
        }
        self.expanded += 1;
        if self.expanded % PROGRESS_INTERVAL == 0 {
            info!(
                "expanded {} states in {:.2}s",
                self.expanded,
                self.started.elapsed().as_secs_f64()
            );
        }
        Ok(())
    }

    fn limit_exceeded(&self, limit: LimitKind) -> SolveError {
        debug!("search stopped by the {} after {} states", limit, self.expanded);
        SolveError::LimitExceeded {
            limit,
            states_expanded: self.expanded,
        }
    }

    fn exhausted(&self) -> SolveError {
        debug!("search space exhausted after {} states", self.expanded);
        SolveError::Exhausted {
            states_expanded: self.expanded,
        }
    }

    fn solution(&self, strategy: Strategy, moves: Vec<Move>) -> Solution {
        let elapsed = self.started.elapsed();
        info!(
            "{} search found a {}-move solution after {} states in {:.2}s",
            strategy,
            moves.len(),
            self.expanded,
            elapsed.as_secs_f64()
        );
        Solution {
            moves,
            strategy,
            states_expanded: self.expanded,
            elapsed,
        }
    }
}

/// Solves `puzzle` with the chosen strategy.
///
/// Puzzles that fail `Puzzle::is_sortable` are reported as `SolveError::Exhausted`
/// without searching, since no sequence of pours can sort them.
///
/// # Examples
/// ```
/// use tube_sort_solver::engine::Move;
/// use tube_sort_solver::solver::{solve, SearchLimits, Strategy};
/// use tube_sort_solver::utils::puzzle_from_str_array;
///
/// let puzzle = puzzle_from_str_array(&["RB", "BR", "."], Some(2)).unwrap();
/// let solution = solve(&puzzle, Strategy::BreadthFirst, &SearchLimits::default()).unwrap();
/// assert_eq!(solution.moves, vec![Move::new(0, 2), Move::new(1, 0), Move::new(1, 2)]);
/// ```
pub fn solve(puzzle: &Puzzle, strategy: Strategy, limits: &SearchLimits) -> Result<Solution, SolveError> {
    if !puzzle.is_sortable() {
        debug!("color counts are not multiples of capacity {}, skipping search", puzzle.capacity());
        return Err(SolveError::Exhausted { states_expanded: 0 });
    }
    match strategy {
        Strategy::BreadthFirst => solve_bfs(puzzle, limits),
        Strategy::DepthFirst => solve_dfs(puzzle, limits),
    }
}

/// Breadth-first search over canonical states.
///
/// States are expanded in FIFO order and successors in ascending (source, destination)
/// order, so the first solved state popped is reached with the fewest moves and the
/// result is identical across runs. Each frontier entry only records its parent's
/// index and the move that produced it; move lists are rebuilt once, at the end.
pub fn solve_bfs(initial: &Puzzle, limits: &SearchLimits) -> Result<Solution, SolveError> {
    let mut budget = Budget::new(limits);

    // parents[i] links state i back to its parent; index 0 is the initial state
    let mut parents: Vec<Option<(usize, Move)>> = vec![None];
    let mut seen: HashSet<StateKey> = HashSet::new();
    seen.insert(initial.canonical_key());
    let mut frontier: VecDeque<(Puzzle, usize)> = VecDeque::new();
    frontier.push_back((initial.clone(), 0));

    while let Some((state, node)) = frontier.pop_front() {
        if state.is_solved() {
            return Ok(budget.solution(Strategy::BreadthFirst, path_to(&parents, node)));
        }
        budget.begin_expansion()?;

        for (mv, next) in state.successors() {
            if seen.insert(next.canonical_key()) {
                parents.push(Some((node, mv)));
                frontier.push_back((next, parents.len() - 1));
            }
        }
        trace!("frontier {} / seen {}", frontier.len(), seen.len());
    }

    Err(budget.exhausted())
}

fn path_to(parents: &[Option<(usize, Move)>], mut node: usize) -> Vec<Move> {
    let mut moves = Vec::new();
    while let Some((parent, mv)) = parents[node] {
        moves.push(mv);
        node = parent;
    }
    moves.reverse();
    moves
}

/// What the depth-first search knows about a canonical state.
#[derive(Clone, Copy, Debug)]
enum Visit {
    /// Entered at this depth and not proven unsolvable. May be re-entered only from
    /// a strictly shallower depth.
    Open(usize),
    /// Fully explored with no solution below it. Never entered again.
    Dead,
}

/// One level of the explicit depth-first stack.
struct Frame {
    key: StateKey,
    depth: usize,
    via: Option<Move>,
    successors: std::vec::IntoIter<(Move, Puzzle)>,
    /// Set when some part of the subtree was skipped or cut off, so the state
    /// cannot be recorded as dead.
    incomplete: bool,
}

impl Frame {
    fn new(state: &Puzzle, key: StateKey, depth: usize, via: Option<Move>) -> Self {
        Frame {
            key,
            depth,
            via,
            successors: state.successors().into_iter(),
            incomplete: false,
        }
    }
}

/// Depth-first search with memoized failures and a hard depth ceiling.
///
/// Runs on an explicit stack, never the call stack. A state whose whole subtree was
/// explored without a solution is remembered as dead and skipped from then on. A
/// state whose subtree was truncated (by `max_depth`, or by skipping a state still
/// open elsewhere) is only re-entered if it is reached again at a shallower depth.
/// Every state is therefore entered a bounded number of times and the search ends.
pub fn solve_dfs(initial: &Puzzle, limits: &SearchLimits) -> Result<Solution, SolveError> {
    let mut budget = Budget::new(limits);
    if initial.is_solved() {
        return Ok(budget.solution(Strategy::DepthFirst, Vec::new()));
    }

    let mut visits: HashMap<StateKey, Visit> = HashMap::new();
    let mut depth_cutoffs = 0usize;

    budget.begin_expansion()?;
    let root_key = initial.canonical_key();
    visits.insert(root_key.clone(), Visit::Open(0));
    let mut stack = vec![Frame::new(initial, root_key, 0, None)];

    while let Some(frame) = stack.last_mut() {
        let Some((mv, next)) = frame.successors.next() else {
            if let Some(done) = stack.pop() {
                if done.incomplete {
                    if let Some(parent) = stack.last_mut() {
                        parent.incomplete = true;
                    }
                } else {
                    visits.insert(done.key, Visit::Dead);
                }
            }
            continue;
        };

        let depth = frame.depth + 1;
        let key = next.canonical_key();
        match visits.get(&key) {
            Some(Visit::Dead) => continue,
            Some(&Visit::Open(entered)) if entered <= depth => {
                frame.incomplete = true;
                continue;
            }
            _ => {}
        }

        if next.is_solved() {
            let moves = stack
                .iter()
                .filter_map(|f| f.via)
                .chain(iter::once(mv))
                .collect();
            return Ok(budget.solution(Strategy::DepthFirst, moves));
        }

        if depth >= limits.max_depth {
            frame.incomplete = true;
            depth_cutoffs += 1;
            continue;
        }

        budget.begin_expansion()?;
        visits.insert(key.clone(), Visit::Open(depth));
        stack.push(Frame::new(&next, key, depth, Some(mv)));
    }

    if depth_cutoffs > 0 {
        debug!("depth ceiling {} cut off {} branches", limits.max_depth, depth_cutoffs);
    }
    Err(budget.exhausted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::puzzle_from_str_array;

    fn puzzle(rows: &[&str], capacity: usize) -> Puzzle {
        puzzle_from_str_array(rows, Some(capacity)).unwrap()
    }

    fn moves(pairs: &[(usize, usize)]) -> Vec<Move> {
        pairs.iter().map(|&p| Move::from(p)).collect()
    }

    const BOTH: [Strategy; 2] = [Strategy::BreadthFirst, Strategy::DepthFirst];

    #[test]
    fn test_already_solved_returns_empty_moves() {
        let two_tubes = puzzle(&["RR", "."], 2);
        let single = puzzle(&["GGGG"], 4);
        for strategy in BOTH {
            for p in [&two_tubes, &single] {
                let sol = solve(p, strategy, &SearchLimits::default()).unwrap();
                assert!(sol.moves.is_empty());
                assert_eq!(sol.states_expanded, 0);
                assert_eq!(sol.strategy, strategy);
            }
        }
    }

    #[test]
    fn test_two_tubes_without_spare_is_unsolvable() {
        let p = puzzle(&["RB", "."], 2);
        // solve() rejects it up front because the color counts are odd
        assert_eq!(
            solve(&p, Strategy::BreadthFirst, &SearchLimits::default()),
            Err(SolveError::Exhausted { states_expanded: 0 })
        );
        // the searches themselves also run dry: one pour, then no legal moves
        assert_eq!(
            solve_bfs(&p, &SearchLimits::default()).unwrap_err(),
            SolveError::Exhausted { states_expanded: 2 }
        );
        assert_eq!(
            solve_dfs(&p, &SearchLimits::default()).unwrap_err(),
            SolveError::Exhausted { states_expanded: 2 }
        );
    }

    #[test]
    fn test_three_tubes_hand_derived_solution() {
        let p = puzzle(&["RB", "BR", "."], 2);
        let expected = moves(&[(0, 2), (1, 0), (1, 2)]);
        for strategy in BOTH {
            let sol = solve(&p, strategy, &SearchLimits::default()).unwrap();
            assert_eq!(sol.moves, expected, "{strategy}");
            assert!(replay(&p, &sol.moves).unwrap().is_solved());
        }
    }

    #[test]
    fn test_no_moves_available_is_exhausted() {
        let p = puzzle(&["RB", "BR"], 2);
        for strategy in BOTH {
            assert_eq!(
                solve(&p, strategy, &SearchLimits::default()).unwrap_err(),
                SolveError::Exhausted { states_expanded: 1 }
            );
        }
    }

    #[test]
    fn test_uneven_color_count_is_exhausted() {
        let p = puzzle(&["RRB", "BBR", "R", "."], 3);
        for strategy in BOTH {
            assert!(matches!(
                solve(&p, strategy, &SearchLimits::default()),
                Err(SolveError::Exhausted { .. })
            ));
        }
    }

    #[test]
    fn test_state_limit_is_reported_distinctly() {
        let p = puzzle(&["RB", "BR", "."], 2);
        let limits = SearchLimits {
            max_expanded_states: Some(1),
            ..SearchLimits::default()
        };
        for strategy in BOTH {
            assert_eq!(
                solve(&p, strategy, &limits).unwrap_err(),
                SolveError::LimitExceeded {
                    limit: LimitKind::ExpandedStates(1),
                    states_expanded: 1
                }
            );
        }
    }

    #[test]
    fn test_time_limit_is_checked_before_expanding() {
        let limits = SearchLimits {
            max_elapsed: Some(Duration::ZERO),
            ..SearchLimits::default()
        };
        let p = puzzle(&["RB", "BR", "."], 2);
        for strategy in BOTH {
            assert_eq!(
                solve(&p, strategy, &limits).unwrap_err(),
                SolveError::LimitExceeded {
                    limit: LimitKind::Elapsed(Duration::ZERO),
                    states_expanded: 0
                }
            );
            // a solved input needs no expansion, so the limit never trips
            assert!(solve(&puzzle(&["RR", "."], 2), strategy, &limits).is_ok());
        }
    }

    #[test]
    fn test_dfs_depth_ceiling() {
        let p = puzzle(&["RB", "BR", "."], 2);
        let shallow = SearchLimits {
            max_depth: 2,
            ..SearchLimits::default()
        };
        assert!(matches!(
            solve_dfs(&p, &shallow),
            Err(SolveError::Exhausted { .. })
        ));

        let exact = SearchLimits {
            max_depth: 3,
            ..SearchLimits::default()
        };
        assert_eq!(solve_dfs(&p, &exact).unwrap().moves.len(), 3);
    }

    #[test]
    fn test_bfs_beats_or_matches_dfs() {
        let p = Puzzle::new_random_with_seed(4, 2, 4, 11).unwrap();
        let bfs = solve(&p, Strategy::BreadthFirst, &SearchLimits::default()).unwrap();
        let dfs = solve(&p, Strategy::DepthFirst, &SearchLimits::default()).unwrap();
        assert!(bfs.moves.len() <= dfs.moves.len());
        assert!(replay(&p, &bfs.moves).unwrap().is_solved());
        assert!(replay(&p, &dfs.moves).unwrap().is_solved());
    }

    #[test]
    fn test_solutions_are_deterministic() {
        let p = Puzzle::new_random_with_seed(4, 2, 4, 3).unwrap();
        for strategy in BOTH {
            let first = solve(&p, strategy, &SearchLimits::default()).unwrap();
            let second = solve(&p, strategy, &SearchLimits::default()).unwrap();
            assert_eq!(first.moves, second.moves);
            assert_eq!(first.states_expanded, second.states_expanded);
        }
    }

    #[test]
    fn test_replay_reports_failing_step() {
        let p = puzzle(&["RB", "BR", "."], 2);
        let err = replay(&p, &moves(&[(0, 2), (0, 2)])).unwrap_err();
        assert_eq!(err.step, 1);
        assert_eq!(err.mv, Move::new(0, 2));
        assert!(matches!(err.source, MoveError::ColorMismatch { .. }));
        assert!(err.to_string().starts_with("move 1 (0 -> 2) is illegal"));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("bfs".parse::<Strategy>(), Ok(Strategy::BreadthFirst));
        assert_eq!("Depth-First".parse::<Strategy>(), Ok(Strategy::DepthFirst));
        assert!("astar".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_strategy_value_names() {
        use clap::ValueEnum;
        assert_eq!(<Strategy as ValueEnum>::from_str("dfs", false), Ok(Strategy::DepthFirst));
        assert_eq!(
            <Strategy as ValueEnum>::from_str("breadth-first", false),
            Ok(Strategy::BreadthFirst)
        );
        let names: Vec<_> = Strategy::value_variants()
            .iter()
            .filter_map(|s| s.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["bfs", "dfs"]);
    }

    #[test]
    fn test_solution_serializes_to_json() {
        let p = puzzle(&["RB", "BR", "."], 2);
        let sol = solve(&p, Strategy::BreadthFirst, &SearchLimits::default()).unwrap();
        let value = serde_json::to_value(&sol).unwrap();
        assert_eq!(value["strategy"], "breadth-first");
        assert_eq!(value["moves"][0]["from"], 0);
        assert_eq!(value["moves"][0]["to"], 2);
        assert_eq!(value["moves"].as_array().unwrap().len(), 3);
        assert!(value["elapsed_ms"].is_u64());
    }
}
