//! Core state model for the tube color sort puzzle.
//!
//! This module defines the puzzle's fundamental components:
//! - `Color`: an opaque color identifier, shown as a letter `A`..`Z`.
//! - `Tube`: a single container, stored bottom to top.
//! - `Move`: a pour from one tube into another.
//! - `Puzzle`: every tube plus the shared capacity. Holds the legality rules,
//!   move application, the goal test and the canonical key used for deduplication.
//! - `Game`: an interactive session with move history and undo.
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter;
use std::rc::Rc;
use thiserror::Error;

/// Capacity assumed when it cannot be inferred from the tubes themselves.
pub const DEFAULT_CAPACITY: usize = 4;

/// Largest supported tube capacity. Tube lengths are stored as single bytes in `StateKey`.
pub const MAX_CAPACITY: usize = u8::MAX as usize;

/// Number of distinct colors, one per letter `A`..`Z`.
pub const COLOR_COUNT: usize = 26;

/// 256-color ANSI background codes, indexed by color id.
/// Letters used by the named palette (B, C, G, K, O, P, R, Y) get their matching hue.
const ANSI_BACKGROUNDS: [u8; COLOR_COUNT] = [
    130, // A
    21,  // B blue
    51,  // C cyan
    94,  // D
    250, // E
    58,  // F
    34,  // G green
    118, // H
    141, // I
    23,  // J
    213, // K pink
    190, // L
    125, // M
    17,  // N
    208, // O orange
    93,  // P purple
    180, // Q
    196, // R red
    109, // S
    30,  // T
    88,  // U
    177, // V
    231, // W
    244, // X
    226, // Y yellow
    153, // Z
];

/// An opaque color identifier.
///
/// Only equality is meaningful for the puzzle rules. The derived ordering exists so
/// that colors can key a `BTreeMap` with a reproducible iteration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color(u8);

impl Color {
    /// Creates a color from its numeric id. Returns `None` if `id >= COLOR_COUNT`.
    pub fn new(id: u8) -> Option<Self> {
        ((id as usize) < COLOR_COUNT).then_some(Color(id))
    }

    /// Converts a letter (case-insensitive) into a color: `A` is id 0, `Z` is id 25.
    ///
    /// # Examples
    /// ```
    /// use tube_sort_solver::engine::Color;
    /// assert_eq!(Color::from_letter('r'), Color::from_letter('R'));
    /// assert_eq!(Color::from_letter('A').map(|c| c.id()), Some(0));
    /// assert!(Color::from_letter('?').is_none());
    /// ```
    pub fn from_letter(ch: char) -> Option<Self> {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        Some(Color(ch.to_ascii_uppercase() as u8 - b'A'))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    /// Returns the letter representation of this color.
    pub fn to_char(self) -> char {
        (b'A' + self.0) as char
    }

    fn to_ansi_color_code(self) -> u8 {
        ANSI_BACKGROUNDS[self.0 as usize]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// A single container, stored bottom to top. The last element is the pourable end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tube {
    cells: Vec<Color>,
}

impl Tube {
    pub fn new(cells: Vec<Color>) -> Self {
        Tube { cells }
    }

    /// Returns the colors in this tube, bottom first.
    pub fn cells(&self) -> &[Color] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the color at the top of the tube, or `None` if it is empty.
    pub fn top(&self) -> Option<Color> {
        self.cells.last().copied()
    }

    /// Counts the consecutive same-color units at the top of the tube.
    ///
    /// # Examples
    /// ```
    /// use tube_sort_solver::engine::{Color, Tube};
    /// let r = Color::from_letter('R').unwrap();
    /// let b = Color::from_letter('B').unwrap();
    /// assert_eq!(Tube::new(vec![r, b, b]).run_length(), 2);
    /// assert_eq!(Tube::new(vec![]).run_length(), 0);
    /// ```
    pub fn run_length(&self) -> usize {
        match self.top() {
            Some(top) => self.cells.iter().rev().take_while(|&&c| c == top).count(),
            None => 0,
        }
    }

    /// True if every unit has the same color. An empty tube is trivially monochromatic.
    pub fn is_monochromatic(&self) -> bool {
        self.run_length() == self.cells.len()
    }

    /// True if the tube is empty, or full and monochromatic.
    pub fn is_sorted(&self, capacity: usize) -> bool {
        self.is_empty() || (self.cells.len() == capacity && self.is_monochromatic())
    }
}

/// A pour from tube `from` into tube `to`. Indices are zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: usize,
    pub to: usize,
}

impl Move {
    pub fn new(from: usize, to: usize) -> Self {
        Move { from, to }
    }
}

impl From<(usize, usize)> for Move {
    fn from((from, to): (usize, usize)) -> Self {
        Move { from, to }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Reasons a puzzle cannot be constructed. These are rejected before any search begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PuzzleError {
    #[error("a puzzle needs at least one tube")]
    NoTubes,

    #[error("tube capacity must be at least 1")]
    ZeroCapacity,

    #[error("tube capacity {capacity} exceeds the supported maximum of {max}")]
    CapacityTooLarge { capacity: usize, max: usize },

    #[error("tube {index} holds {len} units but the capacity is {capacity}")]
    TubeOverflow {
        index: usize,
        len: usize,
        capacity: usize,
    },

    #[error("cannot generate {requested} colors, at most {max} are available")]
    TooManyColors { requested: usize, max: usize },
}

/// Reasons a pour is illegal in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("cannot pour tube {index} into itself")]
    SameTube { index: usize },

    #[error("tube index {index} is out of range for {count} tubes")]
    OutOfRange { index: usize, count: usize },

    #[error("tube {index} is empty")]
    EmptySource { index: usize },

    #[error("tube {index} is already full")]
    DestinationFull { index: usize },

    #[error("top of tube {from} ({from_color}) does not match top of tube {to} ({to_color})")]
    ColorMismatch {
        from: usize,
        to: usize,
        from_color: Color,
        to_color: Color,
    },

    #[error("pouring single-colored tube {from} into empty tube {to} changes nothing")]
    NoOpPour { from: usize, to: usize },
}

/// Compact fingerprint of a puzzle's ordered contents, used for revisit detection.
///
/// Each tube is encoded as its length followed by its color ids, so two puzzles
/// produce equal keys exactly when their tubes hold the same colors in the same order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateKey(Box<[u8]>);

impl StateKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A full puzzle state: every tube plus the capacity shared by all of them.
///
/// `Puzzle` behaves as a value. Tubes are reference counted and copied on write, so
/// cloning a puzzle is cheap and a successor only owns new storage for the two tubes
/// a pour touches. No mutation of one state is ever visible through another.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Puzzle {
    tubes: Vec<Rc<Tube>>,
    capacity: usize,
}

fn validate_capacity(capacity: usize) -> Result<(), PuzzleError> {
    if capacity == 0 {
        return Err(PuzzleError::ZeroCapacity);
    }
    if capacity > MAX_CAPACITY {
        return Err(PuzzleError::CapacityTooLarge {
            capacity,
            max: MAX_CAPACITY,
        });
    }
    Ok(())
}

impl Puzzle {
    /// Creates a puzzle from tube contents (each listed bottom to top) and a capacity.
    ///
    /// # Returns
    /// * `Ok(Puzzle)` if the input is valid.
    /// * `Err(PuzzleError)` if there are no tubes, the capacity is zero or too large,
    ///   or any tube holds more units than the capacity.
    ///
    /// # Examples
    /// ```
    /// use tube_sort_solver::engine::{Color, Puzzle, PuzzleError};
    /// let r = Color::from_letter('R').unwrap();
    /// let puzzle = Puzzle::new(vec![vec![r, r], vec![]], 2).unwrap();
    /// assert!(puzzle.is_solved());
    /// assert_eq!(Puzzle::new(vec![], 4), Err(PuzzleError::NoTubes));
    /// ```
    pub fn new(tubes: Vec<Vec<Color>>, capacity: usize) -> Result<Self, PuzzleError> {
        if tubes.is_empty() {
            return Err(PuzzleError::NoTubes);
        }
        validate_capacity(capacity)?;
        if let Some((index, tube)) = tubes.iter().enumerate().find(|(_, t)| t.len() > capacity) {
            return Err(PuzzleError::TubeOverflow {
                index,
                len: tube.len(),
                capacity,
            });
        }
        Ok(Puzzle {
            tubes: tubes.into_iter().map(|cells| Rc::new(Tube::new(cells))).collect(),
            capacity,
        })
    }

    /// Generates a reproducible random level.
    ///
    /// Starts from `colors` full single-colored tubes, shuffles every unit with a
    /// `SmallRng` seeded from `seed`, refills those tubes in order and appends
    /// `empty_tubes` empty tubes. The same arguments always produce the same puzzle.
    /// The result may occasionally be solved already, which callers should tolerate.
    pub fn new_random_with_seed(
        colors: usize,
        empty_tubes: usize,
        capacity: usize,
        seed: u64,
    ) -> Result<Self, PuzzleError> {
        if colors > COLOR_COUNT {
            return Err(PuzzleError::TooManyColors {
                requested: colors,
                max: COLOR_COUNT,
            });
        }
        validate_capacity(capacity)?;

        let mut units: Vec<Color> = (0..colors as u8)
            .flat_map(|id| iter::repeat(Color(id)).take(capacity))
            .collect();
        let mut rng = SmallRng::seed_from_u64(seed);
        units.shuffle(&mut rng);

        let mut tubes: Vec<Vec<Color>> = units.chunks(capacity).map(<[Color]>::to_vec).collect();
        tubes.extend(iter::repeat_with(Vec::new).take(empty_tubes));
        Puzzle::new(tubes, capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn tube_count(&self) -> usize {
        self.tubes.len()
    }

    /// Returns the tube at `index`, or `None` if the index is out of range.
    pub fn tube(&self, index: usize) -> Option<&Tube> {
        self.tubes.get(index).map(Rc::as_ref)
    }

    /// Iterates over the tubes in index order.
    pub fn tubes(&self) -> impl Iterator<Item = &Tube> + '_ {
        self.tubes.iter().map(Rc::as_ref)
    }

    /// Total number of colored units across all tubes.
    pub fn unit_count(&self) -> usize {
        self.tubes.iter().map(|t| t.len()).sum()
    }

    /// Counts units per color. Legal moves never change this map.
    pub fn color_counts(&self) -> BTreeMap<Color, usize> {
        let mut counts = BTreeMap::new();
        for color in self.tubes.iter().flat_map(|t| t.cells.iter()) {
            *counts.entry(*color).or_insert(0) += 1;
        }
        counts
    }

    /// Necessary condition for solvability: every color fills a whole number of tubes.
    ///
    /// A `false` result proves the puzzle can never be solved. A `true` result does
    /// not prove the opposite.
    pub fn is_sortable(&self) -> bool {
        self.color_counts()
            .values()
            .all(|&count| count % self.capacity == 0)
    }

    /// Checks whether every tube is empty, or full and monochromatic.
    ///
    /// A tube holding three units of one color with capacity four is *not* sorted.
    pub fn is_solved(&self) -> bool {
        self.tubes.iter().all(|t| t.is_sorted(self.capacity))
    }

    /// Explains why `mv` is illegal in this state, or returns `Ok(())` if it is legal.
    ///
    /// A pour is illegal when the indices are equal or out of range, the source is
    /// empty, the destination is full, the two top colors differ, or the source is
    /// single-colored and the destination is empty (the pour would only relocate the
    /// tube). The last rule depends on contents alone, never on index order.
    pub fn check_move(&self, mv: Move) -> Result<(), MoveError> {
        let count = self.tubes.len();
        for index in [mv.from, mv.to] {
            if index >= count {
                return Err(MoveError::OutOfRange { index, count });
            }
        }
        if mv.from == mv.to {
            return Err(MoveError::SameTube { index: mv.from });
        }

        let source = &self.tubes[mv.from];
        let destination = &self.tubes[mv.to];
        let Some(from_color) = source.top() else {
            return Err(MoveError::EmptySource { index: mv.from });
        };
        if destination.len() >= self.capacity {
            return Err(MoveError::DestinationFull { index: mv.to });
        }

        match destination.top() {
            Some(to_color) if to_color != from_color => Err(MoveError::ColorMismatch {
                from: mv.from,
                to: mv.to,
                from_color,
                to_color,
            }),
            None if source.is_monochromatic() => Err(MoveError::NoOpPour {
                from: mv.from,
                to: mv.to,
            }),
            _ => Ok(()),
        }
    }

    pub fn is_valid_move(&self, from: usize, to: usize) -> bool {
        self.check_move(Move::new(from, to)).is_ok()
    }

    /// Lists every legal move, ordered by ascending source and then ascending destination.
    pub fn legal_moves(&self) -> Vec<Move> {
        let n = self.tubes.len();
        (0..n)
            .flat_map(|from| (0..n).map(move |to| Move::new(from, to)))
            .filter(|&mv| self.check_move(mv).is_ok())
            .collect()
    }

    /// Pairs every legal move with the state it produces, in `legal_moves` order.
    pub fn successors(&self) -> Vec<(Move, Puzzle)> {
        self.legal_moves()
            .into_iter()
            .filter_map(|mv| self.apply_move(mv).ok().map(|next| (mv, next)))
            .collect()
    }

    /// Returns the state reached by applying `mv`, leaving `self` untouched.
    ///
    /// # Returns
    /// * `Ok(Puzzle)` with the successor state if the move is legal.
    /// * `Err(MoveError)` describing why the move was rejected.
    pub fn apply_move(&self, mv: Move) -> Result<Puzzle, MoveError> {
        let mut next = self.clone();
        next.pour(mv)?;
        Ok(next)
    }

    /// Pours in place and returns how many units moved.
    ///
    /// The top run of the source moves onto the destination, limited by the room left
    /// in the destination. The move is validated before any tube is touched, so an
    /// `Err` leaves the puzzle exactly as it was.
    pub fn pour(&mut self, mv: Move) -> Result<usize, MoveError> {
        self.check_move(mv)?;

        let room = self.capacity - self.tubes[mv.to].len();
        let amount = self.tubes[mv.from].run_length().min(room);

        let source = Rc::make_mut(&mut self.tubes[mv.from]);
        let split_at = source.cells.len() - amount;
        let poured = source.cells.split_off(split_at);
        Rc::make_mut(&mut self.tubes[mv.to]).cells.extend(poured);

        Ok(amount)
    }

    /// Builds the deduplication key for this state.
    pub fn canonical_key(&self) -> StateKey {
        let mut bytes = Vec::with_capacity(self.tubes.len() + self.unit_count());
        for tube in &self.tubes {
            // validate_capacity keeps every length within a byte
            bytes.push(tube.len() as u8);
            bytes.extend(tube.cells.iter().map(|c| c.0));
        }
        StateKey(bytes.into_boxed_slice())
    }

    /// Renders the puzzle for the terminal, one tube per line, with ANSI colors.
    ///
    /// If `selected` is `Some(i)`, tube `i` is marked with an arrow. Used by the
    /// interactive player to point at the source of a hinted move.
    pub fn to_string_with_highlight(&self, selected: Option<usize>) -> String {
        let mut output = String::new();
        for (index, tube) in self.tubes.iter().enumerate() {
            let marker = if selected == Some(index) { '>' } else { ' ' };
            output.push_str(&format!("{}{:>2} |", marker, index));
            for color in &tube.cells {
                output.push_str(&format!(
                    "\x1b[30;48;5;{}m{}\x1b[m",
                    color.to_ansi_color_code(),
                    color
                ));
            }
            output.push_str(&" ".repeat(self.capacity - tube.len()));
            output.push('|');
            if index + 1 < self.tubes.len() {
                output.push('\n');
            }
        }
        output
    }

    /// Renders the puzzle in the text input format, without escape codes.
    ///
    /// The first line is a `capacity:` directive, followed by one line per tube.
    /// Empty tubes are written as `.`.
    pub fn to_plain_string(&self) -> String {
        let mut output = format!("capacity: {}\n", self.capacity);
        for tube in &self.tubes {
            if tube.is_empty() {
                output.push('.');
            } else {
                output.extend(tube.cells.iter().map(|c| c.to_char()));
            }
            output.push('\n');
        }
        output
    }
}

impl fmt::Display for Puzzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_highlight(None))
    }
}

/// An interactive session: the current puzzle plus a history of moves for undo.
///
/// # Examples
/// ```
/// use tube_sort_solver::engine::{Color, Game, Move, Puzzle};
/// let r = Color::from_letter('R').unwrap();
/// let b = Color::from_letter('B').unwrap();
/// let puzzle = Puzzle::new(vec![vec![r, b], vec![b, r], vec![]], 2).unwrap();
/// let mut game = Game::new(puzzle);
///
/// assert_eq!(game.process_move(Move::new(0, 2)), Ok(1));
/// assert_eq!(game.steps(), 1);
/// assert!(game.undo_last_move());
/// assert_eq!(game.steps(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct Game {
    puzzle: Puzzle,
    history: Vec<(Puzzle, Move)>, // (state before the move, the move)
}

impl Game {
    pub fn new(puzzle: Puzzle) -> Self {
        Game {
            puzzle,
            history: Vec::new(),
        }
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    /// Number of moves played since the start (undone moves are not counted).
    pub fn steps(&self) -> usize {
        self.history.len()
    }

    /// Moves played so far, in order.
    pub fn moves(&self) -> Vec<Move> {
        self.history.iter().map(|&(_, mv)| mv).collect()
    }

    /// Plays `mv` and returns how many units were poured.
    ///
    /// An illegal move is rejected with its `MoveError` and the game is unchanged.
    pub fn process_move(&mut self, mv: Move) -> Result<usize, MoveError> {
        let previous = self.puzzle.clone();
        let poured = self.puzzle.pour(mv)?;
        self.history.push((previous, mv));
        Ok(poured)
    }

    /// Reverts the last move. Returns `false` if there is nothing to undo.
    pub fn undo_last_move(&mut self) -> bool {
        match self.history.pop() {
            Some((previous, _)) => {
                self.puzzle = previous;
                true
            }
            None => false,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.puzzle.is_solved()
    }
}
