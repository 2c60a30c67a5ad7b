//! Micromouse core - Paths
//!
//! A path is a short token string read off a flooded maze:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `B` | begin, always first |
//! | `F` | one cell forward |
//! | `R` / `L` | turn right / left, then one cell forward |
//! | `A` | turn around, then one cell forward |
//! | `S` | stop, always last |
//! | `H` | half cell, only in expanded command strings |
//!
//! Running works on the expanded form, where every cell move becomes two
//! half-cell moves and turns happen at cell boundaries:
//! `BFRS` expands to `BHHRHHS`.

use crate::maze::Maze;
use crate::types::*;
use core::fmt;
use heapless::Vec;

/// Capacity of a cell-level path: begin, one move per cell, stop
pub const PATH_CAPACITY: usize = MAZE_CELLS + 4;

/// Capacity of an expanded command string
pub const COMMAND_CAPACITY: usize = 3 * MAZE_CELLS + 4;

/// One path token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum PathToken {
    /// Path start
    Begin,
    /// Cell forward
    Forward,
    /// Turn right
    Right,
    /// Turn left
    Left,
    /// Turn around
    Around,
    /// Half cell forward
    Half,
    /// Path end
    Stop,
}

impl PathToken {
    /// Token character
    pub const fn letter(self) -> char {
        match self {
            PathToken::Begin => 'B',
            PathToken::Forward => 'F',
            PathToken::Right => 'R',
            PathToken::Left => 'L',
            PathToken::Around => 'A',
            PathToken::Half => 'H',
            PathToken::Stop => 'S',
        }
    }

    /// Token from its character
    pub const fn from_letter(c: char) -> Option<Self> {
        match c {
            'B' => Some(PathToken::Begin),
            'F' => Some(PathToken::Forward),
            'R' => Some(PathToken::Right),
            'L' => Some(PathToken::Left),
            'A' => Some(PathToken::Around),
            'H' => Some(PathToken::Half),
            'S' => Some(PathToken::Stop),
            _ => None,
        }
    }

    /// Relative turn made before moving on, for cell tokens
    pub const fn turn(self) -> Option<Turn> {
        match self {
            PathToken::Forward => Some(Turn::Ahead),
            PathToken::Right => Some(Turn::Right),
            PathToken::Left => Some(Turn::Left),
            PathToken::Around => Some(Turn::Back),
            _ => None,
        }
    }

    const fn for_turn(turn: Turn) -> Self {
        match turn {
            Turn::Ahead => PathToken::Forward,
            Turn::Right => PathToken::Right,
            Turn::Left => PathToken::Left,
            Turn::Back => PathToken::Around,
        }
    }
}

// ============================================================================
// Token Strings
// ============================================================================

/// Fixed-capacity token string
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Tokens<const N: usize> {
    tokens: Vec<PathToken, N>,
}

/// Cell-level path
pub type Path = Tokens<PATH_CAPACITY>;

/// Expanded half-cell command string
pub type Commands = Tokens<COMMAND_CAPACITY>;

impl<const N: usize> Tokens<N> {
    /// Empty string
    pub const fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Parse from characters; spaces are ignored
    pub fn parse(text: &str) -> Result<Self> {
        let mut out = Self::new();
        for c in text.chars().filter(|c| *c != ' ') {
            out.push(PathToken::from_letter(c).ok_or(Error::BadCommand)?)?;
        }
        Ok(out)
    }

    /// Append a token
    pub fn push(&mut self, token: PathToken) -> Result<()> {
        self.tokens.push(token).map_err(|_| Error::Overflow)
    }

    /// Tokens in order
    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }

    /// Token count
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// No tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of cell moves
    pub fn cells(&self) -> usize {
        self.tokens.iter().filter(|t| t.turn().is_some()).count()
    }
}

impl<const N: usize> fmt::Display for Tokens<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;
        for token in self.tokens.iter() {
            f.write_char(token.letter())?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt-log")]
impl<const N: usize> defmt::Format for Tokens<N> {
    fn format(&self, f: defmt::Formatter) {
        for token in self.tokens.iter() {
            defmt::write!(f, "{=char}", token.letter());
        }
    }
}

impl<const N: usize> fmt::Debug for Tokens<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

/// Convert cell moves to half-cell commands
///
/// `F` becomes `HH`; `R`, `L` and `A` keep the turn and gain `HH`.
/// `B` and `S` pass through.
pub fn expand(path: &Path) -> Result<Commands> {
    let mut out = Commands::new();
    for token in path.tokens() {
        match token {
            PathToken::Begin | PathToken::Stop => out.push(*token)?,
            PathToken::Forward => {
                out.push(PathToken::Half)?;
                out.push(PathToken::Half)?;
            }
            PathToken::Right | PathToken::Left | PathToken::Around => {
                out.push(*token)?;
                out.push(PathToken::Half)?;
                out.push(PathToken::Half)?;
            }
            PathToken::Half => return Err(Error::BadCommand),
        }
    }
    Ok(out)
}

/// Inverse of [`expand`]
pub fn compress(commands: &Commands) -> Result<Path> {
    let mut out = Path::new();
    let tokens = commands.tokens();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        match token {
            PathToken::Begin | PathToken::Stop => {
                out.push(token)?;
                i += 1;
            }
            PathToken::Half => {
                expect_half(tokens, i + 1)?;
                out.push(PathToken::Forward)?;
                i += 2;
            }
            PathToken::Right | PathToken::Left | PathToken::Around => {
                expect_half(tokens, i + 1)?;
                expect_half(tokens, i + 2)?;
                out.push(token)?;
                i += 3;
            }
            PathToken::Forward => return Err(Error::BadCommand),
        }
    }
    Ok(out)
}

fn expect_half(tokens: &[PathToken], i: usize) -> Result<()> {
    match tokens.get(i) {
        Some(PathToken::Half) => Ok(()),
        _ => Err(Error::BadCommand),
    }
}

// ============================================================================
// Route Reconstruction
// ============================================================================

/// Path plus the headings needed to run it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPath {
    /// Token string
    pub path: Path,
    /// Cell the path starts from
    pub start: Cell,
    /// Heading the robot must face before the first move
    pub first_heading: Direction,
    /// Heading on arrival
    pub final_heading: Direction,
    /// Cells travelled
    pub cost: u8,
}

/// Outcome of [`make_path`]
///
/// A route through never-visited cells relies on walls that were assumed
/// absent, so the caller has to decide explicitly whether to run it.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Every cell on the route has been visited
    Verified(PlannedPath),
    /// At least one cell on the route has never been visited
    Unverified(PlannedPath),
}

impl Route {
    /// The path if verified, `Err(NoRoute)` otherwise
    pub fn verified(self) -> Result<PlannedPath> {
        match self {
            Route::Verified(planned) => Ok(planned),
            Route::Unverified(_) => Err(Error::NoRoute),
        }
    }

    /// The path, verified or not
    pub fn accept_unverified(self) -> PlannedPath {
        match self {
            Route::Verified(planned) | Route::Unverified(planned) => planned,
        }
    }

    /// All cells visited
    pub fn is_verified(&self) -> bool {
        matches!(self, Route::Verified(_))
    }

    /// Borrow the planned path
    pub fn planned(&self) -> &PlannedPath {
        match self {
            Route::Verified(planned) | Route::Unverified(planned) => planned,
        }
    }
}

/// Read the downhill path from `start` off a flooded maze
///
/// The first move is toward [`Maze::direction_to_smallest`]; after that
/// each step prefers ahead, right, left, then behind among neighbours one
/// cost lower. `heading` only breaks the tie for that first direction.
pub fn make_path(maze: &Maze, start: Cell, heading: Direction) -> Result<Route> {
    let total = maze.cost(start);
    if total == MAX_COST {
        return Err(Error::NoRoute);
    }

    let mut path = Path::new();
    path.push(PathToken::Begin)?;

    let mut direction = heading;
    if total > 0 {
        direction = maze
            .direction_to_smallest(start, heading)
            .ok_or(Error::NoRoute)?;
    }
    let first_heading = direction;

    let mut verified = true;
    let mut cell = start;
    let mut remaining = total;
    while remaining > 0 {
        let next_cost = remaining - 1;
        let turn = Turn::PREFERENCE
            .into_iter()
            .find(|turn| maze.neighbour_cost(cell, direction.turned(*turn)) == next_cost)
            .ok_or(Error::NoRoute)?;
        direction = direction.turned(turn);
        path.push(PathToken::for_turn(turn))?;
        cell = cell.neighbour(direction);
        if !maze.is_visited(cell) {
            verified = false;
        }
        remaining = next_cost;
    }
    path.push(PathToken::Stop)?;

    let planned = PlannedPath {
        path,
        start,
        first_heading,
        final_heading: direction,
        cost: total,
    };
    Ok(if verified {
        Route::Verified(planned)
    } else {
        Route::Unverified(planned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::JAPAN_2007;
    extern crate std;
    use std::string::ToString;

    #[test]
    fn test_empty_maze_path() {
        let mut maze = Maze::new();
        maze.flood(DEFAULT_GOAL);
        let route = make_path(&maze, START, Direction::North).unwrap();
        assert!(!route.is_verified());
        let planned = route.accept_unverified();
        assert_eq!(planned.path.to_string(), "BFFFFFFFRFFFFFFS");
        assert_eq!(planned.cost, 14);
        assert_eq!(planned.first_heading, Direction::North);
        assert_eq!(planned.final_heading, Direction::East);
        assert_eq!(planned.path.cells(), 14);
    }

    #[test]
    fn test_japan_2007_path() {
        let mut maze = Maze::with_walls(&JAPAN_2007);
        maze.flood(DEFAULT_GOAL);
        let planned = make_path(&maze, START, Direction::North)
            .unwrap()
            .accept_unverified();
        assert_eq!(
            planned.path.to_string(),
            "BFFFRLLRRLLRRLLRFFRRFLLFFLRFRRLLRRLLRFFFFFFFFFRFFFFFRLRLLRRLLRRFFRFFFLFFFS"
        );
        assert_eq!(planned.cost, 72);
    }

    #[test]
    fn test_visited_route_is_verified() {
        let mut maze = Maze::new();
        for cell in Cell::all() {
            maze.mark_visited(cell);
        }
        maze.flood(DEFAULT_GOAL);
        let route = make_path(&maze, START, Direction::North).unwrap();
        assert!(route.is_verified());
        assert!(route.verified().is_ok());

        let mut maze = Maze::new();
        maze.flood(DEFAULT_GOAL);
        let route = make_path(&maze, START, Direction::North).unwrap();
        assert_eq!(route.verified(), Err(Error::NoRoute));
    }

    #[test]
    fn test_start_at_target() {
        let mut maze = Maze::new();
        maze.flood(START);
        let planned = make_path(&maze, START, Direction::East)
            .unwrap()
            .accept_unverified();
        assert_eq!(planned.path.to_string(), "BS");
        assert_eq!(planned.first_heading, Direction::East);
        assert_eq!(planned.final_heading, Direction::East);
    }

    #[test]
    fn test_unreachable_is_no_route() {
        let mut maze = Maze::new();
        for direction in Direction::ALL {
            maze.set_wall(DEFAULT_GOAL, direction);
        }
        maze.flood(DEFAULT_GOAL);
        assert_eq!(make_path(&maze, START, Direction::North), Err(Error::NoRoute));
    }

    #[test]
    fn test_first_move_faces_downhill() {
        let mut maze = Maze::new();
        maze.flood(DEFAULT_GOAL);
        // facing south at (0, 1): ahead and right are walled, left beats behind
        let cell = Cell::from_coords(0, 1);
        let planned = make_path(&maze, cell, Direction::South)
            .unwrap()
            .accept_unverified();
        assert_eq!(planned.first_heading, Direction::East);
        assert!(planned.path.to_string().starts_with("BF"));
    }

    #[test]
    fn test_expand_and_compress() {
        let path = Path::parse("BFRLAS").unwrap();
        let commands = expand(&path).unwrap();
        assert_eq!(commands.to_string(), "BHHRHHLHHAHHS");
        assert_eq!(compress(&commands).unwrap(), path);
    }

    #[test]
    fn test_parse_rejects_unknown_tokens() {
        assert_eq!(Path::parse("BFXS"), Err(Error::BadCommand));
        assert_eq!(Path::parse("B F F S").unwrap().to_string(), "BFFS");
        assert_eq!(expand(&Path::parse("BHS").unwrap()), Err(Error::BadCommand));
        assert_eq!(compress(&Commands::parse("BHS").unwrap()), Err(Error::BadCommand));
        assert_eq!(compress(&Commands::parse("BRHS").unwrap()), Err(Error::BadCommand));
    }

    #[test]
    fn test_push_overflow() {
        let mut tokens: Tokens<2> = Tokens::new();
        tokens.push(PathToken::Begin).unwrap();
        tokens.push(PathToken::Stop).unwrap();
        assert_eq!(tokens.push(PathToken::Stop), Err(Error::Overflow));
    }
}
