/// Source position carried by every AST node: 1-based line, 0-based column.
pub type Position = (usize, usize);

pub const NO_POSITION: Position = (0, 0);
