use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid character {ch:?} at position {position} in cell reference")]
pub struct CellRefError {
    pub ch: char,
    pub position: usize,
}

/// Parse an A1-style cell reference (`A5`, `ZZ2354`) into a 1-based
/// (column, row) pair. Letters may appear in either case.
pub fn parse_cell_ref(reference: &str) -> Result<(usize, u64), CellRefError> {
    let mut column = 0usize;
    let mut row = 0u64;
    for (position, ch) in reference.chars().enumerate() {
        match ch {
            '0'..='9' => row = row * 10 + (ch as u64 - '0' as u64),
            'A'..='Z' => column = column * 26 + (ch as usize - 'A' as usize) + 1,
            'a'..='z' => column = column * 26 + (ch as usize - 'a' as usize) + 1,
            _ => return Err(CellRefError { ch, position }),
        }
    }
    Ok((column, row))
}

/// Parse an `A1:J100` range into its corner coordinates.
pub fn parse_cell_range(range: &str) -> Result<((usize, u64), (usize, u64)), CellRefError> {
    match range.split_once(':') {
        Some((start, end)) => Ok((parse_cell_ref(start)?, parse_cell_ref(end)?)),
        None => Err(CellRefError {
            ch: ':',
            position: range.len(),
        }),
    }
}
