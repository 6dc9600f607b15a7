// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Source location tracking.
//!
//! Every token, AST node, and diagnostic carries a [`Location`]: a packed
//! (file, row, column) triplet. Locations are plain `Copy` values so they
//! can be stored and passed around freely without allocation.
//!
//! File index `0` is reserved for compiler-internal constructs; real
//! source files are numbered from `1` by the [`SourceMap`]. Rows and
//! columns are 1-based when they refer to real source text.

use ecow::EcoString;

/// A packed (file, row, column) source position.
///
/// The three fields are packed into a single `u64`: 16 bits of file
/// index, 24 bits of row, 24 bits of column. The all-zero value is the
/// [`Location::NULL`] sentinel used by synthesized nodes that have no
/// source counterpart.
///
/// # Examples
///
/// ```
/// use brio_core::source_analysis::Location;
///
/// let loc = Location::new(1, 10, 4);
/// assert_eq!(loc.file(), 1);
/// assert_eq!(loc.row(), 10);
/// assert_eq!(loc.column(), 4);
/// assert!(!loc.is_null());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Location(u64);

const ROW_BITS: u64 = 24;
const COL_BITS: u64 = 24;
const ROW_MAX: u32 = (1 << ROW_BITS) - 1;
const COL_MAX: u32 = (1 << COL_BITS) - 1;

impl Location {
    /// The "no location" sentinel for compiler-synthesized nodes.
    pub const NULL: Self = Self(0);

    /// Creates a location from a file index and 1-based row/column.
    ///
    /// Rows and columns beyond the packed field width are clamped; files
    /// of that size are outside the supported range anyway.
    #[must_use]
    pub const fn new(file: u16, row: u32, column: u32) -> Self {
        let row = if row > ROW_MAX { ROW_MAX } else { row };
        let column = if column > COL_MAX { COL_MAX } else { column };
        Self(((file as u64) << (ROW_BITS + COL_BITS)) | ((row as u64) << COL_BITS) | column as u64)
    }

    /// Returns the file index (`0` means compiler-internal).
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "field is 16 bits wide")]
    pub const fn file(self) -> u16 {
        (self.0 >> (ROW_BITS + COL_BITS)) as u16
    }

    /// Returns the 1-based row, or `0` for the null location.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "field is 24 bits wide")]
    pub const fn row(self) -> u32 {
        ((self.0 >> COL_BITS) as u32) & ROW_MAX
    }

    /// Returns the 1-based column, or `0` for the null location.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "field is 24 bits wide")]
    pub const fn column(self) -> u32 {
        (self.0 as u32) & COL_MAX
    }

    /// Returns `true` if this is the [`Location::NULL`] sentinel.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Interns source file names and renders locations for diagnostics.
///
/// The map owns the file-index space used by [`Location`]: the first
/// registered file gets index `1`, since index `0` is reserved for
/// internal locations.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<EcoString>,
}

impl SourceMap {
    /// Creates an empty source map.
    #[must_use]
    pub const fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Registers a file and returns its index (starting at `1`).
    ///
    /// # Panics
    /// Panics if more than `u16::MAX - 1` files are registered; a
    /// compilation of that size is outside the supported range.
    pub fn add_file(&mut self, name: impl Into<EcoString>) -> u16 {
        self.files.push(name.into());
        u16::try_from(self.files.len()).expect("too many source files")
    }

    /// Returns the name of a file, or `None` for index `0` and unknown
    /// indices.
    #[must_use]
    pub fn file_name(&self, file: u16) -> Option<&str> {
        if file == 0 {
            return None;
        }
        self.files.get(file as usize - 1).map(EcoString::as_str)
    }

    /// Renders a location as `file(row,column)` for diagnostics.
    ///
    /// Internal locations render as `<internal>`.
    #[must_use]
    pub fn render(&self, location: Location) -> String {
        match self.file_name(location.file()) {
            Some(name) => format!("{name}({},{})", location.row(), location.column()),
            None => "<internal>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_packs_and_unpacks() {
        let loc = Location::new(3, 120, 42);
        assert_eq!(loc.file(), 3);
        assert_eq!(loc.row(), 120);
        assert_eq!(loc.column(), 42);
    }

    #[test]
    fn null_location_is_all_zero() {
        assert!(Location::NULL.is_null());
        assert_eq!(Location::NULL.file(), 0);
        assert_eq!(Location::NULL.row(), 0);
        assert_eq!(Location::NULL.column(), 0);
        assert!(!Location::new(1, 1, 1).is_null());
    }

    #[test]
    fn location_clamps_out_of_range_rows() {
        let loc = Location::new(1, u32::MAX, u32::MAX);
        assert_eq!(loc.row(), (1 << 24) - 1);
        assert_eq!(loc.column(), (1 << 24) - 1);
        assert_eq!(loc.file(), 1);
    }

    #[test]
    fn source_map_numbers_files_from_one() {
        let mut map = SourceMap::new();
        let a = map.add_file("a.brio");
        let b = map.add_file("b.brio");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(map.file_name(a), Some("a.brio"));
        assert_eq!(map.file_name(b), Some("b.brio"));
        assert_eq!(map.file_name(0), None);
    }

    #[test]
    fn source_map_renders_locations() {
        let mut map = SourceMap::new();
        let file = map.add_file("main.brio");
        assert_eq!(map.render(Location::new(file, 7, 3)), "main.brio(7,3)");
        assert_eq!(map.render(Location::NULL), "<internal>");
    }
}
