//! Gate addresses and the glyph symbols they are built from.
//!
//! An address is an ordered run of distinct glyph indices whose length matches
//! the dialing gate's chevron count. Text form is `26-6-14-31-11-29-0`; commas
//! are accepted as separators as well.

use alloc::vec::Vec as AllocVec;
use core::{fmt, str::FromStr};

use heapless::Vec;
use thiserror::Error;
use winnow::ascii::dec_uint;
use winnow::combinator::separated;
use winnow::prelude::*;
use winnow::token::one_of;

/// Longest address any gate can dial.
pub const MAX_ADDRESS_LEN: usize = 9;

/// Glyph count of the standard ring.
pub const DEFAULT_GLYPH_COUNT: u8 = 39;

/// Single glyph on the ring, identified by its index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Symbol(pub u8);

impl Symbol {
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chevron count of a gate, which fixes the address length it dials.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateSize {
    Seven,
    Eight,
    Nine,
}

impl GateSize {
    /// Number of symbols (and chevrons) for this size.
    #[must_use]
    pub const fn symbols(self) -> usize {
        match self {
            GateSize::Seven => 7,
            GateSize::Eight => 8,
            GateSize::Nine => 9,
        }
    }

    #[must_use]
    pub const fn from_symbols(count: usize) -> Option<Self> {
        match count {
            7 => Some(GateSize::Seven),
            8 => Some(GateSize::Eight),
            9 => Some(GateSize::Nine),
            _ => None,
        }
    }
}

/// Reasons an address is rejected.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AddressError {
    /// Text could not be read as a symbol list.
    #[error("address is not a list of glyph indices")]
    Malformed,
    /// More symbols than any gate can dial.
    #[error("address exceeds {MAX_ADDRESS_LEN} symbols")]
    TooLong,
    /// Symbol count does not match the dialing gate.
    #[error("address has {found} symbols, gate dials {expected}")]
    WrongLength { expected: usize, found: usize },
    /// Symbol outside the gate's glyph set.
    #[error("symbol {symbol} is not on a {glyphs}-glyph ring")]
    UnknownSymbol { symbol: Symbol, glyphs: u8 },
    /// Symbol used twice.
    #[error("symbol {0} appears more than once")]
    DuplicateSymbol(Symbol),
}

/// Ordered sequence of glyph symbols.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Address {
    symbols: Vec<Symbol, MAX_ADDRESS_LEN>,
}

impl Address {
    /// Empty address, used while a manual dial accumulates symbols.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            symbols: Vec::new(),
        }
    }

    /// Builds an address from raw glyph indices.
    pub fn from_indices(indices: &[u8]) -> Result<Self, AddressError> {
        let mut address = Self::empty();
        for &index in indices {
            address.push(Symbol(index))?;
        }
        Ok(address)
    }

    /// Parses `12-4-33` or `12,4,33`.
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let indices = symbol_list
            .parse(text.trim())
            .map_err(|_| AddressError::Malformed)?;
        Self::from_indices(&indices)
    }

    pub fn push(&mut self, symbol: Symbol) -> Result<(), AddressError> {
        self.symbols
            .push(symbol)
            .map_err(|_| AddressError::TooLong)
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Symbol> {
        self.symbols.get(index).copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Symbol] {
        &self.symbols
    }

    #[must_use]
    pub fn contains(&self, symbol: Symbol) -> bool {
        self.symbols.contains(&symbol)
    }

    /// Returns `true` when `self` is a (possibly equal) prefix of `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Address) -> bool {
        other.symbols.starts_with(&self.symbols)
    }

    /// Checks the address against a gate's size and glyph set.
    pub fn validate(&self, size: GateSize, glyphs: u8) -> Result<(), AddressError> {
        if self.len() != size.symbols() {
            return Err(AddressError::WrongLength {
                expected: size.symbols(),
                found: self.len(),
            });
        }
        self.validate_symbols(glyphs)
    }

    /// Checks glyph membership and uniqueness without a length requirement.
    pub fn validate_symbols(&self, glyphs: u8) -> Result<(), AddressError> {
        for (position, &symbol) in self.symbols.iter().enumerate() {
            check_symbol(symbol, glyphs)?;
            if self.symbols[..position].contains(&symbol) {
                return Err(AddressError::DuplicateSymbol(symbol));
            }
        }
        Ok(())
    }
}

/// Rejects glyph indices beyond the ring.
pub fn check_symbol(symbol: Symbol, glyphs: u8) -> Result<(), AddressError> {
    if symbol.0 < glyphs {
        Ok(())
    } else {
        Err(AddressError::UnknownSymbol { symbol, glyphs })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.symbols.is_empty() {
            return f.write_str("-");
        }
        for (position, symbol) in self.symbols.iter().enumerate() {
            if position > 0 {
                f.write_str("-")?;
            }
            write!(f, "{symbol}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

fn symbol_list(input: &mut &str) -> ModalResult<AllocVec<u8>> {
    separated(1.., dec_uint::<_, u8, _>, one_of(['-', ','])).parse_next(input)
}
