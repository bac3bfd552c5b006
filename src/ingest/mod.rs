//! Loading raw records from tabular files. Lives outside the core: the
//! builder only ever sees `RawRecord`s.

pub mod csv;
pub mod io;

pub use io::*;
