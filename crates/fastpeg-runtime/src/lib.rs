//! Input side of the PEG engine: the reader cursor and the values a match produces.

pub mod captures;
pub mod reader;
pub mod token;
pub mod value;

pub use captures::Captures;
pub use reader::{Location, Reader, ReaderPosition};
pub use token::{PseudoToken, Token};
pub use value::Value;
