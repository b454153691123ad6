pub use crate::decode::*;
pub use crate::defs::*;
pub use crate::encode::*;
pub use crate::error::{Error, Result};
pub use crate::fs::Filesystem;
pub use crate::volume::{Volume, FileVolume, make_buffer, read_exact_at, write_exact_at};
