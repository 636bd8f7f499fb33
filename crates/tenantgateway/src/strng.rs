//! Cheap shared strings for the names that flow through every request:
//! labels, principals, groups, service keys.

use arcstr::ArcStr;
pub use arcstr::{format, literal};

pub type Strng = ArcStr;

pub fn new<A: AsRef<str>>(s: A) -> Strng {
	ArcStr::from(s.as_ref())
}

pub const EMPTY: Strng = literal!("");
