mod fs;
mod geom;

pub(crate) use fs::*;
pub(crate) use geom::*;
