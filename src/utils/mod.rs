pub mod time;

use nanoid::nanoid;

const ID_LEN: usize = 21;
const SHORT_ID_LEN: usize = 8;

/// Generate a long unique id for nodes and units.
pub fn longid() -> String {
    nanoid!(ID_LEN)
}

/// Generate a short unique id for edges and events.
#[allow(unused)]
pub fn shortid() -> String {
    nanoid!(SHORT_ID_LEN)
}
