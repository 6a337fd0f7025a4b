mod selector;

pub use selector::{Selector, EVEN_PATH_BONUS};
