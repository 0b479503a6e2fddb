//! Control algorithms: time-proportional duty-cycle slicing for the
//! heating elements.

pub mod duty;
