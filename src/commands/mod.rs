pub mod check;
pub mod delta;
pub mod notify;
pub mod shelve;
pub mod summarize;

mod context;
