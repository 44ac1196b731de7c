pub mod completions;
pub mod load;
pub mod shell;
