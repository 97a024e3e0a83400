// Formula parsing and expression trees

pub mod builder;
pub mod parser;
pub mod tree;
