pub mod parser;
pub mod traits;

// Quote source implementations
pub mod fundgz;
