pub mod filesystem;
pub mod history;
pub mod imports;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod symbols;
