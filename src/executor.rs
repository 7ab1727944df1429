pub mod job;
pub mod manager;
pub mod parser;
pub mod script;
pub mod submit;
