pub mod collection;
pub mod config;
pub mod encounter;
pub mod run;
