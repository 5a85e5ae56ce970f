pub mod list;
pub mod resolve;
pub mod run;
pub mod sources;
