pub mod export;
pub mod mine;
pub mod report;
pub mod rollup;
pub mod run;
pub mod version;
