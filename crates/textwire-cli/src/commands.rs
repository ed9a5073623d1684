pub mod model;
pub mod models;
pub mod run;
pub mod version;
