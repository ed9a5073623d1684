pub mod base;
pub mod clarifai;
pub mod configs;
pub mod factory;
pub mod mock;
pub mod utils;
