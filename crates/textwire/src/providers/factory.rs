use super::{base::ApiHandler, clarifai::ClarifaiHandler, configs::ProviderConfig};
use anyhow::Result;

pub fn get_handler(config: ProviderConfig) -> Result<Box<dyn ApiHandler>> {
    match config {
        ProviderConfig::Clarifai(clarifai_config) => {
            Ok(Box::new(ClarifaiHandler::new(clarifai_config)?))
        }
    }
}
