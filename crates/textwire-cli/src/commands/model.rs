use anyhow::Result;
use textwire::providers::base::ApiHandler;

pub async fn execute(handler: &dyn ApiHandler) -> Result<()> {
    let model = handler.get_model();
    println!("{}", serde_json::to_string_pretty(&model)?);
    Ok(())
}
