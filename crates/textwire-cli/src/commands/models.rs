use anyhow::Result;
use console::style;
use textwire::providers::base::ApiHandler;

pub async fn execute(handler: &dyn ApiHandler) -> Result<()> {
    let active = handler.get_model().id;
    let models = handler.list_models().await?;

    if models.is_empty() {
        println!("{}", style("No models available").yellow());
        return Ok(());
    }

    for model in models {
        if model == active {
            println!("{} {}", style("*").green().bold(), style(model).bold());
        } else {
            println!("  {}", model);
        }
    }
    Ok(())
}
