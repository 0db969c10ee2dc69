use clap::Subcommand;
use stashweek_core::{allocate, Config, Direction, SchedulePreview, TEMPLATES};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List built-in templates with their first/last week amounts
    List,
}

pub fn run(action: CatalogAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CatalogAction::List => {
            let config = Config::load_or_default();
            let params = config.engine.template_params();
            let mut entries = Vec::with_capacity(TEMPLATES.len());
            for template in TEMPLATES {
                let amounts = allocate(
                    template.target_amount,
                    template.total_weeks,
                    Direction::Standard,
                    &params,
                )?;
                entries.push(serde_json::json!({
                    "template": template,
                    "preview": SchedulePreview::from_schedule(&amounts),
                    "target": config.display.format_amount(template.target_amount),
                }));
            }
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}
