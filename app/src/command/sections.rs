use super::init_common_components;

/// Strategy for listing the sections, their example prompts and how much
/// history each one holds.
#[derive(Debug, Clone, Copy)]
pub struct SectionsStrategy;

impl super::CommandStrategy for SectionsStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components(false).await?;
        let controller = &common.controller;
        let active = controller.active_section().await;

        for section in controller.catalog().iter() {
            let marker = if active.as_deref() == Some(section.id.as_str()) {
                "*"
            } else {
                " "
            };
            let count = controller.snapshot(&section.id).await.len();
            println!("{marker} {:<10} {} ({count} messages)", section.id, section.name);
            for example in &section.example_queries {
                println!("      e.g. {example}");
            }
        }
        Ok(())
    }
}
