use companion_config::Config;

/// Strategy for initializing the configuration.
///
/// This strategy creates the default configuration file at `~/companion/config.json`.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let path = Config::create_config()?;
        println!("Created {}", path.display());
        Ok(())
    }
}
