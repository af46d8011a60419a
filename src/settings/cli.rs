use super::Parser;

#[derive(Parser, Debug)]
pub struct Cli {
    /// Settings file, without extension. Defaults to `settings/dev` in debug builds.
    #[arg(long)]
    pub settings: Option<String>,

    /// Overrides `http.address` from the settings file.
    #[arg(long)]
    pub address: Option<String>,
}
