use gatekeeper::settings::*;

fn main() -> anyhow::Result<()> {
    // Load settings from the default location
    let project_settings = parse_settings(None)?;
    println!("Loaded settings: {:?}", project_settings);

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // Environment overrides win over the file; secrets never show up in Debug output
    // $ GATEKEEPER__CAPTCHA__SECRET=0x123 cargo run --bin settings_demo -- --settings=settings/release
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!("Loaded settings: {:?}", project_settings);
    println!(
        "captcha secret configured: {}",
        !project_settings.captcha.secret.is_empty()
    );

    Ok(())
}
