use std::path::Path;

use anyhow::Context as _;
use sgtm_core::{StackFile, StackSettings};
use sgtm_stack::{GtmStack, ImageAsset, Template};
use tracing::info;

pub fn synth(config: &Path, overrides: &[String], out: Option<&Path>) -> anyhow::Result<()> {
    let template = render(config, overrides, std::env::vars())?;
    let json = template.to_json_string()?;

    match out {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("✓ Synthesized {} resources", template.len());
            println!("  Output: {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Resolve configuration and declare the stack into a fresh template.
///
/// Nothing is declared if any configuration check fails.
pub fn render<I>(config: &Path, overrides: &[String], vars: I) -> anyhow::Result<Template>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: Vec<(String, String)> = vars.into_iter().collect();

    let file = StackFile::from_file(config)
        .with_context(|| format!("failed to load {} (create one with `sgtm init`)", config.display()))?;
    let mut context = file.context()?;
    context.apply_env(vars.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    context.apply_overrides(overrides)?;

    let settings = StackSettings::resolve(&context)?;

    let base = config.parent().unwrap_or_else(|| Path::new("."));
    let asset = ImageAsset::fingerprint(&base.join(file.asset_dir()))?;
    info!(hash = %asset.hash, "container asset");

    let mut template = Template::new(
        format!("{} (server-side tag manager on Fargate)", file.stack.name),
        file.environment(vars),
    );
    GtmStack::new(&file.stack.name, &settings, &asset).declare(&mut template)?;

    Ok(template)
}
