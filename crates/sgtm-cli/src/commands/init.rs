use std::path::Path;

use anyhow::bail;
use sgtm_core::StackFile;
use sgtm_core::config::DEFAULT_STACK_NAME;

use super::CONFIG_FILE;

pub fn init(path: &str, name: Option<&str>) -> anyhow::Result<()> {
    let output = Path::new(path).join(CONFIG_FILE);
    if output.exists() {
        bail!("{} already exists", output.display());
    }

    let file = StackFile::scaffold(name.unwrap_or(DEFAULT_STACK_NAME));
    std::fs::write(&output, file.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    println!("  Set [context].containerConfig before running `sgtm synth`.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_scaffold() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path().to_str().unwrap(), Some("gtm-staging")).unwrap();

        let file = StackFile::from_file(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(file.stack.name, "gtm-staging");
        assert_eq!(file.context().unwrap().get("mem"), Some("512"));
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "# mine\n").unwrap();

        assert!(init(dir.path().to_str().unwrap(), None).is_err());
        let content = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# mine\n");
    }
}
