pub fn validate(cpu: u32, memory: u32) -> anyhow::Result<()> {
    match sgtm_core::validate(cpu, memory) {
        Ok(()) => {
            println!("✓ {cpu} CPU units / {memory} MiB is a supported Fargate tier");
            Ok(())
        }
        Err(e) => {
            eprintln!("Validation failed: {e}");
            Err(e.into())
        }
    }
}
