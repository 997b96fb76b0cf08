use serde_json::{Value, json};
use sgtm_core::tiers::{self, MemoryOptions, Tier};

pub fn tiers(format: &str) -> anyhow::Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&tiers_json())?);
        }
        _ => {
            print!("{}", format_table());
        }
    }

    Ok(())
}

fn describe(tier: &Tier) -> String {
    match tier.memory {
        MemoryOptions::List(values) => values
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        MemoryOptions::Stepped { min, max, step } => format!("{min} – {max} (step {step})"),
    }
}

pub fn format_table() -> String {
    let mut out = format!("{:<8} {:<6} {}\n", "CPU", "vCPU", "Memory (MiB)");
    for tier in tiers::tiers() {
        let vcpu = f64::from(tier.cpu) / 1024.0;
        out.push_str(&format!("{:<8} {:<6} {}\n", tier.cpu, vcpu, describe(tier)));
    }
    out
}

pub fn tiers_json() -> Value {
    tiers::tiers()
        .map(|tier| {
            json!({
                "cpu": tier.cpu,
                "memory": tier.memory.values(),
            })
        })
        .collect()
}
