use std::process::Command;

use anyhow::{Context, Result};

/// `(label, --no-default-features, --features)` combinations of rtcscope-infra
const FEATURE_COMBINATIONS: &[(&str, bool, &[&str])] = &[
    ("default", false, &[]),
    ("no-default", true, &[]),
    ("otlp-only", true, &["otlp"]),
];

/// Check that all required feature combinations compile and pass tests.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} rtcscope-infra feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, (label, no_default, features)) in FEATURE_COMBINATIONS.iter().enumerate() {
        let mut args = vec!["test", "-p", "rtcscope-infra"];
        if *no_default {
            args.push("--no-default-features");
        }
        let joined = features.join(",");
        if !features.is_empty() {
            args.push("--features");
            args.push(joined.as_str());
        }

        println!("\n[{}/{}] cargo {}", index + 1, FEATURE_COMBINATIONS.len(), args.join(" "));

        let status = Command::new("cargo")
            .args(&args)
            .status()
            .with_context(|| format!("Failed to run cargo test for '{label}'"))?;

        if !status.success() {
            anyhow::bail!("Feature combination '{label}' failed");
        }

        println!("✅ Features '{label}' passed");
    }

    println!("\n✅ All {} feature combinations pass!", FEATURE_COMBINATIONS.len());

    Ok(())
}
