use anyhow::Result;
use clap::Args;
use legato::config::Config;
use legato_core::{Axis, KinematicsContext};
use std::path::PathBuf;

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the machine configuration (TOML or JSON).
    pub config: PathBuf,
}

impl CheckArgs {
    pub fn run(&self) -> Result<()> {
        let config = Config::from_file(&self.config)?;
        let ctx = config.context()?;

        tracing::info!("configuration {} is valid", self.config.display());
        print!("{}", summary(&ctx));
        Ok(())
    }
}

fn summary(ctx: &KinematicsContext) -> String {
    let mut out = format!("kinematics: {}\ntool: {}\n", ctx.mode(), ctx.tool());
    for axis in Axis::ALL.into_iter().filter(|a| ctx.is_active(*a)) {
        let settings = ctx.settings(axis);
        out.push_str(&format!(
            "axis {axis}: {} steps/unit, soft limits [{}, {}], backlash {}\n",
            ctx.steps_per_unit()[axis.index()],
            settings.soft_min,
            settings.soft_max,
            settings.backlash,
        ));
    }
    for (slave, master) in ctx.slaves() {
        out.push_str(&format!("slave {slave} follows {master}\n"));
    }
    if ctx.bed().is_identity() {
        out.push_str("bed: level\n");
    } else {
        out.push_str(&format!("bed: {}\n", ctx.bed().to_string().replace('\n', " ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_active_axes() {
        let config = Config::from_toml(
            r#"
[machine]
kinematics = 2

[axes.x]
steps_per_unit = 100.0

[axes.e]
steps_per_unit = 50.0
"#,
        )
        .unwrap();
        let text = summary(&config.context().unwrap());
        assert!(text.starts_with("kinematics: core-xy\ntool: E\n"));
        assert!(text.contains("axis X: 100 steps/unit"));
        assert!(text.contains("axis E: 50 steps/unit"));
        assert!(!text.contains("axis Y"));
        assert!(text.ends_with("bed: level\n"));
    }
}
