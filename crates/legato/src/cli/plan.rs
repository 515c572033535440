use anyhow::{Context, Result};
use clap::Args;
use legato::{config::Config, moves::MovesFile, report::ReportSink};
use legato_core::Planner;
use std::{
    io::{self, Write},
    path::PathBuf,
};

#[derive(Args)]
pub struct PlanArgs {
    /// Path to the machine configuration (TOML or JSON).
    pub config: PathBuf,

    /// Path to the list of motion requests (TOML or JSON).
    pub moves: PathBuf,

    /// Pretty-print each segment instead of one JSON object per line.
    #[arg(long)]
    pub pretty: bool,
}

impl PlanArgs {
    pub fn run(&self) -> Result<()> {
        let config = Config::from_file(&self.config)?;
        let requests = MovesFile::from_file(&self.moves)?.requests()?;

        let ctx = config.context()?;
        let mut sink = ReportSink::new(&ctx);
        let mut planner = Planner::new(ctx);

        for (index, (request, homing)) in requests.iter().enumerate() {
            let submitted = if *homing {
                planner.submit_homing(request, &mut sink)
            } else {
                planner.submit(request, &mut sink)
            };
            submitted.with_context(|| format!("move #{} rejected", index + 1))?;
        }

        let reports = sink.into_reports();
        let contained = reports.iter().filter(|r| r.contained).count();
        tracing::info!(
            moves = requests.len(),
            segments = reports.len(),
            contained,
            "planning finished"
        );

        let stdout = io::stdout();
        let mut out = stdout.lock();
        for report in &reports {
            if self.pretty {
                serde_json::to_writer_pretty(&mut out, report)?;
            } else {
                serde_json::to_writer(&mut out, report)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
