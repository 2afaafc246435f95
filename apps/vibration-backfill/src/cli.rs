use clap::Parser;
use std::path::PathBuf;

use crate::window::BackfillPlan;

#[derive(Parser, Debug)]
#[command(
    name = "vibration-backfill",
    version,
    about = "Copy vibration sensor telemetry from CoNNXT into Lizard timeseries"
)]
pub struct Cli {
    /// Number of days to backfill, most recent first.
    #[arg(long, default_value_t = 9)]
    pub days: u32,
    /// Length of each fetched window in hours.
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..))]
    pub window_hours: u32,
    /// Day offset of the first (most recent) window.
    #[arg(long, default_value_t = 0)]
    pub start_offset: u32,
    /// Directory for the append-only run log (overrides BACKFILL_LOG_DIR).
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    pub fn plan(&self) -> BackfillPlan {
        BackfillPlan {
            days: self.days,
            window_hours: self.window_hours,
            start_offset: self.start_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_nine_day_daily_backfill() {
        let cli = Cli::try_parse_from(["vibration-backfill"]).expect("parsed");
        assert_eq!(cli.plan(), BackfillPlan::default());
        assert!(cli.log_dir.is_none());
    }

    #[test]
    fn flags_override_the_plan() {
        let cli = Cli::try_parse_from([
            "vibration-backfill",
            "--days",
            "3",
            "--window-hours",
            "6",
            "--start-offset",
            "2",
            "--log-dir",
            "/var/log/backfill",
        ])
        .expect("parsed");
        assert_eq!(
            cli.plan(),
            BackfillPlan {
                days: 3,
                window_hours: 6,
                start_offset: 2,
            }
        );
        assert_eq!(cli.log_dir, Some(PathBuf::from("/var/log/backfill")));
    }

    #[test]
    fn zero_hour_windows_are_rejected() {
        assert!(Cli::try_parse_from(["vibration-backfill", "--window-hours", "0"]).is_err());
    }
}
