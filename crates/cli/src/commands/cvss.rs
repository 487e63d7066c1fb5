// `coreport cvss` — score and normalize CVSS v4.0 vectors.

use clap::{Args, Subcommand};
use coreport_common::cvss::{CvssScore, CvssSelection};
use serde::Serialize;

use crate::output::{self, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum CvssCommand {
    /// Compute score, severity and macro vector
    Score(VectorArgs),
    /// Print the canonical form of a vector
    Normalize(VectorArgs),
}

#[derive(Debug, Args)]
pub struct VectorArgs {
    /// Vector string, e.g. CVSS:4.0/AV:N/AC:L/...
    vector: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Normalized {
    vector: String,
}

pub fn run(cmd: CvssCommand) -> anyhow::Result<()> {
    match cmd {
        CvssCommand::Score(args) => {
            let format = OutputFormat::detect(args.json);
            let selection = parse(&args, format)?;
            output::print_output(format, &CvssScore::from(&selection), format_score)?;
        }
        CvssCommand::Normalize(args) => {
            let format = OutputFormat::detect(args.json);
            let selection = parse(&args, format)?;
            output::print_output(format, &Normalized { vector: selection.vector() }, |n| {
                n.vector.clone()
            })?;
        }
    }
    Ok(())
}

fn parse(args: &VectorArgs, format: OutputFormat) -> anyhow::Result<CvssSelection> {
    CvssSelection::from_vector(args.vector.trim()).map_err(|error| {
        let error = anyhow::Error::new(error);
        output::print_anyhow_error(format, &error);
        error
    })
}

fn format_score(score: &CvssScore) -> String {
    format!(
        "{:.1} {} (macro vector {})\n{}",
        score.score,
        score.severity,
        score.macro_vector,
        score.vector
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_format_shows_score_severity_and_vector() {
        let selection = CvssSelection::from_vector(
            "CVSS:4.0/AV:N/AC:L/AT:N/PR:N/UI:N/VC:H/VI:H/VA:H/SC:N/SI:N/SA:N",
        )
        .unwrap();
        let rendered = format_score(&CvssScore::from(&selection));
        assert!(rendered.starts_with("9.3 Critical"));
        assert!(rendered.contains("000200"));
        assert!(rendered.ends_with("SA:N"));
    }

    #[test]
    fn zero_score_renders_one_decimal() {
        let selection = CvssSelection::from_vector(
            "CVSS:4.0/AV:N/AC:L/AT:N/PR:N/UI:N/VC:N/VI:N/VA:N/SC:N/SI:N/SA:N",
        )
        .unwrap();
        assert!(format_score(&CvssScore::from(&selection)).starts_with("0.0 None"));
    }
}
