// `coreport acronyms` — expand security acronyms.

use clap::Args;
use coreport_client::acronyms::load_acronym_map;
use coreport_client::ClientConfig;
use coreport_common::acronym::{AcronymMap, Expansion};
use serde::Serialize;

use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct AcronymsArgs {
    /// Acronyms to look up (case-insensitive).
    #[arg(required = true)]
    words: Vec<String>,

    /// Skip the remote table even when one is configured.
    #[arg(long)]
    builtin_only: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct LookupResult {
    acronym: String,
    expansions: Vec<Expansion>,
}

pub fn run(args: AcronymsArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let map = if args.builtin_only {
        AcronymMap::builtin()
    } else {
        let config = ClientConfig::load();
        block_on(async move { Ok(load_acronym_map(&config).await) })?
    };

    let results = lookup_all(&map, &args.words);
    output::print_output(format, &results, |results| format_human(results))?;
    Ok(())
}

fn lookup_all(map: &AcronymMap, words: &[String]) -> Vec<LookupResult> {
    words
        .iter()
        .map(|word| LookupResult { acronym: word.clone(), expansions: map.lookup(word).to_vec() })
        .collect()
}

fn format_human(results: &[LookupResult]) -> String {
    let mut lines = Vec::new();
    for result in results {
        if result.expansions.is_empty() {
            lines.push(format!("{}: (unknown)", result.acronym));
            continue;
        }
        for expansion in &result.expansions {
            match &expansion.category {
                Some(category) => {
                    lines.push(format!("{}: {} [{category}]", result.acronym, expansion.text))
                }
                None => lines.push(format!("{}: {}", result.acronym, expansion.text)),
            }
        }
    }
    lines.join("\n")
}
