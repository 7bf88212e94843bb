//! `clap::Parser` derive tree for the four CLI verbs (§6), with flattened
//! option groups mirroring `rustic_core::repository::RepositoryOptions`'s
//! shape: each verb only flattens the option groups it actually needs.

use cassis_core::MatchOptions;
use clap::{Args, Parser, Subcommand};

use crate::emit::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "cassis", version, about = "Comprehensive and Sensitive Signature Search")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity; repeatable (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enumerate, filter and match candidate signatures directly into a tree.
    Onepass(Box<OnepassArgs>),
    /// Build a BGRT from sequence input and save it to a file.
    Create(Box<CreateArgs>),
    /// Replay a saved BGRT against a tree, producing results.
    Process(Box<ProcessArgs>),
    /// Print the parameters embedded in a BGRT file.
    Info(InfoArgs),
}

/// G+C content and melting-temperature acceptance ranges (`--gc`, `--temp`).
#[derive(Debug, Args, Clone, Copy)]
pub struct ThermoOptions {
    /// Inclusive G+C% range, e.g. `30-70`.
    #[arg(long, value_parser = parse_range_f64)]
    pub gc: Option<(f64, f64)>,
    /// Inclusive melting-temperature range in °C, e.g. `50-65`.
    #[arg(long, value_parser = parse_range_f64)]
    pub temp: Option<(f64, f64)>,
}

/// Signature length and mismatch parameters shared by matching and
/// enumeration (`--len`, `--mm`, `--dist`, `--index`, `--all`, `--rc`, `--wm`).
#[derive(Debug, Args, Clone)]
pub struct IndexOptions {
    /// Inclusive signature-length range, e.g. `15-25`.
    #[arg(long, value_parser = parse_range_u32, default_value = "18-18")]
    pub len: (u32, u32),
    /// Treat sequences as RNA (U instead of T).
    #[arg(long)]
    pub rna: bool,
    /// Mismatches tolerated for an ingroup hit.
    #[arg(long, default_value_t = 0)]
    pub mm: u32,
    /// Mismatch distance up to which a hit counts as "supposed outgroup".
    #[arg(long, default_value_t = 0)]
    pub dist: u32,
    /// Index backend to use.
    #[arg(long, value_enum, default_value = "minipt")]
    pub index: IndexBackend,
    /// Enumerate every possible oligonucleotide instead of streaming only
    /// candidates the index already knows about.
    #[arg(long)]
    pub all: bool,
    /// Reject a candidate whose reverse complement hits organisms the
    /// forward strand didn't.
    #[arg(long)]
    pub rc: bool,
    /// Use the index's weighted-mismatch scoring instead of plain Hamming distance.
    #[arg(long)]
    pub wm: bool,
}

/// The reference index backend named by `--index`; only `minipt`'s
/// reference implementation ([`crate::naive_index::NaiveIndex`]) is
/// actually wired up, the others are accepted for CLI-compatibility and
/// rejected at runtime with a clear message (§1: not in scope here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IndexBackend {
    Minipt,
    Arbpt,
    Ptpan,
}

/// Outgroup budget (`--og K`).
#[derive(Debug, Args, Clone, Copy)]
pub struct OutgroupOptions {
    /// Maximum outgroup hits tolerated when considering a signature for a node.
    #[arg(long, default_value_t = 0)]
    pub og: u32,
}

#[derive(Debug, Args)]
pub struct OnepassArgs {
    /// Newick tree file.
    #[arg(long)]
    pub tree: std::path::PathBuf,
    /// Sequence input file(s); repeatable.
    #[arg(long, required = true)]
    pub seq: Vec<std::path::PathBuf>,
    #[command(flatten)]
    pub thermo: ThermoOptions,
    #[command(flatten)]
    pub index: IndexOptions,
    #[command(flatten)]
    pub outgroup: OutgroupOptions,
    /// Result emitter.
    #[arg(long, value_enum, default_value = "classic")]
    pub out: OutputFormat,
    /// Output directory (classic/text) or file (detailed).
    #[arg(long, default_value = ".")]
    pub out_path: std::path::PathBuf,
    /// Worker count for the (currently unused by one-pass) parallel path.
    #[arg(long, default_value_t = 1)]
    pub par: usize,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Output BGRT file.
    #[arg(long)]
    pub bgrt: std::path::PathBuf,
    /// Sequence input file(s); repeatable.
    #[arg(long, required = true)]
    pub seq: Vec<std::path::PathBuf>,
    #[command(flatten)]
    pub thermo: ThermoOptions,
    #[command(flatten)]
    pub index: IndexOptions,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Input BGRT file.
    #[arg(long)]
    pub bgrt: std::path::PathBuf,
    /// Newick tree file.
    #[arg(long)]
    pub tree: std::path::PathBuf,
    #[command(flatten)]
    pub outgroup: OutgroupOptions,
    /// Result emitter.
    #[arg(long, value_enum, default_value = "classic")]
    pub out: OutputFormat,
    /// Output directory (classic/text) or file (detailed).
    #[arg(long, default_value = ".")]
    pub out_path: std::path::PathBuf,
    /// Worker count for the traversal; `<= 1` runs sequentially.
    #[arg(long, default_value_t = 1)]
    pub par: usize,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input BGRT file.
    #[arg(long)]
    pub bgrt: std::path::PathBuf,
}

fn parse_range_f64(s: &str) -> Result<(f64, f64), String> {
    let (min, max) = s.split_once('-').ok_or_else(|| format!("expected MIN-MAX, found {s:?}"))?;
    let min: f64 = min.parse().map_err(|_| format!("not a number: {min:?}"))?;
    let max: f64 = max.parse().map_err(|_| format!("not a number: {max:?}"))?;
    Ok((min, max))
}

fn parse_range_u32(s: &str) -> Result<(u32, u32), String> {
    let (min, max) = s.split_once('-').ok_or_else(|| format!("expected MIN-MAX, found {s:?}"))?;
    let min: u32 = min.parse().map_err(|_| format!("not a number: {min:?}"))?;
    let max: u32 = max.parse().map_err(|_| format!("not a number: {max:?}"))?;
    Ok((min, max))
}

impl IndexOptions {
    /// Project these CLI flags into the driver's [`MatchOptions`];
    /// `workers` comes from the verb's own `--par`. Note `--og` is not a
    /// matching parameter: it sizes the outgroup-budget dimension of the
    /// tree/traversal (`CassisTree::build`'s `k`), not a filter applied
    /// per-candidate.
    pub fn to_match_options(&self, workers: usize) -> MatchOptions {
        MatchOptions {
            min_len: self.len.0,
            max_len: self.len.1,
            is_rna: self.rna,
            mismatches: self.mm,
            outgroup_mismatch_distance: self.dist,
            use_weighted: self.wm,
            reject_reverse_complement_hits: self.rc,
            enumerate_all: self.all,
            workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_onepass_with_repeated_seq() {
        let cli = Cli::parse_from([
            "cassis", "onepass", "--tree", "t.nwk", "--seq", "a.fa", "--seq", "b.fa", "--len", "18-20", "--gc", "30-70",
        ]);
        let Command::Onepass(args) = cli.command else { panic!("expected onepass") };
        assert_eq!(args.seq.len(), 2);
        assert_eq!(args.index.len, (18, 20));
        assert_eq!(args.thermo.gc, Some((30.0, 70.0)));
    }
}
