//! Verb implementations (§6 CLI surface), grounded on `rustic-rs`'s
//! `commands.rs` for the overall "parse config, dispatch, exit non-zero on
//! error" shape. Each verb wires the reference Newick parser, the
//! reference in-memory index and a result emitter around
//! [`cassis_core`]'s driver functions.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use cassis_core::{
    bgrt_io, run_build_bgrt, run_one_pass, run_process_bgrt, Bgrt, BgrtParams, CassisTree, Id, NameMap, SequenceIndex,
    SortedIdSet, ThermoEnvironment, Thermodynamics, TreeSpec,
};
use log::{info, warn};

use crate::cli::{Command, CreateArgs, IndexBackend, InfoArgs, OnepassArgs, ProcessArgs, ThermoOptions};
use crate::emit::OutputFormat;
use crate::naive_index::NaiveIndex;

pub fn execute(command: Command) -> Result<()> {
    match command {
        Command::Onepass(args) => onepass(*args),
        Command::Create(args) => create(*args),
        Command::Process(args) => process(*args),
        Command::Info(args) => info_cmd(&args),
    }
}

fn check_index_backend(backend: IndexBackend) -> Result<()> {
    match backend {
        IndexBackend::Minipt => Ok(()),
        IndexBackend::Arbpt | IndexBackend::Ptpan => {
            bail!("--index {backend:?} is not built into this reference CLI; only minipt's in-memory stand-in is wired up")
        }
    }
}

fn parse_tree(path: &Path) -> Result<TreeSpec> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading tree file {}", path.display()))?;
    crate::newick::parse(&text).with_context(|| format!("parsing tree file {}", path.display()))
}

fn build_thermo(opts: &ThermoOptions) -> Thermodynamics {
    let mut thermo = Thermodynamics::new(ThermoEnvironment::default());
    if let Some((min, max)) = opts.gc {
        thermo.enable_gc_check(min, max);
    }
    if let Some((min, max)) = opts.temp {
        thermo.enable_tm_check(min, max);
    }
    thermo
}

/// Load every `--seq` file's records into `index`, resolving each record's
/// name to an `Id` via `resolve`. Records whose name cannot be resolved
/// are skipped with a warning (§7: unmapped organisms are non-fatal).
fn load_sequences(paths: &[std::path::PathBuf], index: &mut impl SequenceIndex, mut resolve: impl FnMut(&str) -> Id) -> Result<()> {
    for path in paths {
        let file = File::open(path).with_context(|| format!("opening sequence file {}", path.display()))?;
        let records = crate::fasta::read_all(BufReader::new(file)).with_context(|| format!("parsing FASTA file {}", path.display()))?;
        for record in records {
            let id = resolve(&record.name);
            if id.is_undef() {
                warn!("{}: organism {:?} is not in the tree, skipping", path.display(), record.name);
                continue;
            }
            index.add_sequence(&record.sequence, id);
        }
    }
    index.compute_index();
    Ok(())
}

fn write_results(tree: &CassisTree, names: &NameMap, groups: &NameMap, out: OutputFormat, out_path: &Path) -> Result<()> {
    match out {
        OutputFormat::Classic => crate::emit::write_classic(tree, names, groups, out_path)?,
        OutputFormat::Detailed => crate::emit::write_detailed(tree, names, groups, out_path)?,
        OutputFormat::Text => crate::emit::write_text(tree, names, groups, out_path)?,
    }
    Ok(())
}

fn onepass(args: OnepassArgs) -> Result<()> {
    check_index_backend(args.index.index)?;
    let spec = parse_tree(&args.tree)?;
    let mut names = NameMap::new();
    let mut groups = NameMap::new();
    let mut tree = CassisTree::build(&spec, args.outgroup.og, &mut names, &mut groups)?;

    let mut index = NaiveIndex::new();
    load_sequences(&args.seq, &mut index, |name| names.id_of(name).unwrap_or(Id::UNDEF))?;

    let thermo = build_thermo(&args.thermo);
    let match_opts = args.index.to_match_options(args.par);
    run_one_pass(&mut index, &thermo, &mut tree, &match_opts)?;

    write_results(&tree, &names, &groups, args.out, &args.out_path)?;
    info!("onepass: wrote results to {}", args.out_path.display());
    Ok(())
}

fn create(args: CreateArgs) -> Result<()> {
    check_index_backend(args.index.index)?;
    let mut names = NameMap::new();
    let mut index = NaiveIndex::new();
    load_sequences(&args.seq, &mut index, |name| names.append(name))?;

    let thermo = build_thermo(&args.thermo);
    let match_opts = args.index.to_match_options(1);
    let (min_gc, max_gc) = args.thermo.gc.unwrap_or((0.0, 0.0));
    let (min_temp, max_temp) = args.thermo.temp.unwrap_or((0.0, 0.0));
    let mut bgrt = Bgrt::new(BgrtParams {
        base4_compressed: false,
        num_species: names.len() as u32,
        ingroup_mismatch_distance: match_opts.mismatches,
        outgroup_mismatch_distance: match_opts.outgroup_mismatch_distance,
        min_len: match_opts.min_len,
        max_len: match_opts.max_len,
        min_gc: min_gc as f32,
        max_gc: max_gc as f32,
        min_temp: min_temp as f32,
        max_temp: max_temp as f32,
        comment: String::new(),
    });
    run_build_bgrt(&mut index, &thermo, &mut bgrt, &match_opts)?;

    let mut out = File::create(&args.bgrt).with_context(|| format!("creating BGRT file {}", args.bgrt.display()))?;
    bgrt_io::write(&bgrt, &names, &mut out)?;
    info!("create: wrote BGRT with {} nodes to {}", bgrt.num_nodes(), args.bgrt.display());
    Ok(())
}

/// Rebuild `bgrt` in `tree_names`'s id space: a BGRT saved by `create` was
/// built against its own name map, independent of whichever tree it is
/// later `process`ed against, so ids have to be reconciled by organism
/// name before the traversal (which assumes one shared id space) can run.
fn retarget_bgrt(bgrt: &Bgrt, bgrt_names: &NameMap, tree_names: &NameMap) -> Result<Bgrt> {
    let mut out = Bgrt::new(BgrtParams { num_species: tree_names.len() as u32, ..bgrt.params.clone() });
    for handle in 0..bgrt.num_nodes() as cassis_core::NodeHandle {
        let node = bgrt.node(handle);
        if node.signatures().is_empty() {
            continue;
        }
        let full_species = bgrt.path_union(handle);
        let mut translated = SortedIdSet::new();
        for id in full_species.iter() {
            let name = bgrt_names.name_of(id);
            let mapped = tree_names.id_of(name).with_context(|| format!("organism {name:?} from the BGRT is not present in the tree"))?;
            translated.insert(mapped);
        }
        out.insert_many(node.signatures().to_vec(), translated, node.supposed_outgroup_matches().to_vec())?;
    }
    Ok(out)
}

fn process(args: ProcessArgs) -> Result<()> {
    let mut bgrt_file = File::open(&args.bgrt).with_context(|| format!("opening BGRT file {}", args.bgrt.display()))?;
    let (bgrt, bgrt_names) = bgrt_io::read(&mut bgrt_file)?;

    let spec = parse_tree(&args.tree)?;
    let mut tree_names = NameMap::new();
    let mut tree_groups = NameMap::new();
    let mut tree = CassisTree::build(&spec, args.outgroup.og, &mut tree_names, &mut tree_groups)?;

    let mut retargeted = retarget_bgrt(&bgrt, &bgrt_names, &tree_names)?;
    run_process_bgrt(&mut retargeted, &mut tree, args.par);

    write_results(&tree, &tree_names, &tree_groups, args.out, &args.out_path)?;
    info!("process: wrote results to {}", args.out_path.display());
    Ok(())
}

fn info_cmd(args: &InfoArgs) -> Result<()> {
    let mut file = File::open(&args.bgrt).with_context(|| format!("opening BGRT file {}", args.bgrt.display()))?;
    let (bgrt, names) = bgrt_io::read(&mut file)?;
    let p = &bgrt.params;
    println!("species:                  {}", p.num_species);
    println!("base4 compressed:         {}", p.base4_compressed);
    println!("ingroup mismatch distance: {}", p.ingroup_mismatch_distance);
    println!("outgroup mismatch distance: {}", p.outgroup_mismatch_distance);
    println!("length range:             {}-{}", p.min_len, p.max_len);
    println!("G+C range:                {}-{}", p.min_gc, p.max_gc);
    println!("temperature range:        {}-{}", p.min_temp, p.max_temp);
    println!("comment:                  {:?}", p.comment);
    println!("organisms:                {}", names.len());
    println!("BGRT nodes:               {}", bgrt.num_nodes());
    Ok(())
}

