//! Result emitters (§6 "Result outputs"): classic/detailed CSV and
//! per-node text. Grounded on `classic_csv.cpp`'s `dump2ClassicCSV`, with
//! the comma-separated-signatures semantics the original intended rather
//! than the concatenation bug spec.md's design notes call out.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use cassis_core::{CassisTree, NameMap, TreeHandle};

/// Choice of result emitter, one per `--out` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// `result_array.csv` (per-node coverage matrix) plus one
    /// `results_<k>.csv` per outgroup count, as the original CLI wrote.
    Classic,
    /// A single CSV with one row per node, all outgroup counts inline.
    Detailed,
    /// One text file per tree node that has any signatures at all.
    Text,
}

fn node_name(tree: &CassisTree, names: &NameMap, groups: &NameMap, handle: TreeHandle) -> String {
    let node = tree.node(handle);
    if node.is_leaf() {
        names.name_of(node.this_id()).to_owned()
    } else {
        groups.name_of(node.this_id()).to_owned()
    }
}

fn quote_csv(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Write the classic two-file-family CSV output into `dir`: a
/// `result_array.csv` coverage matrix and one `results_<k>.csv` listing
/// signatures, for `k` in `0..=tree.k()`.
pub fn write_classic(tree: &CassisTree, names: &NameMap, groups: &NameMap, dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;

    let mut array_csv = String::from("ID");
    for handle in 0..tree.num_nodes() as TreeHandle {
        write!(array_csv, ",{}", quote_csv(&node_name(tree, names, groups, handle))).unwrap();
    }
    array_csv.push_str("\nSize");
    for handle in 0..tree.num_nodes() as TreeHandle {
        write!(array_csv, ",{}", tree.node(handle).group().len()).unwrap();
    }
    array_csv.push('\n');
    for k in 0..=tree.k() {
        write!(array_csv, "Outgrp.={k}").unwrap();
        for handle in 0..tree.num_nodes() as TreeHandle {
            write!(array_csv, ",{}", tree.node(handle).num_matches()[k as usize]).unwrap();
        }
        array_csv.push('\n');
    }
    File::create(dir.join("result_array.csv"))?.write_all(array_csv.as_bytes())?;

    for k in 0..=tree.k() {
        let mut csv = String::from("Index,ID,Size,Ingroup,Signatures...\n");
        for handle in 0..tree.num_nodes() as TreeHandle {
            let node = tree.node(handle);
            let signatures = node.signatures_at(k as usize);
            if signatures.is_empty() {
                continue;
            }
            write!(
                csv,
                "{},{},{},{}",
                handle,
                quote_csv(&node_name(tree, names, groups, handle)),
                node.group().len(),
                node.num_matches()[k as usize],
            )
            .unwrap();
            for sig in signatures {
                write!(csv, ",{sig}").unwrap();
            }
            csv.push('\n');
        }
        File::create(dir.join(format!("results_{k}.csv")))?.write_all(csv.as_bytes())?;
    }
    Ok(())
}

/// Write a single CSV with one row per node and every outgroup count's
/// coverage plus signatures inline (semicolon-joined within a cell).
pub fn write_detailed(tree: &CassisTree, names: &NameMap, groups: &NameMap, path: &Path) -> io::Result<()> {
    let mut csv = String::from("Index,ID,Size");
    for k in 0..=tree.k() {
        write!(csv, ",Ingroup[{k}],Signatures[{k}]").unwrap();
    }
    csv.push('\n');
    for handle in 0..tree.num_nodes() as TreeHandle {
        let node = tree.node(handle);
        write!(csv, "{},{},{}", handle, quote_csv(&node_name(tree, names, groups, handle)), node.group().len()).unwrap();
        for k in 0..=tree.k() {
            let sigs: Vec<&str> = node.signatures_at(k as usize).iter().map(|s| s.as_ref()).collect();
            write!(csv, ",{},{}", node.num_matches()[k as usize], quote_csv(&sigs.join(";"))).unwrap();
        }
        csv.push('\n');
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    File::create(path)?.write_all(csv.as_bytes())
}

/// Write one text file per node that has at least one signature at any
/// outgroup count, named `node_<index>.txt` inside `dir`.
pub fn write_text(tree: &CassisTree, names: &NameMap, groups: &NameMap, dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for handle in 0..tree.num_nodes() as TreeHandle {
        let node = tree.node(handle);
        if (0..=tree.k()).all(|k| node.signatures_at(k as usize).is_empty()) {
            continue;
        }
        let mut text = format!("node: {}\nsize: {}\n", node_name(tree, names, groups, handle), node.group().len());
        for k in 0..=tree.k() {
            let signatures = node.signatures_at(k as usize);
            if signatures.is_empty() {
                continue;
            }
            writeln!(text, "outgroup={k} ingroup={}", node.num_matches()[k as usize]).unwrap();
            for sig in signatures {
                writeln!(text, "  {sig}").unwrap();
            }
        }
        File::create(dir.join(format!("node_{handle}.txt")))?.write_all(text.as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cassis_core::{Id, TreeSpec};

    fn leaf(name: &str) -> TreeSpec {
        TreeSpec::Leaf { name: name.to_owned(), branch_length: 1.0 }
    }

    fn internal(left: TreeSpec, right: TreeSpec) -> TreeSpec {
        TreeSpec::Internal { left: Box::new(left), right: Box::new(right), name: None, branch_length: 1.0 }
    }

    fn sample_tree() -> (CassisTree, NameMap, NameMap) {
        let spec = TreeSpec::Internal {
            left: Box::new(internal(leaf("A"), leaf("B"))),
            right: Box::new(internal(leaf("C"), leaf("D"))),
            name: Some("root".to_owned()),
            branch_length: 1.0,
        };
        let mut names = NameMap::new();
        let mut groups = NameMap::new();
        let mut tree = CassisTree::build(&spec, 0, &mut names, &mut groups).unwrap();
        let mut ids = cassis_core::SortedIdSet::new();
        ids.insert(Id::from_index(0));
        ids.insert(Id::from_index(1));
        tree.add_matching("AAAA", &ids, 0).unwrap();
        (tree, names, groups)
    }

    #[test]
    fn classic_output_contains_expected_rows() {
        let (tree, names, groups) = sample_tree();
        let dir = tempfile::tempdir().unwrap();
        write_classic(&tree, &names, &groups, dir.path()).unwrap();
        let array = std::fs::read_to_string(dir.path().join("result_array.csv")).unwrap();
        assert!(array.starts_with("ID,"));
        assert!(array.contains("Size,"));
        assert!(array.contains("Outgrp.=0,"));
        assert!(array.contains("root")); // internal node's group name is emitted

        let results0 = std::fs::read_to_string(dir.path().join("results_0.csv")).unwrap();
        assert!(results0.contains(",AAAA")); // comma before the signature column
        assert!(!results0.contains("2AAAA")); // not concatenated without a separator
    }

    #[test]
    fn detailed_output_is_one_file() {
        let (tree, names, groups) = sample_tree();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detailed.csv");
        write_detailed(&tree, &names, &groups, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("AAAA"));
    }

    #[test]
    fn text_output_skips_empty_nodes() {
        let (tree, names, groups) = sample_tree();
        let dir = tempfile::tempdir().unwrap();
        write_text(&tree, &names, &groups, dir.path()).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(!entries.is_empty());
    }
}
