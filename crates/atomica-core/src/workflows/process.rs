use super::config::ProcessConfig;
use super::error::ProcessError;
use super::index::IndexRow;
use super::progress::{Progress, ProgressReporter};
use crate::core::convert::blocks::{ChainBlocks, pdb_to_list_blocks};
use crate::core::convert::fragment::FragmentationMethod;
use crate::core::convert::ligand::{LigandQuery, extract_pdb_ligand};
use crate::core::graph::{GraphData, blocks_to_data};
use crate::core::interface::{Interface, blocks_interface};
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::core::models::block::Block;
use crate::core::models::pdb_index::PdbIndex;
use crate::core::models::structure::Model;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// One interface sample ready for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetItem {
    pub data: GraphData,
    pub id: String,
    /// Block index in `data` to source residue; the two global slots are absent.
    pub block_to_pdb_indexes: BTreeMap<usize, PdbIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<f64>,
}

/// Blocks of one side of a complex with index-aligned provenance keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockGroup {
    pub blocks: Vec<Block>,
    pub indexes: Vec<PdbIndex>,
}

impl BlockGroup {
    fn extend_from(&mut self, chain: ChainBlocks) {
        self.blocks.extend(chain.blocks);
        self.indexes.extend(chain.indexes);
    }
}

fn load_first_model(pdb_file: &Path) -> Result<Model, ProcessError> {
    let mut structure = PdbFile::read_from_path(pdb_file).map_err(|source| ProcessError::Pdb {
        path: pdb_file.to_path_buf(),
        source,
    })?;
    if structure.models.is_empty() {
        return Err(ProcessError::EmptyStructure(pdb_file.to_path_buf()));
    }
    Ok(structure.models.swap_remove(0))
}

fn joined(chains: &[char]) -> String {
    chains.iter().collect()
}

/// Splits per-chain blocks into two groups by the chain prefix of each chain's first
/// provenance key. Chains in neither group are dropped.
pub fn group_chains(chains: Vec<ChainBlocks>, group1: &[char], group2: &[char]) -> [BlockGroup; 2] {
    let mut groups = [BlockGroup::default(), BlockGroup::default()];
    for chain in chains {
        let Some(prefix) = chain.indexes.first().map(|idx| idx.chain().to_string()) else {
            continue;
        };
        let in_group = |group: &[char]| group.iter().any(|c| prefix == c.to_string());
        if in_group(group1) {
            groups[0].extend_from(chain);
        } else if in_group(group2) {
            groups[1].extend_from(chain);
        }
    }
    groups
}

/// Maps block positions of the graph to the retained provenance keys.
///
/// Position 0 and `N1 + 1` are the global blocks of the two segments; the retained
/// blocks of side 1 take `1..=N1` and those of side 2 take `N1 + 2..=N1 + N2 + 1`.
pub fn build_index_map(
    interface: &Interface,
    indexes1: &[PdbIndex],
    indexes2: &[PdbIndex],
) -> BTreeMap<usize, PdbIndex> {
    let n1 = interface.indexes_a.len();
    let side1 = interface
        .indexes_a
        .iter()
        .enumerate()
        .map(|(pos, &i)| (pos + 1, indexes1[i].clone()));
    let side2 = interface
        .indexes_b
        .iter()
        .enumerate()
        .map(|(pos, &i)| (n1 + 2 + pos, indexes2[i].clone()));
    side1.chain(side2).collect()
}

/// Builds the interface sample between two chain groups of a PDB file.
///
/// Returns `Ok(None)` when either side keeps no block within `dist_th`.
#[instrument(skip_all, name = "process_pdb", fields(pdb_id = pdb_id))]
pub fn process_pdb(
    pdb_file: &Path,
    pdb_id: &str,
    group1_chains: &[char],
    group2_chains: &[char],
    dist_th: f64,
) -> Result<Option<DatasetItem>, ProcessError> {
    let model = load_first_model(pdb_file)?;
    let requested: Vec<char> = group1_chains.iter().chain(group2_chains).copied().collect();
    let chains = pdb_to_list_blocks(&model, &requested);
    let [group1, group2] = group_chains(chains, group1_chains, group2_chains);

    let interface = blocks_interface(&group1.blocks, &group2.blocks, dist_th);
    if interface.is_empty() {
        debug!(dist_th, "No interface between chain groups.");
        return Ok(None);
    }

    let block_to_pdb_indexes = build_index_map(&interface, &group1.indexes, &group2.indexes);
    Ok(Some(DatasetItem {
        data: blocks_to_data(&interface.blocks_a, &interface.blocks_b),
        id: format!(
            "{}_{}_{}",
            pdb_id,
            joined(group1_chains),
            joined(group2_chains)
        ),
        block_to_pdb_indexes,
        label: None,
    }))
}

/// Builds one interface sample per occurrence of a ligand against the receptor chains.
///
/// Occurrences without an interface are skipped. Ids carry the occurrence number when
/// the ligand occurs more than once.
#[instrument(skip_all, name = "process_pl_pdb", fields(pdb_id = pdb_id, lig_code = ligand.code))]
pub fn process_pl_pdb(
    pdb_file: &Path,
    pdb_id: &str,
    receptor_chains: &[char],
    ligand: &LigandQuery,
    dist_th: f64,
    fragmentation: Option<FragmentationMethod>,
) -> Result<Vec<DatasetItem>, ProcessError> {
    let model = load_first_model(pdb_file)?;
    let candidates = extract_pdb_ligand(&model, ligand, fragmentation);

    let mut receptor = BlockGroup::default();
    for chain in pdb_to_list_blocks(&model, receptor_chains) {
        receptor.extend_from(chain);
    }

    let base_id = format!(
        "{}_{}_{}_{}",
        pdb_id,
        joined(receptor_chains),
        ligand.chain,
        ligand.code
    );
    let multiple = candidates.len() > 1;

    let mut items = Vec::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        let interface = blocks_interface(&receptor.blocks, &candidate.blocks, dist_th);
        if interface.is_empty() {
            debug!(candidate = idx, "Ligand occurrence has no interface.");
            continue;
        }
        let id = if multiple {
            format!("{}_{}", base_id, idx)
        } else {
            base_id.clone()
        };
        items.push(DatasetItem {
            data: blocks_to_data(&interface.blocks_a, &interface.blocks_b),
            id,
            block_to_pdb_indexes: build_index_map(
                &interface,
                &receptor.indexes,
                &candidate.indexes,
            ),
            label: None,
        });
    }
    Ok(items)
}

fn process_row(row: &IndexRow, config: &ProcessConfig) -> Result<Vec<DatasetItem>, ProcessError> {
    let group1 = row.group1_chains()?;

    let Some(lig_code) = row.ligand_code() else {
        let group2 = row.group2_chains()?;
        let item = process_pdb(&row.pdb_path, &row.pdb_id, &group1, &group2, config.dist_th)?;
        if item.is_none() {
            warn!(
                pdb_id = %row.pdb_id,
                chain1 = %row.chain1,
                chain2 = %row.chain2,
                "Invalid interface, no interface found."
            );
        }
        return Ok(item.into_iter().collect());
    };

    let query = LigandQuery {
        code: lig_code,
        chain: row.ligand_chain()?,
        smiles: row.ligand_smiles(),
        residue_number: row.lig_resi,
    };
    let items = process_pl_pdb(
        &row.pdb_path,
        &row.pdb_id,
        &group1,
        &query,
        config.dist_th,
        config.fragmentation_method,
    )?;
    match items.len() {
        0 => warn!(
            pdb_id = %row.pdb_id,
            chain1 = %row.chain1,
            chain2 = %row.chain2,
            lig_code,
            "Invalid interface, no ligand match with an interface."
        ),
        1 => {}
        n => warn!(
            pdb_id = %row.pdb_id,
            lig_code,
            count = n,
            "Multiple ligands match the description, adding all of them."
        ),
    }
    Ok(items)
}

/// Processes every row of a sample index in order.
///
/// Rows with a ligand code are protein-ligand samples, the rest chain-chain samples.
/// The row label is attached to every item the row produces. Rows without an
/// interface are skipped with a warning; malformed rows and unreadable files abort.
#[instrument(skip_all, name = "process_all_pdbs")]
pub fn process_all_pdbs(
    rows: &[IndexRow],
    config: &ProcessConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<DatasetItem>, ProcessError> {
    reporter.start_counted_phase("Processing structures", rows.len() as u64);
    info!(rows = rows.len(), dist_th = config.dist_th, "Processing sample index.");

    let mut items = Vec::new();
    for row in rows {
        let mut row_items = process_row(row, config)?;
        for item in &mut row_items {
            item.label = row.label;
        }
        items.extend(row_items);
        reporter.report(Progress::TaskIncrement);
    }

    reporter.finish_counted_phase(Some(format!(
        "Finished processing. Total items={}.",
        items.len()
    )));
    info!(items = items.len(), "Finished processing sample index.");
    Ok(items)
}
