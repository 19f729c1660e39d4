//! Generator-level particles
use itertools::izip;
use particle_id::ParticleID;
use petgraph::{
    prelude::DiGraph,
    visit::{EdgeRef, NodeIndexable},
    Direction::Outgoing,
};

use crate::error::ReadError;
use crate::momentum::FourMomentum;
use crate::objects::{Jet, Parton, TruthMatch};
use crate::record::Record;

pub(crate) const TRUTH_FIELDS: [&str; 9] = [
    "GENpt",
    "GENeta",
    "GENphi",
    "GENenergy",
    "GENid",
    "GENstatus",
    "GENparent_idx",
    "GENchild0_idx",
    "GENchild1_idx",
];

/// Matches large-radius jets to generator-level top quarks
pub trait TruthMatcher {
    fn match_jet(&self, jet: &Jet, partons: &[Parton]) -> TruthMatch;
}

/// Build the generator-level particles of a record
pub fn build_partons(record: &Record) -> Result<Vec<Parton>, ReadError> {
    const CATEGORY: &str = "truth";
    let pt = record.floats("GENpt")?;
    let n = pt.len();
    let floats = |name| record.aligned_floats(CATEGORY, name, n);
    let ints = |name| record.aligned_ints(CATEGORY, name, n);
    let columns = izip!(
        pt,
        floats("GENeta")?,
        floats("GENphi")?,
        floats("GENenergy")?,
        ints("GENid")?,
        ints("GENstatus")?,
        ints("GENparent_idx")?,
        ints("GENchild0_idx")?,
        ints("GENchild1_idx")?,
    );
    let partons = columns
        .enumerate()
        .map(|(index, (&pt, &eta, &phi, &e, &id, &status, &parent, &child0, &child1))| {
            // ids outside the i32 range are not valid PDG codes
            let id = ParticleID::new(i32::try_from(id).unwrap_or_default());
            Parton {
                p: FourMomentum::from_pt_eta_phi_e(pt, eta, phi, e),
                id,
                status,
                index,
                parent: to_index(parent, n),
                children: [to_index(child0, n), to_index(child1, n)],
                kind: id.into(),
            }
        })
        .collect();
    Ok(partons)
}

/// Negative indices mark missing relatives
fn to_index(idx: i64, len: usize) -> Option<usize> {
    usize::try_from(idx).ok().filter(|idx| *idx < len)
}

/// Decay graph of the generator record
///
/// Node `i` carries the index of parton `i`. Edges point from parent to
/// child and are weighted with the child slot (0 or 1).
pub fn decay_graph(partons: &[Parton]) -> DiGraph<usize, u8> {
    let mut g = DiGraph::with_capacity(partons.len(), 2 * partons.len());
    for parton in partons {
        g.add_node(parton.index);
    }
    for parton in partons {
        for (slot, child) in parton.children.iter().enumerate() {
            let Some(child) = child else { continue };
            let start = g.from_index(parton.index);
            let end = g.from_index(*child);
            g.add_edge(start, end, slot as u8);
        }
    }
    g
}

/// Neutrinos from W decays where both decay products are recorded
///
/// The first child slot is checked before the second.
pub fn w_neutrinos(partons: &[Parton]) -> Vec<&Parton> {
    let g = decay_graph(partons);
    let mut neutrinos = Vec::new();
    for w in partons.iter().filter(|p| p.kind.is_w) {
        let mut children: Vec<_> = g
            .edges_directed(g.from_index(w.index), Outgoing)
            .map(|e| (*e.weight(), g[e.target()]))
            .collect();
        if children.len() != 2 {
            continue;
        }
        children.sort_unstable();
        let nu = children
            .into_iter()
            .map(|(_, idx)| &partons[idx])
            .find(|child| child.kind.is_neutrino);
        neutrinos.extend(nu);
    }
    neutrinos
}
