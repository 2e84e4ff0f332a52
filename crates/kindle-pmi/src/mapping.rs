/// KVS key under which the clique descriptor is published.
pub const PROCESS_MAPPING_KEY: &str = "PMI_process_mapping";

/// A run of `nodes` consecutive nodes starting at `nodeid`, each hosting `procs` ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapBlock {
    pub nodeid: u32,
    pub nodes: u32,
    pub procs: u32,
}

impl MapBlock {
    /// Every rank on one node.
    pub fn single_node(procs: u32) -> Self {
        Self {
            nodeid: 0,
            nodes: 1,
            procs,
        }
    }
}

/// Encode blocks in the `(vector,(nodeid,nodes,procs),...)` form brokers expect.
pub fn encode_process_mapping(blocks: &[MapBlock]) -> String {
    let mut out = String::from("(vector");
    for b in blocks {
        out.push_str(&format!(",({},{},{})", b.nodeid, b.nodes, b.procs));
    }
    out.push(')');
    out
}
