//! A function: a signature plus the dataflow graph and layout that describe
//! its body.

use crate::dfg::DataFlowGraph;
use crate::entities::Block;
use crate::layout::Layout;
use crate::types::Type;

/// The parameter and return types of a function, along with per-parameter
/// attributes the rewriter cares about.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Option<Type>,
    /// Whether each parameter is marked pass-by-value on the device side.
    /// Empty for host-side functions, where the attribute is meaningless.
    pub by_val: Vec<bool>,
}

impl Signature {
    pub fn new(params: Vec<Type>, ret: Option<Type>) -> Self {
        let by_val = vec![false; params.len()];
        Signature {
            params,
            ret,
            by_val,
        }
    }
}

/// One function: its name, signature, and body.
#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub dfg: DataFlowGraph,
    pub layout: Layout,
}

impl Function {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Function {
            name: name.into(),
            signature,
            dfg: DataFlowGraph::new(),
            layout: Layout::new(),
        }
    }

    /// Allocate a new block and append it to the function.
    pub fn create_block(&mut self) -> Block {
        let block = self.dfg.make_block();
        self.layout.append_block(block);
        block
    }

    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.layout.blocks()
    }
}
