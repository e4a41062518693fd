//! A minimal compilation-unit IR.
//!
//! This is not a general SSA IR: there are no values and no arithmetic.
//! It carries exactly the structure the four passes in this crate need —
//! functions, basic blocks, call/return instructions, debug locations,
//! signatures, and linkage — modeled with dense entity references the way
//! a real compiler IR would, so that passes key off `Block`/`Inst` handles
//! rather than re-walking strings.

use cranelift_entity::{entity_impl, PrimaryMap};

/// A basic block within a [`Function`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// An instruction within a [`Block`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A precise source location, the input to a call-site key
/// (`"file:line:col"`). Synthetic sites use [`DebugLoc::Pseudo`].
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum DebugLoc {
    /// A real source location.
    Real { file: String, line: u32, col: u32 },
    /// A sequential placeholder assigned by the Call-Site Analyzer when no
    /// real debug info is available. The wrapped number is the pseudo
    /// counter value, not a line number.
    Pseudo(u64),
}

impl DebugLoc {
    /// The `"file:line:col"` site key used to join call-site metadata back
    /// to a call instruction. Pseudo locations key on their counter value,
    /// which is unique per module and therefore still disjoint from real
    /// `file:line:col` strings as long as no file is literally named after
    /// a bare integer - true in practice, and assumed by the spec.
    pub fn site_key(&self) -> String {
        match self {
            DebugLoc::Real { file, line, col } => format!("{file}:{line}:{col}"),
            DebugLoc::Pseudo(n) => n.to_string(),
        }
    }
}

/// A 5-bit-coded primitive type, used by the Type Encoder (see
/// [`crate::encode`]). Kept separate from any notion of a "real" type
/// system: this crate never needs to do anything with a type except
/// encode it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeCode {
    Void,
    Int { bits: u32 },
    Half,
    Float,
    Double,
    ExtendedFloat,
    Pointer(Box<TypeCode>),
    Struct,
    Array,
    Other,
}

/// A function signature: parameters in order, plus a return type.
/// The Type Encoder never looks past the first 7 parameters (see
/// `encode::encode_function`).
#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub params: Vec<TypeCode>,
    pub ret: TypeCode,
}

impl Default for TypeCode {
    fn default() -> Self {
        TypeCode::Void
    }
}

/// Linkage, mirroring the subset of LLVM linkage kinds the reference
/// implementation distinguishes (external/weak vs. everything else).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Linkage {
    #[default]
    Internal,
    External,
    Weak,
}

/// The intended callee of a call instruction, as classified by the
/// front end before the Call-Site Analyzer sees it. The Analyzer's job is
/// to turn this into a [`crate::record::CallSiteRecord`]; this enum is the
/// input shape it's built from.
#[derive(Clone, Debug)]
pub enum Callee {
    /// A direct call to a known function symbol.
    Direct(String),
    /// A call through a `checked_vptr`-style front-end marker, with the
    /// set of possible virtual targets already resolved by CHA.
    Virtual { possible_targets: Vec<String> },
    /// A call through a function pointer value not resolvable at compile
    /// time.
    Indirect { signature: Signature },
    /// A tail call (return replaced by a sibling call).
    Tail(String),
}

/// One instruction. Only the two shapes the passes care about exist.
#[derive(Clone, Debug)]
pub enum InstData {
    Call {
        callee: Callee,
        debug_loc: Option<DebugLoc>,
    },
    Return,
}

/// A basic block: a straight-line sequence of instructions. No
/// terminator modeling beyond what the spec needs — control flow between
/// blocks belongs to the IR that owns the "real" backward edge we're
/// protecting, not to this IR. Call/return shape is everything.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    pub insts: Vec<Inst>,
}

/// One function in a [`Module`].
#[derive(Clone, Debug)]
pub struct Function {
    pub mangled_name: String,
    pub signature: Signature,
    pub linkage: Linkage,
    pub address_taken: bool,
    pub is_declaration: bool,
    blocks: PrimaryMap<Block, BlockData>,
    insts: PrimaryMap<Inst, InstData>,
    layout: Vec<Block>,
}

impl Function {
    pub fn new(mangled_name: impl Into<String>, signature: Signature) -> Self {
        Function {
            mangled_name: mangled_name.into(),
            signature,
            linkage: Linkage::Internal,
            address_taken: false,
            is_declaration: false,
            blocks: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            layout: Vec::new(),
        }
    }

    /// Append a new, empty block to the function's layout.
    pub fn create_block(&mut self) -> Block {
        let block = self.blocks.push(BlockData::default());
        self.layout.push(block);
        block
    }

    /// Append an instruction to the end of `block`.
    pub fn push_inst(&mut self, block: Block, data: InstData) -> Inst {
        let inst = self.insts.push(data);
        self.blocks[block].insts.push(inst);
        inst
    }

    pub fn inst(&self, inst: Inst) -> &InstData {
        &self.insts[inst]
    }

    pub fn inst_mut(&mut self, inst: Inst) -> &mut InstData {
        &mut self.insts[inst]
    }

    /// Iterate over every instruction in layout order, block by block.
    pub fn insts_in_layout_order(&self) -> impl Iterator<Item = Inst> + '_ {
        self.layout
            .iter()
            .flat_map(move |&b| self.blocks[b].insts.iter().copied())
    }

    /// All `Return` instructions in the function, in layout order. Callers
    /// collect this into a `Vec` up front before rewriting anything, per
    /// spec.md §4.D ("deferred, to avoid iterator invalidation") — even
    /// though this IR has no iterator-invalidation hazard of its own, the
    /// two-phase collect-then-rewrite shape is preserved because it is the
    /// shape the reference pass relies on for correctness once checks are
    /// spliced in as real control flow.
    pub fn returns(&self) -> Vec<Inst> {
        self.insts_in_layout_order()
            .filter(|&i| matches!(self.inst(i), InstData::Return))
            .collect()
    }

    /// All `Call` instructions in the function, in layout order.
    pub fn calls(&self) -> Vec<Inst> {
        self.insts_in_layout_order()
            .filter(|&i| matches!(self.inst(i), InstData::Call { .. }))
            .collect()
    }

    pub fn has_address_taken(&self) -> bool {
        self.address_taken
    }
}

/// One compilation unit: a flat set of functions, keyed by mangled name
/// once they're inserted (mirrors `Module::named_metadata` being keyed by
/// string, not IR pointers).
#[derive(Clone, Debug, Default)]
pub struct Module {
    functions: Vec<Function>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    pub fn declare_function(&mut self, f: Function) {
        self.functions.push(f);
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.iter_mut()
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.mangled_name == name)
    }
}
