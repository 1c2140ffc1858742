//! `Module`: the compilation unit and the VM's program, owning the three pools.
//!
//! The original ties each pool back to its owning module with a raw back-pointer
//! (`ClassPool::mod`, etc). Per the Open Question on cyclic ownership, that back-pointer
//! is dropped entirely: pools are plain owned fields and any operation that needs module
//! context (disassembly resolving `CONSTARG` instructions) takes the module, or its
//! constant pool, as an explicit argument instead.

use crate::numeric::ByteReader;
use crate::pool::{ClassPool, ConstantPool, FunctionPool};

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub consts: ConstantPool,
    pub funcs: FunctionPool,
    pub classes: ClassPool,
}

#[derive(Debug)]
pub enum ModuleError {
    Truncated,
}

impl std::fmt::Display for ModuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleError::Truncated => write!(f, "module buffer ended before a complete module could be read"),
        }
    }
}

impl std::error::Error for ModuleError {}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.consts.build(&mut out);
        self.funcs.build(&mut out);
        self.classes.build(&mut out);
        out
    }

    pub fn read(bytes: &[u8]) -> Result<Module, ModuleError> {
        let mut reader = ByteReader::new(bytes);
        let consts = ConstantPool::read(&mut reader).ok_or(ModuleError::Truncated)?;
        let funcs = FunctionPool::read(&mut reader).ok_or(ModuleError::Truncated)?;
        let classes = ClassPool::read(&mut reader).ok_or(ModuleError::Truncated)?;
        Ok(Module { consts, funcs, classes })
    }

    pub fn dump(&self) -> String {
        let mut s = format!("-- CPOOL DUMP ({} entries) --\n{}\n", self.consts.size(), self.consts.dump());
        s.push_str(&format!("-- FUNCTIONS DUMP ({} entries) --\n", self.funcs.size()));
        for i in 0..self.funcs.size() {
            s.push_str(&format!("function {i} = {}\n", self.funcs.dump_signature(i)));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ConstantEntry, FunctionEntry};

    #[test]
    fn module_round_trips_through_build_and_read() {
        let mut module = Module::new();
        module.consts.get(ConstantEntry::Int(42));
        module.funcs.add(FunctionEntry::new("main"));

        let bytes = module.build();
        let parsed = Module::read(&bytes).unwrap();
        assert_eq!(parsed.consts.size(), 1);
        assert_eq!(parsed.funcs.size(), 1);
        assert_eq!(parsed.funcs.at(0).unwrap().name, "main");
    }
}
