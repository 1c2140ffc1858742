pub mod ir;
pub mod module;
pub mod numeric;
pub mod opcode;
pub mod pool;

pub use ir::{Instruction, IrBuilder};
pub use module::{Module, ModuleError};
pub use opcode::OpCode;
pub use pool::{Argument, ClassEntry, ClassPool, ConstantEntry, ConstantPool, FunctionEntry, FunctionPool, Property};
