//! Static bytecode invariant checks, run optionally before a [`llama_bytecode::Module`]
//! is handed to `llama-vm`: block closure (every structured-control-flow opener's
//! back-patched offset lands exactly on its matching closer) and stack balance (every
//! branch of an `IF`/`ELSE` and every `LOOP` body leaves the operand stack at the depth
//! it started from).

pub mod verifier;

pub use verifier::{Report, VerifyError, Verifier};
