//! ABI encoding of constructor arguments.

use anyhow::{Context, Result};

pub use alloy_core::dyn_abi::DynSolValue;

/// ABI-encode constructor arguments, as appended to creation bytecode.
///
/// # Arguments
/// * `values` - The arguments in constructor order, contract references already resolved
///
/// # Returns
/// The head/tail encoding of the arguments as a parameter sequence.
pub fn encode_constructor_args(values: &[DynSolValue]) -> Result<Vec<u8>> {
    DynSolValue::Tuple(values.to_vec())
        .abi_encode_sequence()
        .context("Constructor arguments do not form an ABI sequence")
}
