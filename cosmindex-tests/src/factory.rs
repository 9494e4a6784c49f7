mod blocks;
mod chains;
mod txs;

pub use blocks::*;
pub use chains::*;
pub use txs::*;
