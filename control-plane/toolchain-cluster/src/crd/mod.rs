pub mod toolchain_cluster;

pub use toolchain_cluster::*;
