//! Block-sparse matrix storage and products.

pub mod bcsr;

pub use bcsr::BlockMatrix;
