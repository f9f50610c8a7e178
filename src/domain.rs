pub mod grid3d;
pub mod pipe;
