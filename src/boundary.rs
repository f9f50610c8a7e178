pub mod immersed;
