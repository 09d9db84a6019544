//! Initial detail map synthesis

pub mod map_creator;

pub use map_creator::{MapCreator, NoiseChannel};
