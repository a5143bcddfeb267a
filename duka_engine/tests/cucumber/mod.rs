mod duka_world;
mod setups;
mod steps;

pub use duka_world::DukaWorld;
