pub mod events;
pub mod generation;
pub mod graph;
pub mod naming;
pub mod params;
pub mod tags;
