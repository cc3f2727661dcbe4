pub mod automaton;
pub mod collision_resolution;
