//! Incident Simulation Library
//!
//! A tick-driven simulation of a small service architecture under load,
//! used as the engine of an incident-response game.

pub mod simulation;
