//! End-to-end runs of the engine against scripted probes.

pub mod support;

#[cfg(test)]
mod pipeline;
