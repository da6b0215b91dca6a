//! Dump formats (spec §6 "Persisted/dump formats").
//!
//! Two independent exports of the same underlying data: the Appel/George
//! coalescing-contest text format (a fixed, widely used interchange
//! format for interference + affinity graphs) and an internal VCG graph
//! dump in the spirit of the diagnostic dumps `cranelift-codegen` passes
//! produce when `set_verbose`/dump flags are enabled. Both are off the
//! critical path (spec §5: "dumps are synchronous and off the critical
//! path").

pub mod appel;
pub mod vcg;
