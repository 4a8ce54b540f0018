// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits for the core concepts:
// molecules as graphs and the sources they come from.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A molecule as an atom/bond graph
pub mod molecule;

// Core abstractions (traits) that other layers implement
pub mod traits;
