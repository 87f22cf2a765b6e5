// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal (running inference or writing a fresh checkpoint).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - File access goes through Layer 4 and Layer 6
//   - Backend selection happens here, once per command
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The batch inference workflow
pub mod infer_use_case;

// Fresh checkpoint creation
pub mod init_use_case;

/// Where tensors live for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    /// GPU through wgpu
    Wgpu,
    /// CPU through ndarray
    Cpu,
}
