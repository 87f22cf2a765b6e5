// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from the latent files on disk
// to device-ready tensor batches.
//
// The pipeline flows in this order:
//
//   latents.npy (+ transforms.npy)
//       │
//       ▼
//   NpyLatentLoader   → reads the files into a LatentSet
//       │
//       ▼
//   LatentsDataset    → implements Burn's Dataset trait,
//       │               truncated to full batches only
//       ▼
//   LatentBatcher     → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the inference loop
//                       (never shuffled)
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads latent codes and transforms from `.npy` files
pub mod loader;

/// Implements Burn's Dataset trait for latent samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
