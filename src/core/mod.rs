// ─── Mantle Core ───
// Modular backend architecture for a Minecraft launcher.
//
// Architecture:
//   core/
//     abort       — cooperative cancellation flag
//     downloader/ — streaming downloads with progress reporting
//     extract/    — zip extraction on the blocking worker pool
//     icons/      — shared instance icon registry
//     import/     — modpack import pipeline (detect, resolve, commit)
//     instance/   — instance model + provider (staging & commit)
//     net/        — download metacache
//     state/      — global application state

pub mod abort;
pub mod downloader;
pub mod error;
pub mod extract;
pub mod http;
pub mod icons;
pub mod import;
pub mod instance;
pub mod net;
pub mod state;
