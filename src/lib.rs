//! Render hardware interface: bindless resource handles, frame-deferred
//! lifetimes, and a sort-key draw stream over a D3D12-class GPU API.
//!
//! This crate wraps a single low-level bindless GPU API (explicit command
//! lists, descriptor heaps, fences, flip-model swap chains, multi-frame
//! in-flight execution) and presents a handle-based façade a renderer uses
//! to build per-frame scenes. It does not abstract over multiple backend
//! APIs — see [`device::GpuDevice`] for why — and it does not own asset
//! streaming, scene/world state, or widget-library interaction logic: those
//! are collaborators that call into this crate, not things it implements.
//!
//! Module layout mirrors the component table in the system overview,
//! leaves first: [`handle`] has no dependents' dependencies within this
//! crate; [`frame`] sits at the top, driving everything else per frame.

pub mod buffer_arena;
pub mod command;
pub mod config;
pub mod deferred_release;
pub mod descriptor_arena;
pub mod descriptor_heap;
pub mod device;
pub mod draw_stream;
pub mod error;
pub mod format;
pub mod frame;
pub mod handle;
pub mod resource;
pub mod swapchain;
pub mod ui;
pub mod upload_ring;

pub use config::RhiConfig;
pub use error::{Result, RhiError};
pub use handle::Handle;
