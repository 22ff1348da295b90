//! RHI initialization options.
//!
//! Loaded the way the rest of the engine loads runtime options: a set of
//! hardcoded defaults, layered with an optional config file and environment
//! overrides via the `config` crate, then validated once into a plain
//! struct so the rest of the crate never has to re-check these values.

use crate::error::{RhiError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RhiConfig {
    /// Number of frames the CPU is allowed to queue ahead of the GPU. 1..=3.
    pub frame_latency: u32,
    /// Upload ring buffer size in bytes. Must be a power of two.
    pub upload_ring_capacity: u32,
    /// Number of in-flight upload submission slots. Must be a power of two.
    pub upload_max_submissions: u32,
    /// Persistent descriptor capacity for the CBV/SRV/UAV heap.
    pub descriptor_heap_persistent_capacity: u32,
    /// Persistent descriptor capacity for the RTV/DSV heap.
    pub descriptor_heap_rtv_dsv_capacity: u32,
    /// Shadow map resolution, in texels, per side.
    pub shadow_map_resolution: u32,
    /// MSAA sample count. One of 1, 2, 4, 8.
    pub multisample_count: u32,
}

impl Default for RhiConfig {
    fn default() -> Self {
        RhiConfig {
            frame_latency: 2,
            upload_ring_capacity: 64 * 1024 * 1024,
            upload_max_submissions: 32,
            descriptor_heap_persistent_capacity: 1_000_000,
            descriptor_heap_rtv_dsv_capacity: 256,
            shadow_map_resolution: 4096,
            multisample_count: 1,
        }
    }
}

impl RhiConfig {
    /// Builds a config from defaults, an optional file, and `RHI_*` environment
    /// overrides (e.g. `RHI_FRAME_LATENCY=3`), then validates it.
    pub fn resolve(config_path: Option<&str>) -> Result<RhiConfig> {
        let defaults = RhiConfig::default();

        let mut builder = config::Config::builder()
            .set_default("frame_latency", defaults.frame_latency)?
            .set_default("upload_ring_capacity", defaults.upload_ring_capacity)?
            .set_default("upload_max_submissions", defaults.upload_max_submissions)?
            .set_default(
                "descriptor_heap_persistent_capacity",
                defaults.descriptor_heap_persistent_capacity,
            )?
            .set_default(
                "descriptor_heap_rtv_dsv_capacity",
                defaults.descriptor_heap_rtv_dsv_capacity,
            )?
            .set_default("shadow_map_resolution", defaults.shadow_map_resolution)?
            .set_default("multisample_count", defaults.multisample_count)?;

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("RHI"));

        let built = builder.build()?;
        let parsed: RhiConfig = built.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<()> {
        fn misuse(detail: impl Into<String>) -> RhiError {
            RhiError::StateMisuse {
                context: "RhiConfig::validate",
                detail: detail.into(),
            }
        }

        if !(1..=3).contains(&self.frame_latency) {
            return Err(misuse(format!(
                "frame_latency must be 1..=3, got {}",
                self.frame_latency
            )));
        }
        if !self.upload_ring_capacity.is_power_of_two() {
            return Err(misuse(format!(
                "upload_ring_capacity must be a power of two, got {}",
                self.upload_ring_capacity
            )));
        }
        if !self.upload_max_submissions.is_power_of_two() {
            return Err(misuse(format!(
                "upload_max_submissions must be a power of two, got {}",
                self.upload_max_submissions
            )));
        }
        if !matches!(self.multisample_count, 1 | 2 | 4 | 8) {
            return Err(misuse(format!(
                "multisample_count must be one of 1, 2, 4, 8, got {}",
                self.multisample_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    // `RHI_FRAME_LATENCY` is process-global; serialize every test that touches
    // it so cargo's default parallel test execution can't interleave them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_are_valid() {
        let _guard = ENV_LOCK.lock();
        std::env::remove_var("RHI_FRAME_LATENCY");
        let cfg = RhiConfig::resolve(None).unwrap();
        assert_eq!(cfg.frame_latency, 2);
        assert_eq!(cfg.upload_ring_capacity, 64 * 1024 * 1024);
    }

    #[test]
    fn env_override_is_applied_and_validated() {
        let _guard = ENV_LOCK.lock();
        std::env::set_var("RHI_FRAME_LATENCY", "3");
        let cfg = RhiConfig::resolve(None).unwrap();
        assert_eq!(cfg.frame_latency, 3);

        std::env::set_var("RHI_FRAME_LATENCY", "9");
        let err = RhiConfig::resolve(None);
        std::env::remove_var("RHI_FRAME_LATENCY");
        assert!(err.is_err());
    }
}
