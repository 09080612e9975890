//! Render statistics tracking for debugging and performance analysis.
//!
//! Enable render stats by compiling with the `render-stats` feature:
//! ```bash
//! cargo run --example headless --features render-stats
//! ```
//!
//! Stats are printed every second when enabled, showing frame counts per
//! backend, draw work and per-node failures.

use crate::renderer::{BackendKind, FrameStats};

/// Snapshot of accumulated render statistics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub frames_bitmap: u64,
    pub frames_gpu: u64,
    pub frames_retained: u64,
    pub context_losses: u64,
    pub nodes_visited: u64,
    pub nodes_drawn: u64,
    pub draw_calls: u64,
    pub batches: u64,
    pub texture_uploads: u64,
    pub element_writes: u64,
    pub failed_nodes: u64,
    pub shapes_rasterized: u64,
}

#[cfg(feature = "render-stats")]
mod inner {
    use super::StatsSnapshot;
    use crate::renderer::{BackendKind, FrameStats};
    use std::cell::RefCell;
    use std::time::Instant;

    thread_local! {
        static STATS: RefCell<RenderStats> = RefCell::new(RenderStats::new());
    }

    struct RenderStats {
        totals: StatsSnapshot,
        last_print: Instant,
    }

    impl RenderStats {
        fn new() -> Self {
            Self {
                totals: StatsSnapshot::default(),
                last_print: Instant::now(),
            }
        }

        fn reset(&mut self) {
            self.totals = StatsSnapshot::default();
            self.last_print = Instant::now();
        }
    }

    /// Record a rendered frame.
    pub fn record_frame(kind: BackendKind, frame: &FrameStats) {
        STATS.with(|s| {
            let t = &mut s.borrow_mut().totals;
            t.frames += 1;
            match kind {
                BackendKind::Bitmap => t.frames_bitmap += 1,
                BackendKind::Gpu => t.frames_gpu += 1,
                BackendKind::Retained => t.frames_retained += 1,
            }
            t.nodes_visited += frame.nodes_visited as u64;
            t.nodes_drawn += frame.nodes_drawn as u64;
            t.draw_calls += frame.draw_calls as u64;
            t.batches += frame.batches as u64;
            t.texture_uploads += frame.texture_uploads as u64;
            t.element_writes += frame.element_writes as u64;
            t.failed_nodes += frame.failed_nodes as u64;
        });
    }

    #[inline]
    pub fn record_context_lost() {
        STATS.with(|s| {
            s.borrow_mut().totals.context_losses += 1;
        });
    }

    #[inline]
    pub fn record_rasterized(count: u32) {
        STATS.with(|s| {
            s.borrow_mut().totals.shapes_rasterized += count as u64;
        });
    }

    /// Return a snapshot of the current stats (for testing).
    pub fn get_stats() -> StatsSnapshot {
        STATS.with(|s| s.borrow().totals.clone())
    }

    /// Reset all stats to zero (for test isolation).
    pub fn reset_stats() {
        STATS.with(|s| {
            s.borrow_mut().reset();
        });
    }

    /// Called at the end of each frame to potentially print stats.
    pub fn end_frame() {
        STATS.with(|s| {
            let mut stats = s.borrow_mut();
            if stats.last_print.elapsed().as_secs() < 1 {
                return;
            }
            let t = &stats.totals;
            let avg_nodes = if t.frames > 0 {
                t.nodes_drawn as f64 / t.frames as f64
            } else {
                0.0
            };

            eprintln!(
                "[Render Stats] frames={} bitmap={} gpu={} retained={} context_lost={}",
                t.frames, t.frames_bitmap, t.frames_gpu, t.frames_retained, t.context_losses
            );
            eprintln!(
                "  nodes: visited={} drawn={} avg_drawn={:.1} failed={}",
                t.nodes_visited, t.nodes_drawn, avg_nodes, t.failed_nodes
            );
            if t.frames_gpu > 0 {
                eprintln!(
                    "  gpu: draw_calls={} batches={} uploads={}",
                    t.draw_calls, t.batches, t.texture_uploads
                );
            }
            if t.frames_retained > 0 {
                eprintln!("  retained: element_writes={}", t.element_writes);
            }
            eprintln!("  raster: shapes={}", t.shapes_rasterized);

            stats.reset();
        });
    }
}

#[cfg(feature = "render-stats")]
pub use inner::*;

// No-op implementations when feature is disabled - these get completely inlined away

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn get_stats() -> StatsSnapshot {
    StatsSnapshot::default()
}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn reset_stats() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_frame(_kind: BackendKind, _frame: &FrameStats) {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_context_lost() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_rasterized(_count: u32) {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn end_frame() {}

#[cfg(test)]
#[cfg(feature = "render-stats")]
mod tests {
    use super::*;

    fn setup() {
        reset_stats();
    }

    #[test]
    fn test_frames_counted_per_backend() {
        setup();
        let frame = FrameStats {
            nodes_drawn: 3,
            ..FrameStats::default()
        };
        record_frame(BackendKind::Bitmap, &frame);
        record_frame(BackendKind::Bitmap, &frame);
        record_frame(BackendKind::Retained, &FrameStats::default());
        let s = get_stats();
        assert_eq!(s.frames, 3);
        assert_eq!(s.frames_bitmap, 2);
        assert_eq!(s.frames_retained, 1);
        assert_eq!(s.nodes_drawn, 6);
    }

    #[test]
    fn test_reset_clears_all_counters() {
        setup();
        record_frame(BackendKind::Gpu, &FrameStats::default());
        record_context_lost();
        record_rasterized(4);
        assert_ne!(get_stats(), StatsSnapshot::default());

        reset_stats();
        assert_eq!(get_stats(), StatsSnapshot::default());
    }
}
