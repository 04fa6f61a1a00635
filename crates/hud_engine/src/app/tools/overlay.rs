use crate::app::{LoopMetricsSnapshot, ViewOverlay};

use super::RollingMsStats;

const PERF_SECTION_LABEL: &str = "Perf";
const VIEWS_SECTION_LABEL: &str = "Views";

#[derive(Debug, Clone)]
pub struct OverlayData {
    pub metrics: LoopMetricsSnapshot,
    pub frame: u64,
    pub target_fps: Option<u32>,
    pub content_status: String,
    pub views: Vec<ViewOverlay>,
}

pub fn build_overlay_lines(data: &OverlayData) -> Vec<String> {
    let mut lines = vec![
        PERF_SECTION_LABEL.to_string(),
        format_fps_line(data.metrics.fps, data.target_fps),
        format!("Events/s: {:.1}", data.metrics.events_per_sec),
        format!("Recomputes/s: {:.1}", data.metrics.recomputes_per_sec),
        format!("Flush: {:.2} ms", data.metrics.flush_time_ms),
        format!("Frame: {}", data.frame),
        format!("Content: {}", data.content_status),
    ];

    if data.views.is_empty() {
        return lines;
    }

    lines.push(String::new());
    lines.push(VIEWS_SECTION_LABEL.to_string());
    for view in &data.views {
        lines.push(format!("[{}]", view.name));
        lines.push(format_perf_line("EVT", view.perf.event));
        lines.push(format_perf_line("FLU", view.perf.flush));
        lines.extend(view.lines.iter().cloned());
    }

    lines
}

fn format_fps_line(current_fps: f32, cap: Option<u32>) -> String {
    let cap_text = match cap {
        Some(value) => value.to_string(),
        None => "inf".to_string(),
    };
    format!("[{:.0} / {}]", current_fps, cap_text)
}

fn format_perf_line(label: &str, stats: RollingMsStats) -> String {
    format!(
        "{} l/a/m: {:.2}/{:.2}/{:.2} ms",
        label, stats.last_ms, stats.avg_ms, stats.max_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tools::PerfStatsSnapshot;

    fn data(views: Vec<ViewOverlay>) -> OverlayData {
        OverlayData {
            metrics: LoopMetricsSnapshot {
                fps: 59.6,
                events_per_sec: 12.0,
                recomputes_per_sec: 4.5,
                flush_time_ms: 0.25,
            },
            frame: 42,
            target_fps: Some(60),
            content_status: "base (3 tables)".to_string(),
            views,
        }
    }

    #[test]
    fn perf_section_without_views() {
        let lines = build_overlay_lines(&data(Vec::new()));

        assert_eq!(lines[0], PERF_SECTION_LABEL);
        assert_eq!(lines[1], "[60 / 60]");
        assert!(lines.contains(&"Frame: 42".to_string()));
        assert!(!lines.contains(&VIEWS_SECTION_LABEL.to_string()));
    }

    #[test]
    fn view_sections_include_debug_lines() {
        let lines = build_overlay_lines(&data(vec![ViewOverlay {
            name: "yields_lens",
            perf: PerfStatsSnapshot::default(),
            lines: vec!["plots: 12".to_string()],
        }]));

        let header = lines
            .iter()
            .position(|line| line == "[yields_lens]")
            .expect("view header");
        assert_eq!(lines[header + 1], "EVT l/a/m: 0.00/0.00/0.00 ms");
        assert_eq!(lines[header + 3], "plots: 12");
    }
}
