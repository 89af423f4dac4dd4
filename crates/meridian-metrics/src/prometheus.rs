//! Prometheus text exposition format.
//!
//! Renders coordinator and dispatch snapshots for scraping by a Prometheus
//! server or compatible agent.

use std::fmt::Write;

use meridian_scheduler::CoordinatorSnapshot;

use crate::collector::DispatchSnapshot;

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

/// Render coordinator state and dispatch counters into Prometheus text format.
pub fn render_prometheus(coordinator: &CoordinatorSnapshot, dispatch: &DispatchSnapshot) -> String {
    let mut out = String::new();

    header(&mut out, "meridian_operators", "Live operators by resource kind.", "gauge");
    let _ = writeln!(out, "meridian_operators{{kind=\"leader\"}} {}", coordinator.leader_operators);
    let _ = writeln!(out, "meridian_operators{{kind=\"storage\"}} {}", coordinator.storage_operators);

    header(&mut out, "meridian_stores", "Known stores by liveness.", "gauge");
    let _ = writeln!(out, "meridian_stores{{state=\"up\"}} {}", coordinator.stores_up);
    let _ = writeln!(out, "meridian_stores{{state=\"down\"}} {}", coordinator.stores_down);

    header(&mut out, "meridian_regions", "Known regions.", "gauge");
    let _ = writeln!(out, "meridian_regions {}", coordinator.regions);

    header(
        &mut out,
        "meridian_scheduler_proposals_total",
        "Operators proposed by each scheduler, by admission outcome.",
        "counter",
    );
    for s in &coordinator.schedulers {
        let _ = writeln!(
            out,
            "meridian_scheduler_proposals_total{{scheduler=\"{}\",outcome=\"admitted\"}} {}",
            s.name, s.admitted
        );
        let _ = writeln!(
            out,
            "meridian_scheduler_proposals_total{{scheduler=\"{}\",outcome=\"rejected\"}} {}",
            s.name, s.rejected
        );
    }

    header(
        &mut out,
        "meridian_scheduler_failures_total",
        "Scheduler ticks that ended in an error.",
        "counter",
    );
    for s in &coordinator.schedulers {
        let _ = writeln!(
            out,
            "meridian_scheduler_failures_total{{scheduler=\"{}\"}} {}",
            s.name, s.failed
        );
    }

    header(
        &mut out,
        "meridian_scheduler_interval_seconds",
        "Current tick interval of each scheduler.",
        "gauge",
    );
    for s in &coordinator.schedulers {
        let _ = writeln!(
            out,
            "meridian_scheduler_interval_seconds{{scheduler=\"{}\"}} {:.3}",
            s.name,
            s.interval_ms as f64 / 1000.0
        );
    }

    header(
        &mut out,
        "meridian_region_heartbeats_total",
        "Region heartbeats dispatched.",
        "counter",
    );
    let _ = writeln!(out, "meridian_region_heartbeats_total {}", dispatch.region_heartbeats);

    header(
        &mut out,
        "meridian_commands_total",
        "Commands returned to stores, by type.",
        "counter",
    );
    let _ = writeln!(out, "meridian_commands_total{{type=\"add_replica\"}} {}", dispatch.add_replica);
    let _ = writeln!(
        out,
        "meridian_commands_total{{type=\"remove_replica\"}} {}",
        dispatch.remove_replica
    );
    let _ = writeln!(
        out,
        "meridian_commands_total{{type=\"transfer_leader\"}} {}",
        dispatch.transfer_leader
    );

    header(
        &mut out,
        "meridian_store_heartbeats_total",
        "Store heartbeats received.",
        "counter",
    );
    for (store_id, count) in &dispatch.store_heartbeats {
        let _ = writeln!(out, "meridian_store_heartbeats_total{{store=\"{store_id}\"}} {count}");
    }

    out
}
